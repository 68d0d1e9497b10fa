use crate::config::Config;
use crate::error::BadgeError;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL; an empty URL selects the in-memory store
    pub fn validate_redis_url(url: &str) -> Result<(), BadgeError> {
        if url.trim().is_empty() {
            return Ok(());
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(BadgeError::Config(
                "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates an upstream base URL
    pub fn validate_upstream_url(name: &str, url: &str) -> Result<(), BadgeError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BadgeError::Config(format!(
                "{} URL must start with 'http://' or 'https://'",
                name
            )));
        }

        Ok(())
    }

    /// Validates a non-zero duration or count
    pub fn validate_positive(name: &str, value: u64) -> Result<(), BadgeError> {
        if value == 0 {
            return Err(BadgeError::Config(format!("{} must be greater than 0", name)));
        }

        Ok(())
    }

    /// Validates an MD5 hex digest
    pub fn validate_digest(name: &str, digest: &str) -> Result<(), BadgeError> {
        if digest.len() != 32 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BadgeError::Config(format!(
                "{} must be 32 hexadecimal digits",
                name
            )));
        }

        Ok(())
    }

    /// Validates a full service configuration
    pub fn validate(config: &Config) -> Result<(), BadgeError> {
        if config.host.is_empty() {
            return Err(BadgeError::Config("Server host cannot be empty".to_string()));
        }
        Self::validate_positive("Server port", u64::from(config.port))?;
        Self::validate_redis_url(&config.redis_url)?;
        Self::validate_upstream_url("Package index", &config.pypi_url)?;
        Self::validate_upstream_url("CI server", &config.drone_url)?;

        Self::validate_positive("Package index TTL", config.pypi_ttl_secs)?;
        Self::validate_positive("CI status TTL", config.drone_ttl_secs)?;
        Self::validate_positive("Upstream timeout", config.upstream_timeout_ms)?;
        Self::validate_positive("Store timeout", config.store_timeout_ms)?;
        Self::validate_positive("Short window limit", config.short_window_limit)?;
        Self::validate_positive("Short window length", config.short_window_secs)?;
        Self::validate_positive("Long window limit", config.long_window_limit)?;
        Self::validate_positive("Long window length", config.long_window_secs)?;

        if config.flag_at > config.long_window_limit {
            return Err(BadgeError::Config(
                "Flag threshold cannot exceed the long window limit".to_string(),
            ));
        }

        Self::validate_digest("Passing digest", &config.drone_passing_digest)?;
        Self::validate_digest("Failing digest", &config.drone_failing_digest)?;

        Ok(())
    }
}
