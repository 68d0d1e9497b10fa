use crate::providers::drone::{FAILING_DIGEST, PASSING_DIGEST};
use crate::providers::ReferenceDigests;
use crate::rate_limiter::{RateLimitSettings, Window};
use clap::Parser;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_PYPI_URL: &str = "https://pypi.org/pypi";
const DEFAULT_DRONE_URL: &str = "https://drone.io";

/// Service configuration. Every option can also be set through the
/// environment variable named next to it.
#[derive(Debug, Clone, Parser)]
#[command(name = "buckle", version, about = "Status badge server")]
pub struct Config {
    /// Address to bind to
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Redis URL; empty keeps all state in process memory
    #[arg(short = 'r', long = "redis", env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// Redis password, if not part of the URL
    #[arg(short = 'a', long = "redis-pass", env = "REDIS_PASS")]
    pub redis_password: Option<String>,

    /// Package index JSON API base URL
    #[arg(long, env = "PYPI_URL", default_value = DEFAULT_PYPI_URL)]
    pub pypi_url: String,

    /// CI server base URL
    #[arg(long, env = "DRONE_URL", default_value = DEFAULT_DRONE_URL)]
    pub drone_url: String,

    /// Seconds package index data stays cached
    #[arg(long, env = "PYPI_TTL_SECS", default_value_t = 3600)]
    pub pypi_ttl_secs: u64,

    /// Seconds a build status stays cached
    #[arg(long, env = "DRONE_TTL_SECS", default_value_t = 60)]
    pub drone_ttl_secs: u64,

    /// Upper bound on each upstream HTTP request
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value_t = 5000)]
    pub upstream_timeout_ms: u64,

    /// Upper bound on each cache store round trip
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    #[arg(long, env = "SHORT_WINDOW_LIMIT", default_value_t = 10)]
    pub short_window_limit: u64,

    #[arg(long, env = "SHORT_WINDOW_SECS", default_value_t = 1)]
    pub short_window_secs: u64,

    #[arg(long, env = "LONG_WINDOW_LIMIT", default_value_t = 100)]
    pub long_window_limit: u64,

    #[arg(long, env = "LONG_WINDOW_SECS", default_value_t = 120)]
    pub long_window_secs: u64,

    /// Long-window request number at which a client is added to the denylist
    #[arg(long, env = "FLAG_AT", default_value_t = 99)]
    pub flag_at: u64,

    /// MD5 of the CI server's passing status image
    #[arg(long, env = "DRONE_PASSING_DIGEST", default_value = PASSING_DIGEST)]
    pub drone_passing_digest: String,

    /// MD5 of the CI server's failing status image
    #[arg(long, env = "DRONE_FAILING_DIGEST", default_value = FAILING_DIGEST)]
    pub drone_failing_digest: String,

    /// Take the client address from X-Forwarded-For / X-Real-IP
    #[arg(long, env = "TRUST_FORWARDED")]
    pub trust_forwarded: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let limits = RateLimitSettings::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            redis_password: None,
            pypi_url: DEFAULT_PYPI_URL.to_string(),
            drone_url: DEFAULT_DRONE_URL.to_string(),
            pypi_ttl_secs: 3600,
            drone_ttl_secs: 60,
            upstream_timeout_ms: 5000,
            store_timeout_ms: 2000,
            short_window_limit: limits.short.limit,
            short_window_secs: limits.short.length.as_secs(),
            long_window_limit: limits.long.limit,
            long_window_secs: limits.long.length.as_secs(),
            flag_at: limits.flag_at,
            drone_passing_digest: PASSING_DIGEST.to_string(),
            drone_failing_digest: FAILING_DIGEST.to_string(),
            trust_forwarded: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse flags and environment, after loading any `.env` file.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Config::parse()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// An empty Redis URL selects the in-memory store.
    pub fn uses_memory_store(&self) -> bool {
        self.redis_url.trim().is_empty()
    }

    pub fn pypi_ttl(&self) -> Duration {
        Duration::from_secs(self.pypi_ttl_secs)
    }

    pub fn drone_ttl(&self) -> Duration {
        Duration::from_secs(self.drone_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn rate_limits(&self) -> RateLimitSettings {
        RateLimitSettings {
            short: Window {
                limit: self.short_window_limit,
                length: Duration::from_secs(self.short_window_secs),
            },
            long: Window {
                limit: self.long_window_limit,
                length: Duration::from_secs(self.long_window_secs),
            },
            flag_at: self.flag_at,
        }
    }

    pub fn reference_digests(&self) -> ReferenceDigests {
        ReferenceDigests {
            passing: self.drone_passing_digest.to_ascii_lowercase(),
            failing: self.drone_failing_digest.to_ascii_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_flag_defaults() {
        let parsed = Config::try_parse_from(["buckle"]).unwrap();
        let defaults = Config::default();
        // Only compare what the test environment is unlikely to override.
        assert_eq!(parsed.pypi_ttl_secs, defaults.pypi_ttl_secs);
        assert_eq!(parsed.flag_at, defaults.flag_at);
        assert_eq!(parsed.drone_passing_digest, defaults.drone_passing_digest);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "buckle",
            "-p",
            "9000",
            "--redis",
            "",
            "--drone-ttl-secs",
            "300",
            "--trust-forwarded",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.uses_memory_store());
        assert_eq!(config.drone_ttl(), Duration::from_secs(300));
        assert!(config.trust_forwarded);
    }

    #[test]
    fn test_rate_limits() {
        let limits = Config::default().rate_limits();
        assert_eq!(limits, RateLimitSettings::default());
    }
}
