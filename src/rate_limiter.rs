use crate::error::{BadgeError, Result};
use crate::store::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Set collecting clients that came close to the long-window limit.
pub const DENYLIST_KEY: &str = "dos";

/// One fixed counting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u64,
    pub length: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub short: Window,
    pub long: Window,
    /// Long-window request number at which a client is flagged.
    pub flag_at: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            short: Window {
                limit: 10,
                length: Duration::from_secs(1),
            },
            long: Window {
                limit: 100,
                length: Duration::from_secs(120),
            },
            flag_at: 99,
        }
    }
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// The client reached the flag threshold with this request.
    pub flagged: bool,
}

/// Per-client fixed-window limiter with a burst window and a sustained
/// window, both stored as lists of placeholder tokens.
///
/// Windows start at a client's first request and are not sliding, so a
/// client can get up to twice the short limit through around a window
/// boundary.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    fn short_key(client: &str) -> String {
        format!("ip_{}", client)
    }

    fn long_key(client: &str) -> String {
        format!("ip_{}_long", client)
    }

    /// Count a request from `client`, or reject it with
    /// [`BadgeError::RateLimited`]. Rejected requests are not counted.
    pub async fn admit(&self, client: &str) -> Result<Admission> {
        let long_key = Self::long_key(client);
        let short_key = Self::short_key(client);

        let long_count = self.store.list_len(&long_key).await?;
        if long_count >= self.settings.long.limit {
            debug!(client, long_count, "long window exhausted");
            return Err(BadgeError::RateLimited);
        }

        let flagged = long_count + 1 == self.settings.flag_at;
        if flagged {
            warn!(client, "too many requests, adding client to denylist");
            self.store.set_add(DENYLIST_KEY, client).await?;
        }

        let short_count = self.store.list_len(&short_key).await?;
        if short_count >= self.settings.short.limit {
            debug!(client, short_count, "short window exhausted");
            return Err(BadgeError::RateLimited);
        }

        self.store
            .list_append_all(&[
                (short_key.as_str(), self.settings.short.length),
                (long_key.as_str(), self.settings.long.length),
            ])
            .await?;
        Ok(Admission { flagged })
    }
}
