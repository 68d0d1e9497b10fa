//! Key-value store shared by the data cache and the rate limiter.
//!
//! Every multi-key or multi-field write goes through a single store-side
//! transaction, so readers never see half of a refresh.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read one field of a hash.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Write every field and (re)set the key's TTL in one transaction.
    async fn hash_refresh(&self, key: &str, fields: &[(&str, String)], ttl: Duration) -> Result<()>;

    async fn value_get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value and its TTL in one transaction.
    async fn value_refresh(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Length of a list, 0 when the key is absent or expired.
    async fn list_len(&self, key: &str) -> Result<u64>;

    /// Append one token to each list in one transaction. A list that does
    /// not exist yet is created with its TTL; an existing list keeps the TTL
    /// it already has.
    async fn list_append_all(&self, lists: &[(&str, Duration)]) -> Result<()>;

    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}
