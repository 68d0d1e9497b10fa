//! In-process [`CacheStore`] used when no Redis URL is configured, and by
//! tests. Each operation holds the map lock for its whole duration, which
//! gives the same all-or-nothing visibility as a Redis transaction.
//! Expired keys are dropped when read, and writes sweep the whole map at
//! most once per [`SWEEP_INTERVAL`].

use crate::error::{BadgeError, Result};
use crate::store::CacheStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Minimum time between full expiry sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(u64),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| BadgeError::Store("Failed to acquire store lock".into()))
    }

    /// Lock for a write. Client windows and cache entries are never read
    /// again once their owner goes quiet, so writes also reclaim them.
    fn lock_for_write(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        let mut entries = self.lock()?;
        self.sweep_expired(&mut entries)?;
        Ok(entries)
    }

    fn sweep_expired(&self, entries: &mut HashMap<String, Entry>) -> Result<()> {
        let now = Instant::now();
        let mut last_sweep = self
            .last_sweep
            .lock()
            .map_err(|_| BadgeError::Store("Failed to acquire sweep lock".into()))?;
        if now.duration_since(*last_sweep) < SWEEP_INTERVAL {
            return Ok(());
        }
        *last_sweep = now;

        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, remaining = entries.len(), "swept expired keys");
        }
        Ok(())
    }

    /// Live entry for `key`, dropping it first if it has expired.
    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn wrong_type(key: &str) -> BadgeError {
        BadgeError::Store(format!("WRONGTYPE operation against key '{}'", key))
    }

    /// Whether `member` is in the set at `key`.
    pub fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.lock()?;
        Ok(matches!(
            Self::live(&mut entries, key).map(|e| &e.value),
            Some(Value::Set(set)) if set.contains(member)
        ))
    }

    /// Keys held, live or not.
    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whole-hash read, for checking refresh atomicity.
    #[cfg(test)]
    fn hash_snapshot(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut entries = self.lock()?;
        match Self::live(&mut entries, key).map(|e| &e.value) {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        match Self::live(&mut entries, key).map(|e| &e.value) {
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn hash_refresh(&self, key: &str, fields: &[(&str, String)], ttl: Duration) -> Result<()> {
        let mut entries = self.lock_for_write()?;
        let expires_at = Some(Instant::now() + ttl);
        match Self::live(&mut entries, key) {
            Some(Entry {
                value: Value::Hash(hash),
                expires_at: existing,
            }) => {
                for (field, value) in fields {
                    hash.insert(field.to_string(), value.clone());
                }
                *existing = expires_at;
            }
            Some(_) => return Err(Self::wrong_type(key)),
            None => {
                let hash = fields
                    .iter()
                    .map(|(field, value)| (field.to_string(), value.clone()))
                    .collect();
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Hash(hash),
                        expires_at,
                    },
                );
            }
        }
        Ok(())
    }

    async fn value_get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        match Self::live(&mut entries, key).map(|e| &e.value) {
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn value_refresh(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.lock_for_write()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn list_len(&self, key: &str) -> Result<u64> {
        let mut entries = self.lock()?;
        match Self::live(&mut entries, key).map(|e| &e.value) {
            Some(Value::List(len)) => Ok(*len),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn list_append_all(&self, lists: &[(&str, Duration)]) -> Result<()> {
        let mut entries = self.lock_for_write()?;
        // Type-check every key before touching any of them.
        for (key, _) in lists {
            if let Some(entry) = Self::live(&mut entries, key) {
                if !matches!(entry.value, Value::List(_)) {
                    return Err(Self::wrong_type(key));
                }
            }
        }

        let now = Instant::now();
        for (key, ttl) in lists {
            match entries.get_mut(*key) {
                Some(Entry {
                    value: Value::List(len),
                    ..
                }) => *len += 1,
                _ => {
                    entries.insert(
                        key.to_string(),
                        Entry {
                            value: Value::List(1),
                            expires_at: Some(now + *ttl),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut entries = self.lock_for_write()?;
        match Self::live(&mut entries, key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => {
                set.insert(member.to_string());
            }
            Some(_) => return Err(Self::wrong_type(key)),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Set(HashSet::from([member.to_string()])),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_hash_refresh_and_expiry() {
        let store = MemoryStore::new();
        store
            .hash_refresh("pkg_pypi", &[("version", "1.0".into()), ("day_down", "5".into())], TTL)
            .await
            .unwrap();

        assert_eq!(store.hash_get("pkg_pypi", "version").await.unwrap().as_deref(), Some("1.0"));
        assert_eq!(store.hash_get("pkg_pypi", "week_down").await.unwrap(), None);

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(store.hash_get("pkg_pypi", "version").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_append_keeps_existing_ttl() {
        let store = MemoryStore::new();
        let windows = [("short", Duration::from_secs(1)), ("long", Duration::from_secs(120))];

        store.list_append_all(&windows).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;
        store.list_append_all(&windows).await.unwrap();
        assert_eq!(store.list_len("short").await.unwrap(), 2);

        // The short window expires one second after it was created, not
        // after the latest append.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(store.list_len("short").await.unwrap(), 0);
        assert_eq!(store.list_len("long").await.unwrap(), 2);

        store.list_append_all(&windows).await.unwrap();
        assert_eq!(store.list_len("short").await.unwrap(), 1);
        assert_eq!(store.list_len("long").await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_expired_keys() {
        let store = MemoryStore::new();
        for i in 0..1000 {
            let short = format!("ip_10.0.{}.{}", i / 256, i % 256);
            let long = format!("{}_long", short);
            store
                .list_append_all(&[
                    (short.as_str(), Duration::from_secs(1)),
                    (long.as_str(), Duration::from_secs(120)),
                ])
                .await
                .unwrap();
        }
        store.set_add("dos", "10.0.0.1").await.unwrap();
        assert_eq!(store.key_count(), 2001);

        // Nothing is swept before the interval has passed.
        tokio::time::advance(Duration::from_secs(5)).await;
        store.value_refresh("acme_api_drone", "passing", TTL).await.unwrap();
        assert_eq!(store.key_count(), 2002);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.value_refresh("acme_web_drone", "failing", TTL).await.unwrap();

        // Only the TTL-less denylist and the fresh entry survive.
        assert_eq!(store.key_count(), 2);
        assert!(store.set_contains("dos", "10.0.0.1").unwrap());
        assert_eq!(
            store.value_get("acme_web_drone").await.unwrap().as_deref(),
            Some("failing")
        );
    }

    #[tokio::test]
    async fn test_wrong_type_rejected() {
        let store = MemoryStore::new();
        store.value_refresh("k", "passing", TTL).await.unwrap();
        assert!(store.hash_get("k", "version").await.is_err());
        assert!(store.list_append_all(&[("k", TTL)]).await.is_err());
    }

    #[tokio::test]
    async fn test_set_add() {
        let store = MemoryStore::new();
        store.set_add("dos", "10.0.0.1").await.unwrap();
        store.set_add("dos", "10.0.0.1").await.unwrap();
        assert!(store.set_contains("dos", "10.0.0.1").unwrap());
        assert!(!store.set_contains("dos", "10.0.0.2").unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_mixed_refresh() {
        let store = MemoryStore::new();
        let generation = |n: u32| -> Vec<(&'static str, String)> {
            vec![
                ("version", format!("{n}.0")),
                ("day_down", n.to_string()),
                ("week_down", n.to_string()),
                ("month_down", n.to_string()),
            ]
        };
        store.hash_refresh("pkg_pypi", &generation(0), TTL).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for n in 1..200 {
                    store.hash_refresh("pkg_pypi", &generation(n), TTL).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let snapshot = store.hash_snapshot("pkg_pypi").unwrap();
                        let day = &snapshot["day_down"];
                        assert_eq!(snapshot["version"], format!("{day}.0"));
                        assert_eq!(&snapshot["week_down"], day);
                        assert_eq!(&snapshot["month_down"], day);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
