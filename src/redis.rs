use crate::error::{BadgeError, Result};
use crate::store::CacheStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo, RedisResult, Script};
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// RPUSH returns the new length, so a length of 1 means this call created
/// the list and it still needs its TTL.
const APPEND_WINDOWS: &str = r"
for i, key in ipairs(KEYS) do
    if redis.call('RPUSH', key, '') == 1 then
        redis.call('EXPIRE', key, ARGV[i])
    end
end
return 0
";

/// Redis-backed store. The connection manager multiplexes every request
/// over a shared, automatically reconnecting connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    append_windows: Script,
    timeout: Duration,
}

impl RedisStore {
    pub async fn connect(
        redis_url: &str,
        password: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut info = redis_url
            .into_connection_info()
            .map_err(|e| BadgeError::Config(format!("Invalid Redis URL: {}", e)))?;
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            info.redis.password = Some(password.to_string());
        }

        let client = Client::open(info)
            .map_err(|e| BadgeError::Store(format!("Failed to create Redis client: {}", e)))?;
        let connection = match time::timeout(timeout, ConnectionManager::new(client)).await {
            Ok(conn) => conn
                .map_err(|e| BadgeError::Store(format!("Failed to connect to Redis: {}", e)))?,
            Err(_) => {
                return Err(BadgeError::Store(format!(
                    "Timed out connecting to Redis after {:?}",
                    timeout
                )))
            }
        };

        Ok(Self {
            connection,
            append_windows: Script::new(APPEND_WINDOWS),
            timeout,
        })
    }

    /// Run one store round trip under the configured timeout.
    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        bounded(self.timeout, op, fut).await
    }
}

/// Run one store round trip, failing with [`BadgeError::Store`] if it takes
/// longer than `limit`.
async fn bounded<T, F>(limit: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = RedisResult<T>>,
{
    match time::timeout(limit, fut).await {
        Ok(result) => result.map_err(|e| BadgeError::Store(format!("{} failed: {}", op, e))),
        Err(_) => Err(BadgeError::Store(format!("{} timed out after {:?}", op, limit))),
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        self.bounded("HGET", async move {
            redis::cmd("HGET")
                .arg(key)
                .arg(field)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn hash_refresh(&self, key: &str, fields: &[(&str, String)], ttl: Duration) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (field, value) in fields {
            pipe.cmd("HSET").arg(key).arg(*field).arg(value).ignore();
        }
        pipe.cmd("EXPIRE").arg(key).arg(ttl.as_secs()).ignore();

        let mut conn = self.connection.clone();
        self.bounded("MULTI/HSET", async move { pipe.query_async::<_, ()>(&mut conn).await })
            .await
    }

    async fn value_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        self.bounded("GET", async move {
            redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn value_refresh(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(value)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .ignore();

        let mut conn = self.connection.clone();
        self.bounded("MULTI/SET", async move { pipe.query_async::<_, ()>(&mut conn).await })
            .await
    }

    async fn list_len(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection.clone();
        self.bounded("LLEN", async move {
            redis::cmd("LLEN").arg(key).query_async::<_, u64>(&mut conn).await
        })
        .await
    }

    async fn list_append_all(&self, lists: &[(&str, Duration)]) -> Result<()> {
        let mut invocation = self.append_windows.prepare_invoke();
        for (key, ttl) in lists {
            invocation.key(*key).arg(ttl.as_secs());
        }

        let mut conn = self.connection.clone();
        self.bounded("EVALSHA", async move {
            invocation.invoke_async::<_, ()>(&mut conn).await
        })
        .await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        self.bounded("SADD", async move {
            redis::cmd("SADD")
                .arg(key)
                .arg(member)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        self.bounded("PING", async move {
            redis::cmd("PING").query_async::<_, String>(&mut conn).await
        })
        .await
        .map(|_| ())
    }
}
