use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::store::CacheStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: DependencyStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub store: ServiceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct HealthChecker {
    store: Arc<dyn CacheStore>,
    started: Instant,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn CacheStore>, started: Instant) -> Self {
        Self { store, started }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let store_status = self.check_store().await;

        let overall_status = if store_status.status == "healthy" {
            "healthy"
        } else {
            "degraded" // Process is up, but no badge request can be admitted
        };

        HealthStatus {
            status: overall_status.to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
            dependencies: DependencyStatus {
                store: store_status,
            },
        }
    }

    async fn check_store(&self) -> ServiceStatus {
        let start = Instant::now();
        let result = self.store.ping().await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => ServiceStatus {
                status: "healthy".to_string(),
                response_time_ms,
                error: None,
            },
            Err(e) => ServiceStatus {
                status: "unavailable".to_string(),
                response_time_ms,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus {
            status: "healthy".to_string(),
            timestamp: 1234567890,
            version: "1.0.0".to_string(),
            uptime_seconds: 3600,
            dependencies: DependencyStatus {
                store: ServiceStatus {
                    status: "healthy".to_string(),
                    response_time_ms: 5,
                    error: None,
                },
            },
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("1234567890"));
    }

    #[tokio::test]
    async fn test_memory_store_is_healthy() {
        let checker = HealthChecker::new(Arc::new(MemoryStore::new()), Instant::now());
        let health = checker.check_health().await;
        assert_eq!(health.status, "healthy");
        assert!(health.dependencies.store.error.is_none());
    }
}
