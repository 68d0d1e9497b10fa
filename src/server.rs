use crate::config::Config;
use crate::error::Result;
use crate::handlers::{badge, health_check, AppState};
use crate::memory::MemoryStore;
use crate::middleware::{logging_middleware, rate_limit};
use crate::redis::RedisStore;
use crate::store::CacheStore;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build the router. Only badge routes go through the rate limiter.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/:version/*path", get(badge))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .route("/health", get(health_check))
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state, logging_middleware)),
        )
}

pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    async fn open_store(&self) -> Result<Arc<dyn CacheStore>> {
        if self.config.uses_memory_store() {
            tracing::warn!("No Redis URL configured, keeping cache and rate windows in memory");
            return Ok(Arc::new(MemoryStore::new()));
        }

        let store = RedisStore::connect(
            &self.config.redis_url,
            self.config.redis_password.as_deref(),
            self.config.store_timeout(),
        )
        .await?;
        tracing::info!("Connected to Redis");
        Ok(Arc::new(store))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let store = self.open_store().await?;
        let state = AppState::new(&self.config, store)?;
        let app = create_app(state);

        let address = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address).await?;

        tracing::info!("Badge server listening on {}", address);
        tracing::info!("Health check available at /health");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
