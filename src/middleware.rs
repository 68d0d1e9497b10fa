use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::info;
use uuid::Uuid;

use crate::handlers::AppState;

/// Logging middleware for request/response tracking. The logged client is
/// the one the rate limiter charges.
pub async fn logging_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = client_address(&request, state.trust_forwarded);
    let request_id = Uuid::new_v4();

    info!(
        target: "buckle::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        client_ip = %client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    info!(
        target: "buckle::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        status = %status,
        "Request completed"
    );

    response
}

/// Admit the request through the per-client rate limiter before it reaches
/// the badge handler.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_address(&request, state.trust_forwarded);

    match state.limiter.admit(&client).await {
        Ok(_) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// The address a request is attributed to. Proxy headers are only consulted
/// when `trust_forwarded` is set.
pub fn client_address(request: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(forwarded) = request.headers().get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    let first_ip = first_ip.trim();
                    if !first_ip.is_empty() {
                        return first_ip.to_string();
                    }
                }
            }
        }

        if let Some(real_ip) = request.headers().get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                return ip_str.trim().to_string();
            }
        }
    }

    // Port stripped so all connections from one host share windows
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        addr.ip().to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::memory::MemoryStore;
    use axum::{http::HeaderValue, middleware::from_fn_with_state, routing::get, Router};
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn with_peer(peer: &str) -> Request {
        let mut request = Request::new(axum::body::Body::empty());
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_client_address_with_forwarded_header() {
        let mut request = with_peer("10.1.1.1:40000");
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        assert_eq!(client_address(&request, true), "192.168.1.1");
        assert_eq!(client_address(&request, false), "10.1.1.1");
    }

    #[test]
    fn test_client_address_with_real_ip_header() {
        let mut request = with_peer("10.1.1.1:40000");
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));

        assert_eq!(client_address(&request, true), "203.0.113.1");
        assert_eq!(client_address(&request, false), "10.1.1.1");
    }

    #[test]
    fn test_client_address_strips_port() {
        assert_eq!(client_address(&with_peer("[::1]:5000"), false), "::1");
    }

    /// Collects every `client_ip` field recorded while installed.
    #[derive(Clone, Default)]
    struct ClientIpCapture(Arc<Mutex<Vec<String>>>);

    impl<S: Subscriber> Layer<S> for ClientIpCapture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            struct Visitor<'a>(&'a mut Vec<String>);

            impl Visit for Visitor<'_> {
                fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
                    if field.name() == "client_ip" {
                        self.0.push(format!("{:?}", value));
                    }
                }
            }

            if let Ok(mut seen) = self.0.lock() {
                event.record(&mut Visitor(&mut seen));
            }
        }
    }

    async fn logged_client(trust_forwarded: bool) -> Vec<String> {
        let capture = ClientIpCapture::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(capture.clone()),
        );

        let config = Config {
            redis_url: String::new(),
            trust_forwarded,
            ..Config::default()
        };
        let state = AppState::new(&config, Arc::new(MemoryStore::new())).unwrap();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(state, logging_middleware));

        let mut request = with_peer("10.1.1.1:40000");
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("192.168.1.1"));
        app.oneshot(request).await.unwrap();

        let seen = capture.0.lock().unwrap().clone();
        seen
    }

    #[tokio::test]
    async fn test_logged_client_matches_rate_limited_client() {
        assert_eq!(logged_client(false).await, ["10.1.1.1"]);
        assert_eq!(logged_client(true).await, ["192.168.1.1"]);
    }

    #[test]
    fn test_client_address_fallback() {
        let request = Request::new(axum::body::Body::empty());
        assert_eq!(client_address(&request, false), "unknown");
    }
}
