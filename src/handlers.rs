use axum::{
    extract::{Path, State},
    http::{header::IF_MODIFIED_SINCE, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

use crate::badge::{BadgeRequest, ShieldKind};
use crate::color::{ColorResolver, NamedColors};
use crate::config::Config;
use crate::error::{BadgeError, ParseError, Result};
use crate::health::HealthChecker;
use crate::parser::{parse_filename, parse_segments, Grammar};
use crate::providers::{upstream_client, DroneProvider, PypiProvider};
use crate::rate_limiter::RateLimiter;
use crate::render::{PngRenderer, Renderer};
use crate::resolver::BadgeResolver;
use crate::response::CacheValidators;
use crate::store::CacheStore;

/// Everything a request handler needs, built once at startup and cloned
/// into each request.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<BadgeResolver>,
    pub limiter: Arc<RateLimiter>,
    pub renderer: Arc<dyn Renderer>,
    pub health: HealthChecker,
    pub validators: Arc<CacheValidators>,
    pub trust_forwarded: bool,
}

impl AppState {
    /// Wire the providers, limiter and collaborators around `store`.
    pub fn new(config: &Config, store: Arc<dyn CacheStore>) -> Result<Self> {
        let client = upstream_client(config.upstream_timeout())?;
        let pypi = PypiProvider::new(
            client.clone(),
            config.pypi_url.as_str(),
            config.pypi_ttl(),
            store.clone(),
        );
        let drone = DroneProvider::new(
            client,
            config.drone_url.as_str(),
            config.drone_ttl(),
            store.clone(),
            config.reference_digests(),
        );
        let colors: Arc<dyn ColorResolver> = Arc::new(NamedColors);

        Ok(Self {
            resolver: Arc::new(BadgeResolver::new(pypi, drone, colors)),
            limiter: Arc::new(RateLimiter::new(store.clone(), config.rate_limits())),
            renderer: Arc::new(PngRenderer),
            health: HealthChecker::new(store, Instant::now()),
            validators: Arc::new(CacheValidators::new(Utc::now())),
            trust_forwarded: config.trust_forwarded,
        })
    }
}

/// Parse the part of the path after the version segment.
pub fn parse_badge_path(version: &str, path: &str) -> std::result::Result<BadgeRequest, ParseError> {
    let grammar = Grammar::for_version(version)
        .ok_or_else(|| ParseError::Malformed(format!("unknown API version '{}'", version)))?;

    match grammar {
        Grammar::Segment => parse_segments(path),
        Grammar::Hyphen => {
            let (kind, filename) = path
                .trim_start_matches('/')
                .split_once('/')
                .ok_or_else(|| ParseError::Malformed("expected <kind>/<filename>".to_string()))?;
            if filename.contains('/') {
                return Err(ParseError::Malformed("filename contains a slash".to_string()));
            }
            let kind: ShieldKind = kind.parse()?;
            parse_filename(kind, filename)
        }
    }
}

fn log_failure(path: &str, err: &BadgeError) {
    match err {
        BadgeError::InvalidRequest(parse) => {
            warn!(path, kind = parse.kind(), error = %parse, "bad request")
        }
        BadgeError::UnknownColor(color) => warn!(path, color = %color, "bad request"),
        other => error!(path, error = %other, "badge request failed"),
    }
}

async fn serve_badge(
    state: &AppState,
    version: &str,
    path: &str,
    headers: &HeaderMap,
) -> Result<Response> {
    let request = parse_badge_path(version, path)?;
    // Resolving a request-derived badge only validates its color, so a bad
    // color is still a 400 for clients holding a cached copy.
    let resolved = state.resolver.resolve(&request).await?;

    if request.is_request_derived() && state.validators.is_fresh(headers.get(IF_MODIFIED_SINCE)) {
        return Ok(state.validators.not_modified());
    }

    let png = state.renderer.render(&resolved.data)?;
    Ok(state.validators.badge(png, resolved.cache_policy))
}

/// `GET /:version/*path`
pub async fn badge(
    State(state): State<AppState>,
    Path((version, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    serve_badge(&state, &version, &path, &headers)
        .await
        .inspect_err(|err| {
            let full_path = format!("/{}/{}", version, path.trim_start_matches('/'));
            log_failure(&full_path, err)
        })
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.check_health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::PackageMetric;

    #[test]
    fn test_version_selects_grammar() {
        let segment = parse_badge_path("v2", "text/build/passing/green.png").unwrap();
        let hyphen = parse_badge_path("v1", "text/build-passing-green.png").unwrap();
        assert_eq!(segment, hyphen);

        assert_eq!(
            parse_badge_path("v1", "pypi/requests-day__down-blue.png").unwrap(),
            BadgeRequest::PackageIndex {
                project: "requests".into(),
                metric: PackageMetric::DayDownloads,
                color: "blue".into(),
            }
        );
    }

    #[test]
    fn test_bad_paths() {
        assert!(matches!(
            parse_badge_path("v9", "text/build/passing/green.png"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_badge_path("v1", "build-passing-green.png"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_badge_path("v1", "text/a/b-c-d.png"),
            Err(ParseError::Malformed(_))
        ));
        assert_eq!(
            parse_badge_path("v1", "npm/a-b-c.png"),
            Err(ParseError::UnknownShield("npm".into()))
        );
    }
}
