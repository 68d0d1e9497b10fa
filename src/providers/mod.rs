//! Upstream data sources behind the dynamic badge kinds.
//!
//! Each provider reads through the shared [`CacheStore`](crate::store::CacheStore):
//! a hit is served directly, a miss costs exactly one upstream request whose
//! results are written back in a single transaction.

pub mod drone;
pub mod pypi;

pub use drone::{BuildStatus, DroneProvider, ReferenceDigests};
pub use pypi::{format_count, PackageStats, PypiProvider};

use crate::error::{BadgeError, ParseError, Result};
use reqwest::Url;
use std::time::Duration;

/// HTTP client shared by the providers, with every request bounded by
/// `timeout`.
pub fn upstream_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("buckle/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BadgeError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// `base` extended by `segments`, each percent-encoded as exactly one path
/// segment. Request-supplied names can therefore never reach a query, a
/// fragment or a parent path on the upstream.
pub(crate) fn upstream_url(base: &str, segments: &[&str]) -> Result<Url> {
    if let Some(segment) = segments
        .iter()
        .find(|segment| segment.is_empty() || **segment == "." || **segment == "..")
    {
        return Err(ParseError::Malformed(format!("'{}' is not a valid name", segment)).into());
    }

    let mut url = Url::parse(base)
        .map_err(|e| BadgeError::Config(format!("Invalid upstream URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| BadgeError::Config(format!("Upstream URL '{}' cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Issue a GET and fail on transport errors and non-2xx statuses.
pub(crate) async fn get_ok(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| BadgeError::Upstream(format!("GET {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BadgeError::Upstream(format!("GET {} returned {}", url, status)));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_encodes_each_name_as_one_segment() {
        let url = upstream_url("https://pypi.org/pypi", &["other?", "json"]).unwrap();
        assert_eq!(url.as_str(), "https://pypi.org/pypi/other%3F/json");

        let url = upstream_url("http://ci.local/", &["a#b", "c/d", "status.png"]).unwrap();
        assert_eq!(url.as_str(), "http://ci.local/a%23b/c%2Fd/status.png");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_upstream_url_rejects_dot_segments() {
        for name in ["..", ".", ""] {
            assert!(matches!(
                upstream_url("https://pypi.org/pypi", &[name, "json"]),
                Err(BadgeError::InvalidRequest(ParseError::Malformed(_)))
            ));
        }
    }
}
