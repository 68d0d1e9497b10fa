use axum::{
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, LAST_MODIFIED, PRAGMA},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::resolver::CachePolicy;

/// RFC 7231 IMF-fixdate.
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Validators for request-derived badges. Their output only changes with a
/// new release, so the process start time stands in for the modification
/// time.
#[derive(Debug, Clone)]
pub struct CacheValidators {
    last_modified: DateTime<Utc>,
    last_modified_header: String,
}

impl CacheValidators {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        // HTTP dates carry whole seconds only.
        let last_modified = started_at.trunc_subsecs(0);
        Self {
            last_modified,
            last_modified_header: http_date(last_modified),
        }
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Whether a client holding a copy from `if_modified_since` is current.
    pub fn is_fresh(&self, if_modified_since: Option<&HeaderValue>) -> bool {
        if_modified_since
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date)
            .is_some_and(|since| since >= self.last_modified)
    }

    pub fn not_modified(&self) -> Response {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(value) = HeaderValue::from_str(&self.last_modified_header) {
            response.headers_mut().insert(LAST_MODIFIED, value);
        }
        response
    }

    /// A PNG response with headers matching `policy`.
    pub fn badge(&self, png: Vec<u8>, policy: CachePolicy) -> Response {
        let mut response = png.into_response();
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));

        match policy {
            CachePolicy::Immutable => {
                let expires = http_date(Utc::now() + Duration::days(365));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("public"));
                if let Ok(value) = HeaderValue::from_str(&expires) {
                    headers.insert(EXPIRES, value);
                }
                if let Ok(value) = HeaderValue::from_str(&self.last_modified_header) {
                    headers.insert(LAST_MODIFIED, value);
                }
            }
            CachePolicy::Revalidate => {
                headers.insert(
                    CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, no-store, must-revalidate"),
                );
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            }
        }
        response
    }
}
