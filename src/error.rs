use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reasons a badge path fails to parse.
///
/// All of these surface to clients as the same `400`, the variant only
/// matters for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed badge path: {0}")]
    Malformed(String),

    #[error("badge path must end in .png")]
    MissingSuffix,

    #[error("unknown shield type '{0}'")]
    UnknownShield(String),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("invalid color spec '{0}'")]
    InvalidColorSpec(String),
}

impl ParseError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::Malformed(_) => "malformed",
            ParseError::MissingSuffix => "missing_suffix",
            ParseError::UnknownShield(_) => "unknown_shield",
            ParseError::UnknownMetric(_) => "unknown_metric",
            ParseError::InvalidColorSpec(_) => "invalid_color_spec",
        }
    }
}

#[derive(Debug, Error)]
pub enum BadgeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ParseError),

    #[error("Unknown color '{0}'")]
    UnknownColor(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, BadgeError>;

impl BadgeError {
    /// True for faults caused by the request itself rather than by the
    /// service or its upstreams.
    pub fn is_client_error(&self) -> bool {
        matches!(self, BadgeError::InvalidRequest(_) | BadgeError::UnknownColor(_))
    }
}

impl From<redis::RedisError> for BadgeError {
    fn from(err: redis::RedisError) -> Self {
        BadgeError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for BadgeError {
    fn from(err: reqwest::Error) -> Self {
        BadgeError::Upstream(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
        }
    }

    pub fn from_badge_error(err: &BadgeError) -> Self {
        match err {
            BadgeError::InvalidRequest(_) | BadgeError::UnknownColor(_) => {
                Self::new("bad_request", &err.to_string(), 400)
            }
            BadgeError::Upstream(_) => {
                Self::new("bad_gateway", "Upstream data source failed", 502)
            }
            BadgeError::RateLimited => {
                Self::new("too_many_requests", "Too many requests", 429)
            }
            BadgeError::Store(_) => {
                Self::new("service_unavailable", "Cache store unavailable", 503)
            }
            BadgeError::Config(_) | BadgeError::Render(_) => {
                Self::new("internal_error", "Internal server error", 500)
            }
        }
    }
}

impl IntoResponse for BadgeError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from_badge_error(&self);
        let status =
            StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}
