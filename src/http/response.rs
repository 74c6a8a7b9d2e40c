//! Gateway error responses and response decoration.
//!
//! # Responsibilities
//! - Map gateway rejections to status codes and JSON bodies
//! - Attach rate-limit headers to admitted and throttled responses
//! - Attach `X-Max-Body-Bytes` to 413 responses
//!
//! # Design Decisions
//! - Body shape is always `{ "error": <label>, "message": <detail> }`
//! - Timed-out high-risk requests result in 504 Gateway Timeout

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::security::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_MAX_BODY_BYTES: HeaderName = HeaderName::from_static("x-max-body-bytes");

/// Terminal outcomes produced by the gateway itself.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("request body of {declared} bytes exceeds limit of {max_bytes} bytes")]
    PayloadTooLarge { declared: u64, max_bytes: u64 },
    #[error("rate limit exceeded, retry in {} seconds", .0.retry_after_secs)]
    TooManyRequests(RateLimitDecision),
    #[error("request exceeded its {0} ms execution budget")]
    GatewayTimeout(u64),
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `error` field in the JSON body.
    pub fn label(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "Bad Request",
            GatewayError::Unauthorized(_) => "Unauthorized",
            GatewayError::Forbidden(_) => "Forbidden",
            GatewayError::PayloadTooLarge { .. } => "Payload Too Large",
            GatewayError::TooManyRequests(_) => "Too Many Requests",
            GatewayError::GatewayTimeout(_) => "Gateway Timeout",
            GatewayError::BadGateway(_) => "Bad Gateway",
            GatewayError::Internal(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.label(),
            message: self.to_string(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        let headers = response.headers_mut();

        match &self {
            GatewayError::TooManyRequests(decision) => {
                apply_rate_limit_headers(headers, decision);
                headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
            }
            GatewayError::PayloadTooLarge { max_bytes, .. } => {
                headers.insert(X_MAX_BODY_BYTES, HeaderValue::from(*max_bytes));
            }
            _ => {}
        }

        response
    }
}

/// Attach `X-RateLimit-*` headers describing `decision`.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_secs()));
}
