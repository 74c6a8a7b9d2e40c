//! Request body size limits.
//!
//! # Responsibilities
//! - Compare the declared `Content-Length` against the route's ceiling
//! - Pick the upload ceiling for upload routes
//!
//! # Design Decisions
//! - Only the declared length is checked; a missing or unparsable header passes
//!   and the body reader downstream enforces the hard limit
//! - Rejections report the ceiling that applied (413 + `X-Max-Body-Bytes`)

use axum::http::{header, HeaderMap};

use crate::config::SecurityConfig;
use crate::security::classifier::is_upload_endpoint;

/// Declared body exceeded the route's ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyTooLarge {
    pub declared: u64,
    pub max_bytes: u64,
}

/// Ceiling applied to `path`.
pub fn body_limit_for(path: &str, config: &SecurityConfig) -> u64 {
    if is_upload_endpoint(path) {
        config.max_upload_body_bytes
    } else {
        config.max_body_bytes
    }
}

/// Parse `Content-Length`, if present and well-formed.
pub fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Check the declared body size for a request to `path`.
pub fn check_body_size(
    path: &str,
    headers: &HeaderMap,
    config: &SecurityConfig,
) -> Result<(), BodyTooLarge> {
    let Some(declared) = declared_content_length(headers) else {
        return Ok(());
    };
    let max_bytes = body_limit_for(path, config);
    if declared > max_bytes {
        Err(BodyTooLarge { declared, max_bytes })
    } else {
        Ok(())
    }
}
