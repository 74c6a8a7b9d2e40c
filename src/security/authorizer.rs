//! Request authorization.
//!
//! # Responsibilities
//! - Extract the presented bearer token
//! - Map the token to a role and compare against the method's required role
//! - Fail closed when no tokens are configured (loopback only)
//!
//! # Design Decisions
//! - Token lookup is an exact match on the plaintext value
//! - Hashing is reserved for rate-limit keys; tokens are never logged
//! - Non-API paths are not guarded here

use axum::http::{header, HeaderMap, Method, StatusCode};
use std::net::IpAddr;

use crate::config::AuthConfig;
use crate::security::identity::{is_loopback, resolve_client_ip};
use crate::security::role::{required_role, Role};

/// Path prefix guarded by the gateway.
pub const API_PREFIX: &str = "/api";

/// Custom header accepted as an alternative to `Authorization: Bearer`.
pub const X_API_TOKEN: &str = "x-api-token";

/// How an authorized caller was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Local caller with no tokens configured, or a non-API path.
    Loopback,
    /// Valid token presented.
    Token,
    /// Local caller admitted without a token by explicit opt-in.
    LoopbackBypass,
}

impl AuthSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthSource::Loopback => "loopback",
            AuthSource::Token => "token",
            AuthSource::LoopbackBypass => "loopback_bypass",
        }
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    Unauthorized,
    Forbidden,
}

impl DenialKind {
    pub fn status(self) -> StatusCode {
        match self {
            DenialKind::Unauthorized => StatusCode::UNAUTHORIZED,
            DenialKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

/// Outcome of authorizing a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    Authorized {
        role: Role,
        client_ip: IpAddr,
        source: AuthSource,
    },
    Denied {
        kind: DenialKind,
        message: String,
        client_ip: IpAddr,
    },
}

impl AuthorizationResult {
    pub fn client_ip(&self) -> IpAddr {
        match self {
            AuthorizationResult::Authorized { client_ip, .. }
            | AuthorizationResult::Denied { client_ip, .. } => *client_ip,
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationResult::Authorized { .. })
    }

    fn denied(kind: DenialKind, message: impl Into<String>, client_ip: IpAddr) -> Self {
        AuthorizationResult::Denied {
            kind,
            message: message.into(),
            client_ip,
        }
    }
}

/// Returns true if `path` is `/api` or below it.
pub fn is_api_path(path: &str) -> bool {
    path.strip_prefix(API_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Extract the presented token from `Authorization: Bearer` or `X-API-Token`.
///
/// The scheme is case-insensitive. The token itself is taken verbatim.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        headers
            .get(X_API_TOKEN)
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
    })
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// Authorize a request against the configured token map.
pub fn authorize(
    path: &str,
    method: &Method,
    raw: IpAddr,
    headers: &HeaderMap,
    config: &AuthConfig,
) -> AuthorizationResult {
    if !is_api_path(path) {
        return AuthorizationResult::Authorized {
            role: Role::Admin,
            client_ip: raw,
            source: AuthSource::Loopback,
        };
    }

    let client_ip = resolve_client_ip(raw, headers, config.trust_proxy);
    let loopback = is_loopback(client_ip);
    let required = required_role(method);

    if !config.has_tokens() {
        return if loopback {
            AuthorizationResult::Authorized {
                role: Role::Admin,
                client_ip,
                source: AuthSource::Loopback,
            }
        } else {
            AuthorizationResult::denied(DenialKind::Forbidden, "remote access disabled", client_ip)
        };
    }

    let Some(token) = extract_token(headers) else {
        return if loopback && config.allow_loopback_without_token {
            AuthorizationResult::Authorized {
                role: Role::Admin,
                client_ip,
                source: AuthSource::LoopbackBypass,
            }
        } else {
            AuthorizationResult::denied(DenialKind::Unauthorized, "missing token", client_ip)
        };
    };

    let Some(&role) = config.token_roles.get(token) else {
        return AuthorizationResult::denied(DenialKind::Unauthorized, "invalid token", client_ip);
    };

    if !role.satisfies(required) {
        return AuthorizationResult::denied(
            DenialKind::Forbidden,
            format!("{} cannot perform {}", role, method),
            client_ip,
        );
    }

    AuthorizationResult::Authorized {
        role,
        client_ip,
        source: AuthSource::Token,
    }
}
