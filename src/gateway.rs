//! Gateway admission: the per-request sequence of security checks.
//!
//! # Data Flow
//! ```text
//! (path, method, peer, headers)
//!     → canonical path (400)
//!     → authorize (401/403)
//!     → terminal-control gate (403)
//!     → declared body size (413)
//!     → rate limit (429)
//!     → Admission { context, rate-limit decision, high-risk flag }
//! ```
//!
//! The HTTP wiring lives in `http::middleware::pipeline`.

use axum::http::{HeaderMap, Method};
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{AuthConfig, SecurityConfig};
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::security::authorizer::{authorize, AuthSource, AuthorizationResult, DenialKind};
use crate::security::classifier::{is_high_risk_mutating_endpoint, is_terminal_control_endpoint};
use crate::security::identity::{is_loopback, resolve_client_ip};
use crate::security::limits::check_body_size;
use crate::security::path::is_canonical;
use crate::security::rate_limit::{build_rate_limit_key, FixedWindowLimiter, RateLimitDecision};
use crate::security::role::{is_read_method, Role};

/// Identity handed to downstream handlers via request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayContext {
    pub role: Role,
    pub client_ip: IpAddr,
    pub source: AuthSource,
}

/// A request that passed every check.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub context: GatewayContext,
    pub rate_limit: RateLimitDecision,
    pub high_risk: bool,
}

/// A request refused before reaching its handler.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub error: GatewayError,
    pub client_ip: IpAddr,
    pub role: Option<Role>,
}

/// Access-control gateway state: immutable configs plus limiter counters.
#[derive(Debug)]
pub struct Gateway {
    auth: AuthConfig,
    security: SecurityConfig,
    limiter: FixedWindowLimiter,
}

impl Gateway {
    pub fn new(auth: AuthConfig, security: SecurityConfig) -> Self {
        Self {
            auth,
            security,
            limiter: FixedWindowLimiter::new(),
        }
    }

    /// Build from the process environment.
    pub fn from_env() -> Self {
        let gateway = Self::new(AuthConfig::from_env(), SecurityConfig::from_env());
        tracing::info!(
            tokens = gateway.auth.token_roles.len(),
            allow_loopback_without_token = gateway.auth.allow_loopback_without_token,
            trust_proxy = gateway.auth.trust_proxy,
            window_ms = gateway.security.rate_limit_window_ms,
            read_max = gateway.security.read_rate_limit_max,
            write_max = gateway.security.write_rate_limit_max,
            remote_terminal_control = gateway.security.enable_remote_terminal_control,
            "Access control configured"
        );
        if !gateway.auth.has_tokens() {
            tracing::warn!("No API tokens configured; API is reachable from loopback only");
        }
        gateway
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }

    /// Execution budget for high-risk mutating endpoints.
    pub fn high_risk_timeout(&self) -> Duration {
        Duration::from_millis(self.security.high_risk_mutating_timeout_ms)
    }

    /// Run every check for an API request.
    pub fn admit(
        &self,
        path: &str,
        method: &Method,
        raw: IpAddr,
        headers: &HeaderMap,
        now_ms: i64,
    ) -> Result<Admission, Rejection> {
        if !is_canonical(path) {
            let client_ip = resolve_client_ip(raw, headers, self.auth.trust_proxy);
            tracing::warn!(
                client_ip = %client_ip,
                method = %method,
                path = %path,
                "Non-canonical request path"
            );
            metrics::record_denied("non_canonical_path");
            return Err(Rejection {
                error: GatewayError::BadRequest("non-canonical request path".to_string()),
                client_ip,
                role: None,
            });
        }

        let (role, client_ip, source) = match authorize(path, method, raw, headers, &self.auth) {
            AuthorizationResult::Authorized {
                role,
                client_ip,
                source,
            } => (role, client_ip, source),
            AuthorizationResult::Denied {
                kind,
                message,
                client_ip,
            } => {
                tracing::warn!(
                    client_ip = %client_ip,
                    method = %method,
                    path = %path,
                    reason = %message,
                    "Request denied"
                );
                let error = match kind {
                    DenialKind::Unauthorized => {
                        metrics::record_denied("unauthorized");
                        GatewayError::Unauthorized(message)
                    }
                    DenialKind::Forbidden => {
                        metrics::record_denied("forbidden");
                        GatewayError::Forbidden(message)
                    }
                };
                return Err(Rejection {
                    error,
                    client_ip,
                    role: None,
                });
            }
        };

        let reject = |error: GatewayError| Rejection {
            error,
            client_ip,
            role: Some(role),
        };

        if is_terminal_control_endpoint(path) && !is_loopback(client_ip) {
            let message = if !self.security.enable_remote_terminal_control {
                Some("remote terminal control disabled")
            } else if role != Role::Admin {
                Some("remote terminal control requires admin")
            } else {
                None
            };
            if let Some(message) = message {
                tracing::warn!(
                    client_ip = %client_ip,
                    path = %path,
                    role = %role,
                    "Remote terminal control refused"
                );
                metrics::record_denied("terminal_control");
                return Err(reject(GatewayError::Forbidden(message.to_string())));
            }
        }

        if let Err(too_large) = check_body_size(path, headers, &self.security) {
            tracing::warn!(
                client_ip = %client_ip,
                path = %path,
                declared = too_large.declared,
                max_bytes = too_large.max_bytes,
                "Declared body too large"
            );
            metrics::record_denied("payload_too_large");
            return Err(reject(GatewayError::PayloadTooLarge {
                declared: too_large.declared,
                max_bytes: too_large.max_bytes,
            }));
        }

        let key = build_rate_limit_key(headers, client_ip);
        let (class, max) = if is_read_method(method) {
            ("read", self.security.read_rate_limit_max)
        } else {
            ("write", self.security.write_rate_limit_max)
        };
        let decision = self
            .limiter
            .check(&key, max, self.security.rate_limit_window_ms, now_ms);
        if !decision.allowed {
            tracing::warn!(client = %key, class, limit = max, "Rate limit exceeded");
            metrics::record_rate_limited(class);
            return Err(reject(GatewayError::TooManyRequests(decision)));
        }

        Ok(Admission {
            context: GatewayContext {
                role,
                client_ip,
                source,
            },
            rate_limit: decision,
            high_risk: is_high_risk_mutating_endpoint(path, method),
        })
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> i64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}
