//! Environment-derived auth and security configuration.
//!
//! # Responsibilities
//! - Parse the admin token and role-scoped token list into `AuthConfig`
//! - Parse numeric limits and flags into `SecurityConfig`
//!
//! # Design Decisions
//! - Parsing never fails: malformed or non-positive values fall back to defaults
//! - Lookups go through an injected function so tests never touch the process env
//! - An unscoped token is granted `Admin` (legacy single-token behavior)

use std::collections::HashMap;
use std::fmt;

use crate::security::role::Role;

pub const TOKEN_ENV: &str = "GATEWAY_API_TOKEN";
pub const TOKENS_ENV: &str = "GATEWAY_API_TOKENS";
pub const ALLOW_LOOPBACK_WITHOUT_TOKEN_ENV: &str = "GATEWAY_ALLOW_LOOPBACK_WITHOUT_TOKEN";
pub const TRUST_PROXY_ENV: &str = "GATEWAY_TRUST_PROXY";
pub const RATE_LIMIT_WINDOW_MS_ENV: &str = "GATEWAY_RATE_LIMIT_WINDOW_MS";
pub const READ_RATE_LIMIT_MAX_ENV: &str = "GATEWAY_READ_RATE_LIMIT_MAX";
pub const WRITE_RATE_LIMIT_MAX_ENV: &str = "GATEWAY_WRITE_RATE_LIMIT_MAX";
pub const MAX_BODY_BYTES_ENV: &str = "GATEWAY_MAX_BODY_BYTES";
pub const MAX_UPLOAD_BODY_BYTES_ENV: &str = "GATEWAY_MAX_UPLOAD_BODY_BYTES";
pub const HIGH_RISK_TIMEOUT_MS_ENV: &str = "GATEWAY_HIGH_RISK_TIMEOUT_MS";
pub const ENABLE_REMOTE_TERMINAL_CONTROL_ENV: &str = "GATEWAY_ENABLE_REMOTE_TERMINAL_CONTROL";

pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_READ_RATE_LIMIT_MAX: u32 = 300;
pub const DEFAULT_WRITE_RATE_LIMIT_MAX: u32 = 60;
pub const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_MAX_UPLOAD_BODY_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_HIGH_RISK_TIMEOUT_MS: u64 = 30_000;

/// Token → role map plus loopback/proxy flags.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token_roles: HashMap<String, Role>,
    pub allow_loopback_without_token: bool,
    pub trust_proxy: bool,
}

// Token values must never reach logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_count", &self.token_roles.len())
            .field("allow_loopback_without_token", &self.allow_loopback_without_token)
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

impl AuthConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut token_roles = HashMap::new();

        if let Some(token) = lookup(TOKEN_ENV) {
            let token = token.trim();
            if !token.is_empty() {
                token_roles.insert(token.to_string(), Role::Admin);
            }
        }

        if let Some(list) = lookup(TOKENS_ENV) {
            for (token, role) in parse_token_list(&list) {
                token_roles.insert(token, role);
            }
        }

        Self {
            token_roles,
            allow_loopback_without_token: parse_bool(
                ALLOW_LOOPBACK_WITHOUT_TOKEN_ENV,
                lookup(ALLOW_LOOPBACK_WITHOUT_TOKEN_ENV),
                false,
            ),
            trust_proxy: parse_bool(TRUST_PROXY_ENV, lookup(TRUST_PROXY_ENV), false),
        }
    }

    /// Build from explicit `(token, role)` pairs.
    pub fn with_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (S, Role)>,
        S: Into<String>,
    {
        Self {
            token_roles: tokens.into_iter().map(|(t, r)| (t.into(), r)).collect(),
            ..Self::default()
        }
    }

    pub fn has_tokens(&self) -> bool {
        !self.token_roles.is_empty()
    }
}

/// Parse a comma-separated `role:token` list.
///
/// Entries without a recognized role prefix are kept whole as admin tokens.
pub fn parse_token_list(raw: &str) -> Vec<(String, Role)> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (token, role) = match entry.split_once(':') {
                Some((scope, token)) => match Role::from_scope(scope) {
                    Some(role) => (token.trim(), role),
                    None => (entry, Role::Admin),
                },
                None => (entry, Role::Admin),
            };
            if token.is_empty() {
                tracing::warn!(env = TOKENS_ENV, "Ignoring token entry with empty value");
                None
            } else {
                Some((token.to_string(), role))
            }
        })
        .collect()
}

/// Rate, size and time limits.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub rate_limit_window_ms: u64,
    pub read_rate_limit_max: u32,
    pub write_rate_limit_max: u32,
    pub max_body_bytes: u64,
    pub max_upload_body_bytes: u64,
    pub high_risk_mutating_timeout_ms: u64,
    pub enable_remote_terminal_control: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_ms: DEFAULT_RATE_LIMIT_WINDOW_MS,
            read_rate_limit_max: DEFAULT_READ_RATE_LIMIT_MAX,
            write_rate_limit_max: DEFAULT_WRITE_RATE_LIMIT_MAX,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_upload_body_bytes: DEFAULT_MAX_UPLOAD_BODY_BYTES,
            high_risk_mutating_timeout_ms: DEFAULT_HIGH_RISK_TIMEOUT_MS,
            enable_remote_terminal_control: false,
        }
    }
}

impl SecurityConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let positive = |key: &str, default: u64| parse_positive(key, lookup(key), default);
        let positive_u32 = |key: &str, default: u32| {
            u32::try_from(positive(key, u64::from(default))).unwrap_or(u32::MAX)
        };

        Self {
            rate_limit_window_ms: positive(RATE_LIMIT_WINDOW_MS_ENV, DEFAULT_RATE_LIMIT_WINDOW_MS),
            read_rate_limit_max: positive_u32(READ_RATE_LIMIT_MAX_ENV, DEFAULT_READ_RATE_LIMIT_MAX),
            write_rate_limit_max: positive_u32(
                WRITE_RATE_LIMIT_MAX_ENV,
                DEFAULT_WRITE_RATE_LIMIT_MAX,
            ),
            max_body_bytes: positive(MAX_BODY_BYTES_ENV, DEFAULT_MAX_BODY_BYTES),
            max_upload_body_bytes: positive(
                MAX_UPLOAD_BODY_BYTES_ENV,
                DEFAULT_MAX_UPLOAD_BODY_BYTES,
            ),
            high_risk_mutating_timeout_ms: positive(
                HIGH_RISK_TIMEOUT_MS_ENV,
                DEFAULT_HIGH_RISK_TIMEOUT_MS,
            ),
            enable_remote_terminal_control: parse_bool(
                ENABLE_REMOTE_TERMINAL_CONTROL_ENV,
                lookup(ENABLE_REMOTE_TERMINAL_CONTROL_ENV),
                false,
            ),
        }
    }
}

/// Parse a strictly positive integer, falling back to `default`.
pub fn parse_positive(key: &str, raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<i128>() {
        Ok(value) if value > 0 => u64::try_from(value).unwrap_or(u64::MAX),
        _ => {
            tracing::warn!(
                env = key,
                value = %raw,
                default,
                "Invalid positive integer, using default"
            );
            default
        }
    }
}

/// Parse a boolean flag, falling back to `default`.
pub fn parse_bool(key: &str, raw: Option<String>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        "" => default,
        _ => {
            tracing::warn!(env = key, value = %raw, default, "Invalid boolean, using default");
            default
        }
    }
}
