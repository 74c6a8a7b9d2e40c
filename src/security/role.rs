//! Privilege roles and the method → required role rule.
//!
//! # Design Decisions
//! - Three tiers, totally ordered: `Read < Write < Admin`
//! - The required role depends only on the HTTP method
//! - No method requires `Admin`; it is only granted by unscoped tokens and loopback access

use axum::http::Method;
use serde::Serialize;
use std::fmt;

/// Privilege role held by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Read,
    Write,
    Admin,
}

impl Role {
    /// Numeric rank used for privilege comparison.
    pub fn rank(self) -> u8 {
        match self {
            Role::Read => 0,
            Role::Write => 1,
            Role::Admin => 2,
        }
    }

    /// Parse a role scope name. Returns `None` for unrecognized names.
    pub fn from_scope(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "read" => Some(Role::Read),
            "write" => Some(Role::Write),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Returns true if this role satisfies `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Read => "read",
            Role::Write => "write",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true for methods that never mutate state (`GET`, `HEAD`, `OPTIONS`).
pub fn is_read_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

/// Minimum role needed to perform `method`.
pub fn required_role(method: &Method) -> Role {
    if is_read_method(method) {
        Role::Read
    } else {
        Role::Write
    }
}
