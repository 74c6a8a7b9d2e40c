//! Audit records for mutating API requests.
//!
//! One record per mutating request, whatever the outcome. Records carry the
//! resolved identity, never token values or bodies.

use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

use crate::security::Role;

/// Tracing target audit records are emitted under.
pub const AUDIT_TARGET: &str = "api_gateway::audit";

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub role: Option<Role>,
    pub client_ip: IpAddr,
}

impl AuditRecord {
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        duration: Duration,
        role: Option<Role>,
        client_ip: IpAddr,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            status,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            role,
            client_ip,
        }
    }

    /// Emit the record to the audit target.
    pub fn emit(&self) {
        tracing::info!(
            target: AUDIT_TARGET,
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            status = self.status,
            duration_ms = self.duration_ms,
            role = self.role.map(Role::as_str).unwrap_or("none"),
            client_ip = %self.client_ip,
            "audit"
        );
    }
}
