//! Endpoint classification.
//!
//! # Responsibilities
//! - Tag terminal-control routes (extra remote/admin gate)
//! - Tag high-risk mutating routes (wall-clock execution budget)
//! - Tag upload routes (larger body ceiling)
//!
//! # Design Decisions
//! - Fixed segment patterns, `{id}` matches one non-empty segment
//! - No regex to guarantee O(n) matching
//! - A trailing slash is ignored

use axum::http::Method;

use crate::security::role::is_read_method;

const TERMINAL_CONTROL_ROUTES: &[&str] = &[
    "/api/work/{id}/attach",
    "/api/sessions/{id}/attach",
    "/api/sessions/{id}/resume",
    "/api/sessions/yolo",
];

const HIGH_RISK_MUTATING_ROUTES: &[&str] = &[
    "/api/sessions",
    "/api/sessions/spawn",
    "/api/sessions/yolo",
    "/api/sessions/{id}/restart",
    "/api/work/{id}/spawn",
    "/api/tasks/claim-next",
];

const UPLOAD_ROUTES: &[&str] = &["/api/uploads", "/api/tasks/{id}/attachments"];

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_end_matches('/').split('/').skip(1)
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    let mut expected = segments(pattern);
    let mut actual = segments(path);
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some("{id}"), Some(segment)) if !segment.is_empty() => continue,
            (Some(e), Some(a)) if e == a => continue,
            _ => return false,
        }
    }
}

fn matches_any(patterns: &[&str], path: &str) -> bool {
    patterns.iter().any(|p| matches_pattern(p, path))
}

/// Routes that attach to or resume an interactive terminal session.
pub fn is_terminal_control_endpoint(path: &str) -> bool {
    matches_any(TERMINAL_CONTROL_ROUTES, path)
}

/// Mutating requests on routes that spawn processes or claim work.
pub fn is_high_risk_mutating_endpoint(path: &str, method: &Method) -> bool {
    !is_read_method(method) && matches_any(HIGH_RISK_MUTATING_ROUTES, path)
}

/// Routes that accept upload-sized bodies.
pub fn is_upload_endpoint(path: &str) -> bool {
    matches_any(UPLOAD_ROUTES, path)
}
