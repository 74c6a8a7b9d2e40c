//! Client identity resolution.
//!
//! # Design Decisions
//! - Never trust `X-Forwarded-For` unless the deployment opts in
//! - Only the first (client-most) forwarded entry is considered
//! - Unparsable forwarded values fall back to the socket peer address

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Determine the effective client IP for a request.
pub fn resolve_client_ip(raw: IpAddr, headers: &HeaderMap, trust_proxy: bool) -> IpAddr {
    if !trust_proxy {
        return raw;
    }

    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(parse_forwarded_entry)
        .unwrap_or(raw)
}

fn parse_forwarded_entry(entry: &str) -> Option<IpAddr> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Some(ip);
    }

    // ipv4:port
    if entry.contains('.') && entry.contains(':') && !entry.contains('[') {
        if let Some((host, _port)) = entry.rsplit_once(':') {
            return host.parse().ok();
        }
    }

    // [ipv6]:port
    entry.parse::<SocketAddr>().ok().map(|addr| addr.ip())
}

/// Returns true for loopback addresses, including IPv4-mapped `::ffff:127.*`.
pub fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

/// Loopback check over a textual host, accepting the literal `localhost`.
pub fn is_loopback_host(host: &str) -> bool {
    let host = host.trim();
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(is_loopback)
}
