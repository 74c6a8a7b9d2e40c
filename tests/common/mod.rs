//! Shared utilities for integration tests.

use axum::{
    http::{HeaderMap, Method, Uri},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Start an upstream that echoes what the gateway forwarded.
pub async fn start_echo_backend(addr: SocketAddr) {
    let app = Router::new().fallback(echo);
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "role": header("x-gateway-role"),
        "client_ip": header("x-gateway-client-ip"),
    }))
}
