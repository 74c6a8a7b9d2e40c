//! Gateway middleware driven in-process through a router.

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use api_gateway::config::{AuthConfig, SecurityConfig};
use api_gateway::security::Role;
use api_gateway::{with_gateway, Gateway, GatewayContext};

async fn whoami(Extension(context): Extension<GatewayContext>) -> Json<Value> {
    Json(json!({
        "role": context.role.as_str(),
        "client_ip": context.client_ip.to_string(),
        "source": context.source.as_str(),
    }))
}

fn app(gateway: Gateway, peer: &str, spawned: Arc<AtomicBool>) -> Router {
    let routes = Router::new()
        .route("/api/tasks", get(whoami).post(whoami))
        .route("/api/tasks/{id}", axum::routing::delete(whoami))
        .route("/api/uploads", post(whoami))
        .route("/api/sessions/{id}/attach", post(whoami))
        .route(
            "/api/sessions/spawn",
            post(move || {
                let spawned = spawned.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    spawned.store(true, Ordering::SeqCst);
                    "spawned"
                }
            }),
        )
        .route("/healthz", get(|| async { "ok" }))
        .fallback(|| async { "fallthrough" });

    with_gateway(routes, Arc::new(gateway))
        .layer(MockConnectInfo(peer.parse::<SocketAddr>().unwrap()))
}

fn tokens() -> AuthConfig {
    AuthConfig::with_tokens([("r1", Role::Read), ("w1", Role::Write), ("a1", Role::Admin)])
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_fail_closed_without_tokens() {
    let local = app(
        Gateway::new(AuthConfig::default(), SecurityConfig::default()),
        "127.0.0.1:50000",
        Arc::default(),
    );
    let res = local.oneshot(request("GET", "/api/tasks", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["role"], "admin");
    assert_eq!(body["source"], "loopback");

    let remote = app(
        Gateway::new(AuthConfig::default(), SecurityConfig::default()),
        "10.0.0.7:50000",
        Arc::default(),
    );
    let res = remote.oneshot(request("GET", "/api/tasks", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(body["message"], "remote access disabled");
}

#[tokio::test]
async fn test_token_roles_gate_methods() {
    let gateway = Gateway::new(tokens(), SecurityConfig::default());
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    let res = router
        .clone()
        .oneshot(request("GET", "/api/tasks", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["message"], "missing token");

    let res = router
        .clone()
        .oneshot(request("GET", "/api/tasks", Some("nope")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["message"], "invalid token");

    let res = router
        .clone()
        .oneshot(request("DELETE", "/api/tasks/t1", Some("r1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await["message"], "read cannot perform DELETE");

    let res = router
        .clone()
        .oneshot(request("DELETE", "/api/tasks/t1", Some("w1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["role"], "write");

    let res = router
        .oneshot(request("DELETE", "/api/tasks/t1", Some("a1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["role"], "admin");
    assert_eq!(body["source"], "token");
}

#[tokio::test]
async fn test_rate_limit_headers_and_exhaustion() {
    let gateway = Gateway::new(
        tokens(),
        SecurityConfig {
            read_rate_limit_max: 2,
            ..SecurityConfig::default()
        },
    );
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    let res = router
        .clone()
        .oneshot(request("GET", "/api/tasks", Some("r1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-limit"], "2");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "1");
    assert!(res.headers().contains_key("x-ratelimit-reset"));

    let res = router
        .clone()
        .oneshot(request("GET", "/api/tasks", Some("r1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");

    let res = router
        .clone()
        .oneshot(request("GET", "/api/tasks", Some("r1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    assert_eq!(body_json(res).await["error"], "Too Many Requests");

    // A different token has its own bucket.
    let res = router
        .oneshot(request("GET", "/api/tasks", Some("w1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_declared_body_limits() {
    let gateway = Gateway::new(
        tokens(),
        SecurityConfig {
            max_body_bytes: 1024,
            max_upload_body_bytes: 4096,
            ..SecurityConfig::default()
        },
    );
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    let sized = |uri: &str| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer w1")
            .header(header::CONTENT_LENGTH, "2048")
            .body(Body::from(vec![0u8; 2048]))
            .unwrap()
    };

    let res = router.clone().oneshot(sized("/api/tasks")).await.unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.headers()["x-max-body-bytes"], "1024");
    assert_eq!(body_json(res).await["error"], "Payload Too Large");

    let res = router.oneshot(sized("/api/uploads")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_remote_terminal_control_disabled() {
    let gateway = Gateway::new(tokens(), SecurityConfig::default());
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    let res = router
        .oneshot(request("POST", "/api/sessions/s1/attach", Some("a1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await["message"], "remote terminal control disabled");
}

#[tokio::test]
async fn test_high_risk_deadline_does_not_cancel_handler() {
    let gateway = Gateway::new(
        tokens(),
        SecurityConfig {
            high_risk_mutating_timeout_ms: 50,
            ..SecurityConfig::default()
        },
    );
    let spawned = Arc::new(AtomicBool::new(false));
    let router = app(gateway, "10.0.0.7:50000", spawned.clone());

    let res = router
        .oneshot(request("POST", "/api/sessions/spawn", Some("w1")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(res.headers().contains_key("x-ratelimit-limit"));
    assert_eq!(body_json(res).await["error"], "Gateway Timeout");
    assert!(!spawned.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(spawned.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_forwarded_ip_only_when_trusted() {
    let forwarded = || {
        Request::builder()
            .uri("/api/tasks")
            .header(header::AUTHORIZATION, "Bearer r1")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap()
    };

    let gateway = Gateway::new(tokens(), SecurityConfig::default());
    let untrusted = app(gateway, "10.0.0.7:50000", Arc::default());
    let res = untrusted.oneshot(forwarded()).await.unwrap();
    assert_eq!(body_json(res).await["client_ip"], "10.0.0.7");

    let auth = AuthConfig {
        trust_proxy: true,
        ..tokens()
    };
    let gateway = Gateway::new(auth, SecurityConfig::default());
    let trusted = app(gateway, "10.0.0.7:50000", Arc::default());
    let res = trusted.oneshot(forwarded()).await.unwrap();
    assert_eq!(body_json(res).await["client_ip"], "203.0.113.9");
}

#[tokio::test]
async fn test_non_api_paths_bypass_gateway() {
    let gateway = Gateway::new(
        tokens(),
        SecurityConfig {
            read_rate_limit_max: 1,
            ..SecurityConfig::default()
        },
    );
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    for _ in 0..3 {
        let res = router.clone().oneshot(request("GET", "/healthz", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!res.headers().contains_key("x-ratelimit-limit"));
    }
}

#[tokio::test]
async fn test_non_canonical_api_paths_refused() {
    let gateway = Gateway::new(tokens(), SecurityConfig::default());
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    let res = router
        .clone()
        .oneshot(request("DELETE", "/api/tasks", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    for path in [
        "/./api/tasks",
        "//api/tasks",
        "/x/../api/tasks",
        "/%2e/api/tasks",
        "/%61pi/tasks",
        "/api/./tasks",
    ] {
        let res = router
            .clone()
            .oneshot(request("DELETE", path, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path}");
        let body = body_json(res).await;
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["message"], "non-canonical request path");
    }
}

#[tokio::test]
async fn test_terminal_gate_not_skipped_by_dot_segments() {
    let gateway = Gateway::new(tokens(), SecurityConfig::default());
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    for path in [
        "/api/sessions/s1/attach",
        "/api/sessions/s1/./attach",
        "/api/sessions/s1/attach/.",
        "/api/sessions/s2/../s1/attach",
    ] {
        let res = router
            .clone()
            .oneshot(request("POST", path, Some("a1")))
            .await
            .unwrap();
        let expected = if path == "/api/sessions/s1/attach" {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::BAD_REQUEST
        };
        assert_eq!(res.status(), expected, "{path}");
    }
}

#[tokio::test]
async fn test_non_canonical_paths_outside_api_pass_through() {
    let gateway = Gateway::new(tokens(), SecurityConfig::default());
    let router = app(gateway, "10.0.0.7:50000", Arc::default());

    let res = router
        .oneshot(request("GET", "/static//app.js", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!res.headers().contains_key("x-ratelimit-limit"));
}
