//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the local health route and the upstream proxy
//! - Wire up middleware (request ID, tracing, gateway, body limit)
//! - Bind server to listener with graceful shutdown
//! - Forward admitted requests to the upstream with the gateway context

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, Scheme},
        HeaderName, HeaderValue, Request, Uri, Version,
    },
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::{ConfigError, GatewayConfig};
use crate::gateway::{Gateway, GatewayContext};
use crate::http::middleware::with_gateway;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::GatewayError;

pub const X_GATEWAY_ROLE: HeaderName = HeaderName::from_static("x-gateway-role");
pub const X_GATEWAY_CLIENT_IP: HeaderName = HeaderName::from_static("x-gateway-client-ip");

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
    pub upstream_timeout: Duration,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server guarding the configured upstream.
    pub fn new(config: GatewayConfig, gateway: Arc<Gateway>) -> Result<Self, ConfigError> {
        let upstream = upstream_authority(&config.upstream.url)?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            client,
            upstream,
            upstream_timeout: Duration::from_secs(config.upstream.timeout_secs),
        };

        let router = Self::build_router(state, gateway);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, gateway: Arc<Gateway>) -> Router {
        let body_cap =
            usize::try_from(gateway.security().max_upload_body_bytes).unwrap_or(usize::MAX);

        let routes = Router::new()
            .route("/healthz", get(healthz))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(body_cap));

        with_gateway(routes, gateway).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Consume the server, returning its router.
    pub fn into_router(self) -> Router {
        self.router
    }
}

fn upstream_authority(raw: &str) -> Result<Authority, ConfigError> {
    let url = url::Url::parse(raw).map_err(|e| ConfigError::InvalidUpstream(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUpstream(format!("'{}' has no host", raw)))?;
    let port = url.port_or_known_default().unwrap_or(80);
    Authority::from_str(&format!("{}:{}", host, port))
        .map_err(|e| ConfigError::InvalidUpstream(e.to_string()))
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Forward a request to the upstream application.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = match Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(state.upstream.clone())
        .path_and_query(path_and_query)
        .build()
    {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream URI");
            return GatewayError::BadGateway("invalid upstream request".to_string()).into_response();
        }
    };
    parts.uri = uri;
    parts.version = Version::HTTP_11;

    // Never forward client-supplied identity headers.
    parts.headers.remove(X_GATEWAY_ROLE);
    parts.headers.remove(X_GATEWAY_CLIENT_IP);
    if let Some(context) = parts.extensions.get::<GatewayContext>().copied() {
        parts
            .headers
            .insert(X_GATEWAY_ROLE, HeaderValue::from_static(context.role.as_str()));
        if let Ok(ip) = HeaderValue::from_str(&context.client_ip.to_string()) {
            parts.headers.insert(X_GATEWAY_CLIENT_IP, ip);
        }
    }

    let forwarded = Request::from_parts(parts, body);

    match tokio::time::timeout(state.upstream_timeout, state.client.request(forwarded)).await {
        Ok(Ok(response)) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(upstream = %state.upstream, error = %e, "Upstream error");
            GatewayError::BadGateway("upstream request failed".to_string()).into_response()
        }
        Err(_) => {
            tracing::error!(upstream = %state.upstream, "Upstream timed out");
            let millis = u64::try_from(state.upstream_timeout.as_millis()).unwrap_or(u64::MAX);
            GatewayError::GatewayTimeout(millis).into_response()
        }
    }
}
