//! Gateway middleware.
//! Guards every API request before its handler runs.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::gateway::{epoch_millis, Gateway};
use crate::http::request::request_id;
use crate::http::response::{apply_rate_limit_headers, GatewayError};
use crate::observability::audit::AuditRecord;
use crate::observability::metrics;
use crate::resilience::timeouts::{run_with_deadline, DeadlineError};
use crate::security::authorizer::is_api_path;
use crate::security::path::canonicalize;
use crate::security::role::is_read_method;

/// Wrap `router` so every API request passes through the gateway.
pub fn with_gateway<S>(router: Router<S>, gateway: Arc<Gateway>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(gateway, gateway_middleware))
}

pub async fn gateway_middleware(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_api_path(&path) && !is_api_path(&canonicalize(&path)) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(request.headers());

    let admitted = gateway.admit(&path, &method, peer.ip(), request.headers(), epoch_millis());
    let (response, role, client_ip) = match admitted {
        Err(rejection) => (
            rejection.error.into_response(),
            rejection.role,
            rejection.client_ip,
        ),
        Ok(admission) => {
            let context = admission.context;
            request.extensions_mut().insert(context);

            let mut response = if admission.high_risk {
                dispatch_with_deadline(&gateway, request, next, &method, &path).await
            } else {
                next.run(request).await
            };
            apply_rate_limit_headers(response.headers_mut(), &admission.rate_limit);
            (response, Some(context.role), context.client_ip)
        }
    };

    let status = response.status().as_u16();
    metrics::record_request(method.as_str(), status, start);

    if !is_read_method(&method) {
        AuditRecord::new(
            request_id,
            method.as_str(),
            path,
            status,
            start.elapsed(),
            role,
            client_ip,
        )
        .emit();
    }

    response
}

async fn dispatch_with_deadline(
    gateway: &Gateway,
    request: Request<Body>,
    next: Next,
    method: &Method,
    path: &str,
) -> Response {
    let budget = gateway.high_risk_timeout();
    let late_method = method.clone();
    let late_path = path.to_string();

    let outcome = run_with_deadline(next.run(request), budget, move |late| match late {
        Ok(response) => tracing::warn!(
            method = %late_method,
            path = %late_path,
            status = response.status().as_u16(),
            "High-risk handler completed after deadline"
        ),
        Err(e) => tracing::error!(
            method = %late_method,
            path = %late_path,
            error = %e,
            "High-risk handler failed after deadline"
        ),
    })
    .await;

    match outcome {
        Ok(response) => response,
        Err(DeadlineError::Elapsed(_)) => {
            let budget_ms = gateway.security().high_risk_mutating_timeout_ms;
            tracing::warn!(
                method = %method,
                path = %path,
                budget_ms,
                "High-risk handler exceeded budget"
            );
            metrics::record_high_risk_timeout();
            GatewayError::GatewayTimeout(budget_ms).into_response()
        }
        Err(DeadlineError::Failed(e)) => {
            tracing::error!(
                method = %method,
                path = %path,
                error = %e,
                "High-risk handler failed"
            );
            GatewayError::Internal("handler failed".to_string()).into_response()
        }
    }
}
