use crate::auth::{bearer_token, Principal};
use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// Correlation id attached to every request.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer token authentication middleware
///
/// Resolves the token to a [`Principal`], applies the per-caller rate limit,
/// and stores the principal in request extensions for handlers.
pub async fn bearer_auth(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| {
            ServerError::Authentication(
                "Access token is required in 'Authorization: Bearer <token>' header".to_string(),
            )
        })?;

    let principal = state
        .sessions
        .validate(token)
        .await
        .ok_or_else(|| ServerError::Authentication("Token is not active".to_string()))?;

    let limiter_key = format!("{}/{}", principal.tenant_id, principal.user_id);
    if !state.check_rate_limit(&limiter_key) {
        return Err(ServerError::RateLimitExceeded);
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Admin gate; must run after [`bearer_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ServerError> {
    match request.extensions().get::<Principal>() {
        Some(principal) if principal.is_admin => Ok(next.run(request).await),
        Some(_) => Err(ServerError::Forbidden("Access denied. Admins only.".to_string())),
        None => Err(ServerError::Authentication("Missing session".to_string())),
    }
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    tracing::info!(
        method = %method,
        path = %path,
        request_id = %request_id,
        "Request started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    metrics::counter!(
        "facegate_http_requests_total",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!("facegate_http_request_seconds").record(duration.as_secs_f64());

    tracing::info!(
        method = %method,
        path = %path,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}
