//! API route handlers
//!
//! Routes are organized by functionality:
//!
//! - `health`: Health checks, readiness, and metrics
//! - `faces`: Face enrollment, recognition, and recognition logs
//! - `users`: Subject registry management

pub mod faces;
pub mod health;
pub mod users;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info
///
/// Root endpoint (GET /), no authentication.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "facegate",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/faces",
            "/api/faces/recognize",
            "/api/faces/user/{userId}",
            "/api/faces/logs",
            "/api/users",
            "/api/users/{userId}",
            "/api/users/info",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound("no such route".to_string())
}
