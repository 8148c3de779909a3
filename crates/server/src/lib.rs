//! facegate Server - HTTP REST API for face enrollment and recognition
//!
//! This crate exposes the facegate engine over HTTP:
//!
//! - **Enrollment**: multipart upload of a subject's embedding and photo
//! - **Recognition**: nearest enrolled face within the caller's tenant
//! - **Users**: minimal subject registry management with soft delete
//! - **Health & Metrics**: liveness/readiness probes and Prometheus metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public Endpoints (No Authentication)
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//! - `GET /media/*` - Enrollment photos (when `serve_media` is on)
//!
//! ## Self Endpoints (Any Bearer Token)
//!
//! - `GET /api/users/info` - Profile of the calling user
//!
//! ## Protected Endpoints (Admin Bearer Token)
//!
//! - `POST /api/faces` - Enroll a face (multipart `userId`, `embedding`, `faceImage`)
//! - `POST /api/faces/recognize` - Recognize an embedding
//! - `GET /api/faces/user/{userId}` - Stored face of a user
//! - `GET /api/faces/logs` - Recent recognition logs
//! - `GET /api/users`, `POST /api/users` - List and create users
//! - `GET /api/users/{userId}` - Read a user
//! - `PUT /api/users/{userId}` - Rename a user (`{ "name" }`)
//! - `DELETE /api/users/{userId}` - Soft-delete a user and the user's face
//!
//! Every `/api` route is scoped to the tenant of the bearer token.

pub mod auth;
pub mod config;
pub mod error;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use auth::{Principal, SessionValidator, StaticTokens};
pub use config::{ServerConfig, TokenGrant};
pub use error::{ServerError, ServerResult};
pub use media::{FsMediaStore, MediaStore};
pub use server::{build_router, start_server};
pub use state::ServerState;
