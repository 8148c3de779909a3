//! # facegate Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` sits on top of the embedding store (`store`). Given a query
//! embedding and a tenant, it scans every active embedding of that tenant,
//! computes Euclidean distances, and returns the single closest subject whose
//! distance is strictly below the recognition threshold.
//!
//! ## Core Types
//!
//! - [`MatchConfig`]: recognition threshold (default `0.6`) and the number of
//!   candidates scanned between cooperative yields.
//! - [`MatchOutcome`]: either [`MatchOutcome::Matched`] with a
//!   [`MatchResult`] or the explicit [`MatchOutcome::NoMatch`] sentinel.
//! - [`MatchError`]: validation, dimension mismatch, and store failures.
//!   Only [`MatchError::StoreUnavailable`] is retryable.
//! - [`Matcher`]: the recognizer. The store is injected at construction.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use matcher::{MatchConfig, MatchOutcome, Matcher};
//! use store::{BackendConfig, BackendRegistry, CompressionConfig, FaceStore, EMBEDDING_DIM};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = BackendConfig::in_memory().build()?;
//! let registry = Arc::new(BackendRegistry::new(backend.clone(), CompressionConfig::default()));
//! let store = Arc::new(FaceStore::new(backend, registry, CompressionConfig::default()));
//!
//! let matcher = Matcher::new(store, MatchConfig::default())?;
//! match matcher.recognize("tenant-a", &vec![0.0; EMBEDDING_DIM]).await? {
//!     MatchOutcome::Matched(hit) => println!("{} at {}", hit.subject_id, hit.distance),
//!     MatchOutcome::NoMatch => println!("nobody"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! Attach a [`MatchMetrics`] implementation with [`Matcher::with_metrics`] to
//! record per-call outcome, latency and candidate counts.

pub mod distance;
pub mod engine;
pub mod metrics;
mod scan;
pub mod types;

pub use crate::distance::{confidence, euclidean_distance};
pub use crate::engine::Matcher;
pub use crate::metrics::{MatchMetrics, RecognitionKind};
pub use crate::scan::best_candidate;
pub use crate::types::{MatchConfig, MatchError, MatchOutcome, MatchQuery, MatchResult};
