use serde::{Deserialize, Serialize};
use store::StoreError;
use thiserror::Error;

/// Tuning knobs for recognition.
///
/// `MatchConfig` is cheap to clone and serde-friendly so it can be embedded in
/// higher-level configs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Exclusive upper bound on accepted Euclidean distance. A candidate at or
    /// above this distance is "not this person" even if it is the closest.
    #[serde(default = "MatchConfig::default_threshold")]
    pub threshold: f32,
    /// Candidates scanned between cooperative yields to the async runtime,
    /// so a cancelled request stops scanning promptly.
    #[serde(default = "MatchConfig::default_yield_every")]
    pub yield_every: usize,
}

impl MatchConfig {
    pub(crate) fn default_threshold() -> f32 {
        0.6
    }

    pub(crate) fn default_yield_every() -> usize {
        256
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_yield_every(mut self, yield_every: usize) -> Self {
        self.yield_every = yield_every;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "threshold must be a finite number greater than zero".into(),
            ));
        }
        if self.yield_every == 0 {
            return Err(MatchError::InvalidConfig(
                "yield_every must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: Self::default_threshold(),
            yield_every: Self::default_yield_every(),
        }
    }
}

/// A recognition request scoped to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchQuery {
    pub tenant_id: String,
    pub vector: Vec<f32>,
}

/// The accepted candidate. Every field is always populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub subject_id: String,
    /// Euclidean distance between query and stored embedding.
    pub distance: f32,
    /// `max(0, 1 - distance / 2)`. A display heuristic, not a calibrated
    /// probability.
    pub confidence: f32,
    /// Storage key of the enrollment photo; callers resolve it to a URL.
    pub image_ref: String,
}

/// Either a full match or the explicit no-match sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched(MatchResult),
    NoMatch,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    pub fn as_match(&self) -> Option<&MatchResult> {
        match self {
            MatchOutcome::Matched(result) => Some(result),
            MatchOutcome::NoMatch => None,
        }
    }
}

/// Errors produced by the matching layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
    /// Malformed query. The caller must fix the input; never retried.
    #[error("validation error: {0}")]
    Validation(String),
    /// A stored vector disagrees with the query length. Indicates corrupted
    /// or mixed-schema records.
    #[error("dimension mismatch for subject {subject_id}: expected {expected}, found {found}")]
    DimensionMismatch {
        subject_id: String,
        expected: usize,
        found: usize,
    },
    /// Transient infrastructure failure; the caller may retry with backoff.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl MatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::StoreUnavailable(_))
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::InvalidConfig(_) => "invalid_config",
            MatchError::Validation(_) => "validation",
            MatchError::DimensionMismatch { .. } => "dimension_mismatch",
            MatchError::StoreUnavailable(_) => "store_unavailable",
            MatchError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for MatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => MatchError::Validation(msg),
            StoreError::Unavailable(msg) => MatchError::StoreUnavailable(msg),
            other => MatchError::Store(other),
        }
    }
}
