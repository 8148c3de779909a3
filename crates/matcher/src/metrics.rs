// Metrics hooks for the matcher.
//
// A `MatchMetrics` implementation is handed to `Matcher::with_metrics` at
// construction time; every `recognize` call then reports its outcome, latency
// and scanned candidate count. This keeps instrumentation decoupled from any
// specific metrics backend.
use std::time::Duration;

/// Coarse outcome label for a recognition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionKind {
    Matched,
    NoMatch,
    /// The call failed; the label is [`crate::MatchError::kind`].
    Failed(&'static str),
}

impl RecognitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionKind::Matched => "matched",
            RecognitionKind::NoMatch => "no_match",
            RecognitionKind::Failed(kind) => kind,
        }
    }
}

/// Metrics observer for recognition calls.
pub trait MatchMetrics: Send + Sync {
    /// `candidates` is the number of active embeddings scanned (zero when the
    /// call failed before the scan).
    fn record_recognition(
        &self,
        tenant_id: &str,
        kind: RecognitionKind,
        latency: Duration,
        candidates: usize,
    );
}
