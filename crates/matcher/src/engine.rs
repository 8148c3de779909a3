use std::sync::Arc;
use std::time::Instant;

use store::{validate_vector, EmbeddingStore};

use crate::distance::confidence;
use crate::metrics::{MatchMetrics, RecognitionKind};
use crate::scan::BestCandidate;
use crate::types::{MatchConfig, MatchError, MatchOutcome, MatchQuery, MatchResult};


/// Recognizes a face embedding against a tenant's enrolled embeddings.
///
/// Stateless across calls: every call re-reads the tenant's active
/// embeddings, so an enrollment or soft-delete is visible to the next call.
pub struct Matcher {
    store: Arc<dyn EmbeddingStore>,
    config: MatchConfig,
    metrics: Option<Arc<dyn MatchMetrics>>,
}

impl Matcher {
    /// Construct a matcher over an injected store.
    pub fn new(store: Arc<dyn EmbeddingStore>, config: MatchConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            metrics: None,
        })
    }

    /// Attach a metrics observer.
    pub fn with_metrics(mut self, metrics: Arc<dyn MatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    pub async fn recognize_query(&self, query: &MatchQuery) -> Result<MatchOutcome, MatchError> {
        self.recognize(&query.tenant_id, &query.vector).await
    }

    /// Find the single closest enrolled subject under the threshold.
    ///
    /// Returns `MatchOutcome::NoMatch` for an empty tenant or when every
    /// candidate is at or beyond the threshold. Never retries store failures.
    pub async fn recognize(
        &self,
        tenant_id: &str,
        query: &[f32],
    ) -> Result<MatchOutcome, MatchError> {
        let start = Instant::now();
        let mut scanned = 0;
        let result = self.recognize_inner(tenant_id, query, &mut scanned).await;
        let latency = start.elapsed();

        let kind = match &result {
            Ok(MatchOutcome::Matched(_)) => RecognitionKind::Matched,
            Ok(MatchOutcome::NoMatch) => RecognitionKind::NoMatch,
            Err(err) => RecognitionKind::Failed(err.kind()),
        };

        match &result {
            Ok(MatchOutcome::Matched(hit)) => tracing::info!(
                tenant_id,
                candidates = scanned,
                subject_id = %hit.subject_id,
                distance = hit.distance,
                latency_us = latency.as_micros() as u64,
                "face recognized"
            ),
            Ok(MatchOutcome::NoMatch) => tracing::info!(
                tenant_id,
                candidates = scanned,
                latency_us = latency.as_micros() as u64,
                "no face within threshold"
            ),
            Err(err @ MatchError::DimensionMismatch { .. }) => {
                tracing::error!(tenant_id, error = %err, "stored embedding has wrong dimension")
            }
            Err(err) => tracing::warn!(tenant_id, error = %err, "recognition failed"),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_recognition(tenant_id, kind, latency, scanned);
        }

        result
    }

    async fn recognize_inner(
        &self,
        tenant_id: &str,
        query: &[f32],
        scanned: &mut usize,
    ) -> Result<MatchOutcome, MatchError> {
        if tenant_id.trim().is_empty() {
            return Err(MatchError::Validation("tenant_id must not be empty".into()));
        }
        validate_vector(query)?;

        let candidates = self.store.list_active(tenant_id).await?;
        *scanned = candidates.len();
        if candidates.is_empty() {
            return Ok(MatchOutcome::NoMatch);
        }

        let step = self.config.yield_every;
        let mut best = BestCandidate::new(self.config.threshold);
        for (chunk_no, chunk) in candidates.chunks(step).enumerate() {
            if chunk_no > 0 {
                // Lets a dropped request future stop the scan between chunks.
                tokio::task::yield_now().await;
            }
            for (offset, candidate) in chunk.iter().enumerate() {
                best.consider(chunk_no * step + offset, query, candidate)?;
            }
        }

        let Some((index, distance)) = best.finish() else {
            return Ok(MatchOutcome::NoMatch);
        };
        let record = &candidates[index].record;
        Ok(MatchOutcome::Matched(MatchResult {
            subject_id: record.subject_id.clone(),
            distance,
            confidence: confidence(distance),
            image_ref: record.image_ref.clone(),
        }))
    }
}
