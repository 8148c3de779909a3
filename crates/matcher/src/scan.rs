//! Brute-force nearest-neighbor selection.
//!
//! O(n·d) per query with no index structure. Fine for tenants with hundreds
//! of enrolled faces; an ANN index would have to keep the threshold,
//! tie-break and confidence rules below to be a drop-in replacement.

use store::ActiveEmbedding;

use crate::distance::euclidean_distance;
use crate::types::MatchError;

/// Running minimum over a candidate scan.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BestCandidate {
    threshold: f32,
    best: Option<(usize, f32)>,
}

impl BestCandidate {
    pub(crate) fn new(threshold: f32) -> Self {
        Self {
            threshold,
            best: None,
        }
    }

    /// Compare one candidate against the query.
    ///
    /// Accepts only when the distance is strictly below both the threshold and
    /// the current best, so on ties the earlier candidate wins.
    pub(crate) fn consider(
        &mut self,
        index: usize,
        query: &[f32],
        candidate: &ActiveEmbedding,
    ) -> Result<(), MatchError> {
        let stored = &candidate.record.vector;
        if stored.len() != query.len() {
            return Err(MatchError::DimensionMismatch {
                subject_id: candidate.record.subject_id.clone(),
                expected: query.len(),
                found: stored.len(),
            });
        }

        let distance = euclidean_distance(query, stored);
        let beats_best = self.best.map_or(true, |(_, best)| distance < best);
        if distance < self.threshold && beats_best {
            self.best = Some((index, distance));
        }
        Ok(())
    }

    /// Index into the scanned slice and distance of the accepted candidate.
    pub(crate) fn finish(self) -> Option<(usize, f32)> {
        self.best
    }
}

/// Pick the closest candidate under `threshold`, synchronously.
///
/// Returns the candidate's position in `candidates` and its distance, or
/// `None` when nothing is close enough.
pub fn best_candidate(
    query: &[f32],
    candidates: &[ActiveEmbedding],
    threshold: f32,
) -> Result<Option<(usize, f32)>, MatchError> {
    let mut best = BestCandidate::new(threshold);
    for (index, candidate) in candidates.iter().enumerate() {
        best.consider(index, query, candidate)?;
    }
    Ok(best.finish())
}
