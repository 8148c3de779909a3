use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Number of elements every face embedding must carry.
pub const EMBEDDING_DIM: usize = 512;

/// Bump this value whenever the on-disk `EmbeddingRecord` layout changes.
pub const RECORD_SCHEMA_VERSION: u16 = 1;

const fn default_schema_version() -> u16 {
    RECORD_SCHEMA_VERSION
}

/// One enrolled face for a subject inside a tenant.
///
/// At most one live record exists per `(tenant_id, subject_id)`; re-enrollment
/// replaces `vector`, `image_ref` and `created_at` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Schema version for backward compatibility when deserializing.
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub tenant_id: String,
    pub subject_id: String,
    /// Face embedding produced by the external extractor.
    pub vector: Vec<f32>,
    /// Storage key of the enrollment photo. Never used for matching.
    pub image_ref: String,
    /// Enrollment or last re-enrollment time.
    pub created_at: DateTime<Utc>,
    /// Soft-delete flag; deleted records stay on disk for audit.
    #[serde(default)]
    pub deleted: bool,
}

/// A live embedding joined with the registry's view of its subject.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEmbedding {
    pub record: EmbeddingRecord,
    pub display_name: String,
}

/// Registry entry for an individual that may enroll a face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub tenant_id: String,
    pub subject_id: String,
    pub display_name: String,
    #[serde(default)]
    pub deleted: bool,
    /// Set once the subject has a stored face embedding.
    #[serde(default)]
    pub face_registered: bool,
    pub created_at: DateTime<Utc>,
}

impl SubjectInfo {
    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}

/// Audit entry written after an accepted recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionLog {
    pub tenant_id: String,
    pub subject_id: String,
    pub distance: f32,
    pub confidence: f32,
    /// Threshold in force when the match was accepted.
    pub threshold: f32,
    pub logged_at: DateTime<Utc>,
}

/// Check the embedding length and that every element is finite.
///
/// Wrong lengths are rejected rather than truncated or padded.
pub fn validate_vector(vector: &[f32]) -> Result<(), StoreError> {
    if vector.len() != EMBEDDING_DIM {
        return Err(StoreError::Validation(format!(
            "embedding must have exactly {EMBEDDING_DIM} elements, got {}",
            vector.len()
        )));
    }
    if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
        return Err(StoreError::Validation(format!(
            "embedding element {pos} is not a finite number"
        )));
    }
    Ok(())
}

pub(crate) fn validate_id(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
