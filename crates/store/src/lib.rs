//! # facegate store
//!
//! Durable, per-tenant storage for face embeddings. Each tenant holds at most
//! one live [`EmbeddingRecord`] per subject; re-enrollment overwrites it and
//! deletion is logical (the `deleted` flag), so records survive for audit.
//!
//! ## Core Features
//!
//! - **Pluggable Backends**: every byte goes through the [`StoreBackend`]
//!   trait. An ordered in-memory map and a Redb file backend (feature
//!   `backend-redb`, on by default) ship with the crate.
//! - **Registry join**: [`FaceStore::list_active`] drops records whose own
//!   flag is set *and* records whose subject is missing or deleted in the
//!   [`SubjectRegistry`]. Both flags are honored.
//! - **Compact Storage**: values are bincode-encoded and zstd-compressed
//!   (see [`CompressionConfig`]).
//! - **Audit**: accepted recognitions can be appended as [`RecognitionLog`]
//!   entries and listed per tenant.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use store::{BackendConfig, BackendRegistry, CompressionConfig, EmbeddingStore, FaceStore,
//!             SubjectRegistry, EMBEDDING_DIM};
//!
//! # async fn demo() -> Result<(), store::StoreError> {
//! let backend = BackendConfig::in_memory().build()?;
//! let registry = Arc::new(BackendRegistry::new(backend.clone(), CompressionConfig::default()));
//! registry.register("tenant-a", "alice", "Alice").await?;
//!
//! let store = FaceStore::new(backend, registry, CompressionConfig::default());
//! store.upsert("tenant-a", "alice", vec![0.0; EMBEDDING_DIM], "faces/alice.jpg").await?;
//! assert_eq!(store.list_active("tenant-a").await?.len(), 1);
//! # Ok(())
//! # }
//! ```

mod backend;
mod codec;
mod record;
mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

#[cfg(feature = "backend-redb")]
pub use crate::backend::RedbBackend;
pub use crate::backend::{BackendConfig, InMemoryBackend, StoreBackend};
pub use crate::codec::{CompressionCodec, CompressionConfig};
pub use crate::record::{
    validate_vector, ActiveEmbedding, EmbeddingRecord, RecognitionLog, SubjectInfo,
    EMBEDDING_DIM, RECORD_SCHEMA_VERSION,
};
pub use crate::registry::{BackendRegistry, SubjectRegistry};

use crate::backend::run_blocking;
use crate::codec::keys;
use crate::record::validate_id;

/// Errors produced by the store and the registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Malformed input: wrong vector length, non-finite element, empty id.
    #[error("validation error: {0}")]
    Validation(String),
    /// The subject is unknown to (or deleted from) the tenant's registry.
    #[error("subject {subject_id} not found in tenant {tenant_id}")]
    NotFound {
        tenant_id: String,
        subject_id: String,
    },
    #[error("subject {subject_id} already exists in tenant {tenant_id}")]
    AlreadyExists {
        tenant_id: String,
        subject_id: String,
    },
    /// Backend, IO or runtime failure. Safe to retry with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Stored bytes could not be encoded or decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        Self::Unavailable(err.to_string())
    }

    /// Only infrastructure faults are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Contract the matcher and enrollment flows depend on.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Insert or replace the subject's embedding.
    async fn upsert(
        &self,
        tenant_id: &str,
        subject_id: &str,
        vector: Vec<f32>,
        image_ref: &str,
    ) -> Result<EmbeddingRecord, StoreError>;

    /// Every live embedding of the tenant, in stable key order.
    async fn list_active(&self, tenant_id: &str) -> Result<Vec<ActiveEmbedding>, StoreError>;

    /// The subject's live embedding, if any.
    async fn find_by_subject(
        &self,
        tenant_id: &str,
        subject_id: &str,
    ) -> Result<Option<EmbeddingRecord>, StoreError>;
}

/// Embedding store over a [`StoreBackend`] and a [`SubjectRegistry`].
pub struct FaceStore {
    backend: Arc<dyn StoreBackend>,
    registry: Arc<dyn SubjectRegistry>,
    codec: CompressionConfig,
}

impl FaceStore {
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        registry: Arc<dyn SubjectRegistry>,
        codec: CompressionConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            codec,
        }
    }

    pub fn registry(&self) -> &Arc<dyn SubjectRegistry> {
        &self.registry
    }

    /// Raw stored record, including soft-deleted ones.
    pub async fn get_record(
        &self,
        tenant_id: &str,
        subject_id: &str,
    ) -> Result<Option<EmbeddingRecord>, StoreError> {
        let codec = self.codec.clone();
        let key = keys::entry(keys::EMBEDDING, tenant_id, subject_id);
        run_blocking(&self.backend, move |backend| match backend.get(&key)? {
            Some(bytes) => Ok(Some(codec.decode::<EmbeddingRecord>(&bytes)?)),
            None => Ok(None),
        })
        .await
    }

    /// Soft-delete the subject's embedding. Returns `false` if there was no
    /// live record.
    pub async fn mark_deleted(&self, tenant_id: &str, subject_id: &str) -> Result<bool, StoreError> {
        let codec = self.codec.clone();
        let key = keys::entry(keys::EMBEDDING, tenant_id, subject_id);
        let changed =
            run_blocking(&self.backend, move |backend| retire_embedding(backend, &codec, &key))
                .await?;

        if changed {
            tracing::info!(tenant_id, subject_id, "embedding soft-deleted");
        }
        Ok(changed)
    }

    /// Append an audit entry for an accepted recognition.
    pub async fn append_log(&self, entry: RecognitionLog) -> Result<(), StoreError> {
        validate_id("tenant_id", &entry.tenant_id)?;
        let codec = self.codec.clone();
        // Zero-padded millis keep keys in chronological order.
        let id = format!(
            "{:020}-{}",
            entry.logged_at.timestamp_millis().max(0),
            uuid::Uuid::new_v4()
        );
        let key = keys::entry(keys::LOG, &entry.tenant_id, &id);
        run_blocking(&self.backend, move |backend| {
            backend.put(&key, &codec.encode(&entry)?)
        })
        .await
    }

    /// Most recent audit entries first, at most `limit`.
    pub async fn list_logs(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<RecognitionLog>, StoreError> {
        let codec = self.codec.clone();
        let prefix = keys::tenant_prefix(keys::LOG, tenant_id);
        run_blocking(&self.backend, move |backend| {
            let mut logs = Vec::with_capacity(limit.min(64));
            backend.scan_prefix_rev(&prefix, limit, &mut |_, bytes| {
                logs.push(codec.decode::<RecognitionLog>(bytes)?);
                Ok(())
            })?;
            Ok(logs)
        })
        .await
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.backend.flush()
    }
}

/// Set the `deleted` flag on the record at `key`. `false` if there was no
/// live record.
pub(crate) fn retire_embedding(
    backend: &dyn StoreBackend,
    codec: &CompressionConfig,
    key: &str,
) -> Result<bool, StoreError> {
    let Some(bytes) = backend.get(key)? else {
        return Ok(false);
    };
    let mut record: EmbeddingRecord = codec.decode(&bytes)?;
    if record.deleted {
        return Ok(false);
    }
    record.deleted = true;
    backend.put(key, &codec.encode(&record)?)?;
    Ok(true)
}

#[async_trait]
impl EmbeddingStore for FaceStore {
    async fn upsert(
        &self,
        tenant_id: &str,
        subject_id: &str,
        vector: Vec<f32>,
        image_ref: &str,
    ) -> Result<EmbeddingRecord, StoreError> {
        validate_id("tenant_id", tenant_id)?;
        validate_id("subject_id", subject_id)?;
        validate_id("image_ref", image_ref)?;
        validate_vector(&vector)?;

        match self.registry.get(tenant_id, subject_id).await? {
            Some(subject) if subject.is_active() => {}
            _ => {
                return Err(StoreError::NotFound {
                    tenant_id: tenant_id.to_string(),
                    subject_id: subject_id.to_string(),
                })
            }
        }

        let record = EmbeddingRecord {
            schema_version: RECORD_SCHEMA_VERSION,
            tenant_id: tenant_id.to_string(),
            subject_id: subject_id.to_string(),
            vector,
            image_ref: image_ref.to_string(),
            created_at: Utc::now(),
            deleted: false,
        };

        let codec = self.codec.clone();
        let key = keys::entry(keys::EMBEDDING, tenant_id, subject_id);
        let stored = record.clone();
        let replaced = run_blocking(&self.backend, move |backend| {
            let existed = backend.get(&key)?.is_some();
            backend.put(&key, &codec.encode(&stored)?)?;
            Ok(existed)
        })
        .await?;

        self.registry
            .set_face_registered(tenant_id, subject_id, true)
            .await?;

        tracing::info!(tenant_id, subject_id, replaced, "embedding stored");
        Ok(record)
    }

    async fn list_active(&self, tenant_id: &str) -> Result<Vec<ActiveEmbedding>, StoreError> {
        validate_id("tenant_id", tenant_id)?;

        let names: HashMap<String, String> = self
            .registry
            .list(tenant_id)
            .await?
            .into_iter()
            .filter(SubjectInfo::is_active)
            .map(|s| (s.subject_id, s.display_name))
            .collect();

        let codec = self.codec.clone();
        let prefix = keys::tenant_prefix(keys::EMBEDDING, tenant_id);
        let owner = tenant_id.to_string();
        let records = run_blocking(&self.backend, move |backend| {
            let mut records = Vec::new();
            backend.scan_prefix(&prefix, &mut |_, bytes| {
                let record: EmbeddingRecord = codec.decode(bytes)?;
                if !record.deleted && record.tenant_id == owner {
                    records.push(record);
                }
                Ok(())
            })?;
            Ok(records)
        })
        .await?;

        let active = records
            .into_iter()
            .filter_map(|record| {
                names.get(&record.subject_id).map(|name| ActiveEmbedding {
                    display_name: name.clone(),
                    record,
                })
            })
            .collect::<Vec<_>>();

        tracing::debug!(tenant_id, active = active.len(), "listed active embeddings");
        Ok(active)
    }

    async fn find_by_subject(
        &self,
        tenant_id: &str,
        subject_id: &str,
    ) -> Result<Option<EmbeddingRecord>, StoreError> {
        Ok(self
            .get_record(tenant_id, subject_id)
            .await?
            .filter(|record| !record.deleted))
    }
}
