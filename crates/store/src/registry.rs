use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::backend::run_blocking;
use crate::codec::keys;
use crate::record::validate_id;
use crate::{retire_embedding, CompressionConfig, StoreBackend, StoreError, SubjectInfo};

/// The store's view of the external user registry.
///
/// Embeddings only exist for subjects the registry knows about, and a subject
/// deleted here is excluded from matching even if its embedding is not.
#[async_trait]
pub trait SubjectRegistry: Send + Sync {
    async fn get(&self, tenant_id: &str, subject_id: &str)
        -> Result<Option<SubjectInfo>, StoreError>;

    /// All subjects of a tenant, including deleted ones.
    async fn list(&self, tenant_id: &str) -> Result<Vec<SubjectInfo>, StoreError>;

    /// Register a new subject. Fails with `AlreadyExists` if a live subject
    /// with the same id exists; a previously deleted one is revived without
    /// its old face, which stays soft-deleted.
    async fn register(
        &self,
        tenant_id: &str,
        subject_id: &str,
        display_name: &str,
    ) -> Result<SubjectInfo, StoreError>;

    /// Change a live subject's display name. `NotFound` for unknown or
    /// deleted subjects.
    async fn rename(
        &self,
        tenant_id: &str,
        subject_id: &str,
        display_name: &str,
    ) -> Result<SubjectInfo, StoreError>;

    /// Returns `false` when the subject was unknown or already deleted.
    async fn mark_deleted(&self, tenant_id: &str, subject_id: &str) -> Result<bool, StoreError>;

    async fn set_face_registered(
        &self,
        tenant_id: &str,
        subject_id: &str,
        registered: bool,
    ) -> Result<(), StoreError>;
}

/// Registry persisted through a [`StoreBackend`], next to the embeddings.
pub struct BackendRegistry {
    backend: Arc<dyn StoreBackend>,
    codec: CompressionConfig,
}

impl BackendRegistry {
    pub fn new(backend: Arc<dyn StoreBackend>, codec: CompressionConfig) -> Self {
        Self { backend, codec }
    }

    fn load(
        backend: &dyn StoreBackend,
        codec: &CompressionConfig,
        tenant_id: &str,
        subject_id: &str,
    ) -> Result<Option<SubjectInfo>, StoreError> {
        match backend.get(&keys::entry(keys::SUBJECT, tenant_id, subject_id))? {
            Some(bytes) => Ok(Some(codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(
        backend: &dyn StoreBackend,
        codec: &CompressionConfig,
        info: &SubjectInfo,
    ) -> Result<(), StoreError> {
        let bytes = codec.encode(info)?;
        backend.put(
            &keys::entry(keys::SUBJECT, &info.tenant_id, &info.subject_id),
            &bytes,
        )
    }
}

#[async_trait]
impl SubjectRegistry for BackendRegistry {
    async fn get(
        &self,
        tenant_id: &str,
        subject_id: &str,
    ) -> Result<Option<SubjectInfo>, StoreError> {
        let codec = self.codec.clone();
        let (tenant_id, subject_id) = (tenant_id.to_string(), subject_id.to_string());
        run_blocking(&self.backend, move |backend| {
            Self::load(backend, &codec, &tenant_id, &subject_id)
        })
        .await
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<SubjectInfo>, StoreError> {
        let codec = self.codec.clone();
        let prefix = keys::tenant_prefix(keys::SUBJECT, tenant_id);
        run_blocking(&self.backend, move |backend| {
            let mut subjects = Vec::new();
            backend.scan_prefix(&prefix, &mut |_, bytes| {
                subjects.push(codec.decode::<SubjectInfo>(bytes)?);
                Ok(())
            })?;
            Ok(subjects)
        })
        .await
    }

    async fn register(
        &self,
        tenant_id: &str,
        subject_id: &str,
        display_name: &str,
    ) -> Result<SubjectInfo, StoreError> {
        validate_id("tenant_id", tenant_id)?;
        validate_id("subject_id", subject_id)?;
        validate_id("display_name", display_name)?;

        let codec = self.codec.clone();
        let info = SubjectInfo {
            tenant_id: tenant_id.to_string(),
            subject_id: subject_id.to_string(),
            display_name: display_name.trim().to_string(),
            deleted: false,
            face_registered: false,
            created_at: Utc::now(),
        };
        let (saved, retired) = run_blocking(&self.backend, move |backend| {
            let mut retired = false;
            if let Some(existing) = Self::load(backend, &codec, &info.tenant_id, &info.subject_id)?
            {
                if existing.is_active() {
                    return Err(StoreError::AlreadyExists {
                        tenant_id: info.tenant_id,
                        subject_id: info.subject_id,
                    });
                }
                // A revived id is a new person; the old face must not match it.
                retired = retire_embedding(
                    backend,
                    &codec,
                    &keys::entry(keys::EMBEDDING, &info.tenant_id, &info.subject_id),
                )?;
            }
            Self::save(backend, &codec, &info)?;
            Ok((info, retired))
        })
        .await?;

        tracing::info!(
            tenant_id = %saved.tenant_id,
            subject_id = %saved.subject_id,
            retired_embedding = retired,
            "subject registered"
        );
        Ok(saved)
    }

    async fn rename(
        &self,
        tenant_id: &str,
        subject_id: &str,
        display_name: &str,
    ) -> Result<SubjectInfo, StoreError> {
        validate_id("display_name", display_name)?;
        let codec = self.codec.clone();
        let display_name = display_name.trim().to_string();
        let (tenant_id, subject_id) = (tenant_id.to_string(), subject_id.to_string());
        run_blocking(&self.backend, move |backend| {
            match Self::load(backend, &codec, &tenant_id, &subject_id)? {
                Some(mut info) if info.is_active() => {
                    info.display_name = display_name;
                    Self::save(backend, &codec, &info)?;
                    Ok(info)
                }
                _ => Err(StoreError::NotFound {
                    tenant_id,
                    subject_id,
                }),
            }
        })
        .await
    }

    async fn mark_deleted(&self, tenant_id: &str, subject_id: &str) -> Result<bool, StoreError> {
        let codec = self.codec.clone();
        let (tenant_id, subject_id) = (tenant_id.to_string(), subject_id.to_string());
        run_blocking(&self.backend, move |backend| {
            match Self::load(backend, &codec, &tenant_id, &subject_id)? {
                Some(mut info) if info.is_active() => {
                    info.deleted = true;
                    Self::save(backend, &codec, &info)?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
        .await
    }

    async fn set_face_registered(
        &self,
        tenant_id: &str,
        subject_id: &str,
        registered: bool,
    ) -> Result<(), StoreError> {
        let codec = self.codec.clone();
        let (tenant_id, subject_id) = (tenant_id.to_string(), subject_id.to_string());
        run_blocking(&self.backend, move |backend| {
            match Self::load(backend, &codec, &tenant_id, &subject_id)? {
                Some(mut info) => {
                    if info.face_registered != registered {
                        info.face_registered = registered;
                        Self::save(backend, &codec, &info)?;
                    }
                    Ok(())
                }
                None => Err(StoreError::NotFound {
                    tenant_id,
                    subject_id,
                }),
            }
        })
        .await
    }
}
