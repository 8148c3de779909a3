//! Enrollment photo storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("invalid media key: {0}")]
    InvalidKey(String),
    #[error("media io: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage for enrollment photos, addressed by key.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), MediaError>;

    /// Remove a stored object. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), MediaError>;

    /// Displayable URL for a stored key.
    fn url(&self, key: &str) -> String;
}

/// Key for a new enrollment photo: `faces/{unix_millis}-{uuid}.{ext}`.
pub fn face_key(file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "img".to_string());
    format!(
        "faces/{}-{}.{ext}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4()
    )
}

/// Writes photos under a local directory.
pub struct FsMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), MediaError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key, size, content_type, "stored media object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MediaError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_keys_keep_a_safe_extension() {
        let key = face_key(Some("portrait.JPG"));
        assert!(key.starts_with("faces/"));
        assert!(key.ends_with(".jpg"));

        assert!(face_key(None).ends_with(".img"));
        assert!(face_key(Some("../../etc/passwd")).ends_with(".img"));
        assert!(face_key(Some("x.tar.gz")).ends_with(".gz"));
        assert_ne!(face_key(None), face_key(None));
    }

    #[tokio::test]
    async fn writes_under_root_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let media = FsMediaStore::new(dir.path(), "https://cdn.example.com/media/");

        media
            .put("faces/a.jpg", b"jpeg".to_vec(), "image/jpeg")
            .await
            .unwrap();
        let stored = std::fs::read(dir.path().join("faces/a.jpg")).unwrap();
        assert_eq!(stored, b"jpeg");
        assert_eq!(
            media.url("faces/a.jpg"),
            "https://cdn.example.com/media/faces/a.jpg"
        );
    }

    #[tokio::test]
    async fn delete_removes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let media = FsMediaStore::new(dir.path(), "http://localhost/media");
        media
            .put("faces/b.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();

        media.delete("faces/b.png").await.unwrap();
        assert!(!dir.path().join("faces/b.png").exists());
        media.delete("faces/b.png").await.unwrap();
        assert!(matches!(
            media.delete("../b.png").await,
            Err(MediaError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let media = FsMediaStore::new(dir.path(), "http://localhost/media");
        for key in ["../x.jpg", "/abs.jpg", "faces/../../x.jpg", ""] {
            let err = media.put(key, Vec::new(), "image/jpeg").await.unwrap_err();
            assert!(matches!(err, MediaError::InvalidKey(_)), "{key}");
        }
    }
}
