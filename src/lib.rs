//! Workspace umbrella crate for facegate.
//!
//! This crate stitches the embedding store and the matcher together so callers
//! can stand up a complete recognition engine from one YAML file.
//!
//! ```no_run
//! use facegate::{Engine, FacegateConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(&FacegateConfig::from_file("facegate.yaml")?, None)?;
//! engine.registry().register("tenant-a", "alice", "Alice").await?;
//! let outcome = engine.matcher().recognize("tenant-a", &vec![0.0; 512]).await?;
//! println!("matched: {}", outcome.is_match());
//! # Ok(())
//! # }
//! ```

pub mod config;

use std::sync::Arc;

use thiserror::Error;

pub use crate::config::{ConfigLoadError, FacegateConfig, MatchYamlConfig, StoreYamlConfig};
pub use matcher::{
    confidence, euclidean_distance, MatchConfig, MatchError, MatchMetrics, MatchOutcome,
    MatchQuery, MatchResult, Matcher, RecognitionKind,
};
pub use store::{
    ActiveEmbedding, BackendConfig, BackendRegistry, CompressionCodec, CompressionConfig,
    EmbeddingRecord, EmbeddingStore, FaceStore, RecognitionLog, StoreError, SubjectInfo,
    SubjectRegistry, EMBEDDING_DIM,
};

/// Errors raised while assembling an [`Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("matcher: {0}")]
    Matcher(#[from] MatchError),
}

/// Store, registry and matcher sharing one backend.
#[derive(Clone)]
pub struct Engine {
    store: Arc<FaceStore>,
    registry: Arc<dyn SubjectRegistry>,
    matcher: Arc<Matcher>,
}

impl Engine {
    /// Open the configured backend and wire the components over it.
    pub fn new(
        config: &FacegateConfig,
        metrics: Option<Arc<dyn MatchMetrics>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let backend = config.store.backend_config().build()?;
        let codec = config.store.compression_config();

        let registry: Arc<dyn SubjectRegistry> =
            Arc::new(BackendRegistry::new(backend.clone(), codec.clone()));
        let store = Arc::new(FaceStore::new(backend, registry.clone(), codec));

        let mut matcher = Matcher::new(store.clone(), config.matcher.match_config())?;
        if let Some(metrics) = metrics {
            matcher = matcher.with_metrics(metrics);
        }

        tracing::info!(
            backend = %config.store.backend,
            threshold = matcher.threshold(),
            "recognition engine ready"
        );

        Ok(Self {
            store,
            registry,
            matcher: Arc::new(matcher),
        })
    }

    /// In-memory engine with default settings.
    pub fn in_memory() -> Result<Self, EngineError> {
        Self::new(&FacegateConfig::default(), None)
    }

    pub fn store(&self) -> &Arc<FaceStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<dyn SubjectRegistry> {
        &self.registry
    }

    pub fn matcher(&self) -> &Arc<Matcher> {
        &self.matcher
    }

    /// Flush the backend; call before shutdown.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.store.flush()
    }
}
