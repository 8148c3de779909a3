use crate::auth::{SessionValidator, StaticTokens};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::media::{FsMediaStore, MediaStore};
use crate::telemetry::RecognitionMetrics;
use dashmap::DashMap;
use facegate::{Engine, FacegateConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Store, registry and matcher
    pub engine: Engine,

    pub sessions: Arc<dyn SessionValidator>,

    pub media: Arc<dyn MediaStore>,

    /// Rate limit tracking: principal -> (count, window_start)
    pub rate_limiter: Arc<DashMap<String, (u32, Instant)>>,

    /// Rendered at `/metrics` when present
    pub prometheus: Option<PrometheusHandle>,

    pub started_at: Instant,
}

impl ServerState {
    /// Build every collaborator from configuration.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let engine_config = match &config.engine_config {
            Some(path) => FacegateConfig::from_file(path)
                .map_err(|e| ServerError::Config(format!("{path}: {e}")))?,
            None => FacegateConfig::default(),
        };
        let engine = Engine::new(&engine_config, Some(Arc::new(RecognitionMetrics)))
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let sessions = Arc::new(StaticTokens::new(config.tokens.clone()));
        let media = Arc::new(FsMediaStore::new(
            config.media_dir.clone(),
            config.public_base_url.clone(),
        ));

        Ok(Self::from_parts(config, engine, sessions, media))
    }

    /// Assemble state from explicitly constructed collaborators.
    pub fn from_parts(
        config: ServerConfig,
        engine: Engine,
        sessions: Arc<dyn SessionValidator>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            sessions,
            media,
            rate_limiter: Arc::new(DashMap::new()),
            prometheus: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Check rate limit for a caller
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = Instant::now();
        let window = Duration::from_secs(60);
        let limit = self.config.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        // Reset if window has passed
        if now.duration_since(*window_start) > window {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }
}
