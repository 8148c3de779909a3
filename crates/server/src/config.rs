use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// A bearer token and the principal it authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenGrant {
    pub token: String,
    pub user_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Maximum enrollment photo size in MB
    #[serde(default = "default_max_image_mb")]
    pub max_image_mb: usize,

    /// Rate limit: requests per minute per principal
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Bearer tokens accepted by the static session validator
    #[serde(default)]
    pub tokens: Vec<TokenGrant>,

    /// Engine YAML file (store backend, threshold). Defaults to in-memory.
    #[serde(default)]
    pub engine_config: Option<String>,

    /// Directory enrollment photos are written to
    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    /// Prefix used to turn a stored image key into a URL
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Serve `media_dir` under `/media`
    #[serde(default = "default_true")]
    pub serve_media: bool,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `json` or `pretty`
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            max_image_mb: default_max_image_mb(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            tokens: Vec::new(),
            engine_config: None,
            media_dir: default_media_dir(),
            public_base_url: default_public_base_url(),
            serve_media: default_true(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: default_true(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env`, an optional `server.*` file and
    /// `FACEGATE_SERVER__*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("server").required(false))
            .add_source(config::Environment::with_prefix("FACEGATE_SERVER").separator("__"));

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;

        // Development fallback so a fresh checkout can be exercised with curl.
        if config.tokens.is_empty() {
            tracing::warn!("No tokens configured, using demo admin token 'demo-admin-token'");
            config.tokens.push(TokenGrant {
                token: "demo-admin-token".to_string(),
                user_id: "demo-admin".to_string(),
                tenant_id: "demo".to_string(),
                is_admin: true,
            });
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            anyhow::bail!("log_format must be 'json' or 'pretty'");
        }
        if self.max_image_mb == 0 || self.max_image_mb > self.max_body_size_mb {
            anyhow::bail!("max_image_mb must be between 1 and max_body_size_mb");
        }
        if self.tokens.iter().any(|grant| grant.token.is_empty()) {
            anyhow::bail!("token grants must not have an empty token");
        }
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }

    pub fn max_image_size(&self) -> usize {
        self.max_image_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    10
}

fn default_max_image_mb() -> usize {
    5
}

fn default_rate_limit_per_minute() -> u32 {
    100
}

fn default_media_dir() -> String {
    "./media".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/media".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_body_size_mb, 10);
        assert_eq!(cfg.max_image_mb, 5);
        assert_eq!(cfg.max_image_size(), 5 * 1024 * 1024);
        assert_eq!(cfg.rate_limit_per_minute, 100);
        assert!(cfg.enable_cors);
        assert!(cfg.metrics_enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let cfg = ServerConfig {
            log_format: "xml".into(),
            ..ServerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_image_limit_must_fit_body_limit() {
        let cfg = ServerConfig {
            max_image_mb: 20,
            ..ServerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
