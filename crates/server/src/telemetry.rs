//! Logging and Prometheus wiring.

use std::time::Duration;

use matcher::{MatchMetrics, RecognitionKind};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

/// Install the global tracing subscriber in the configured format.
pub fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if config.log_format == "pretty" {
        builder.pretty().try_init()
    } else {
        builder
            .with_thread_ids(true)
            .with_thread_names(true)
            .json()
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("tracing subscriber already installed: {err}");
    }
}

/// Install the process-wide Prometheus recorder.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Forwards matcher observations to the `metrics` facade.
pub struct RecognitionMetrics;

impl MatchMetrics for RecognitionMetrics {
    fn record_recognition(
        &self,
        _tenant_id: &str,
        kind: RecognitionKind,
        latency: Duration,
        candidates: usize,
    ) {
        metrics::counter!("facegate_recognitions_total", "outcome" => kind.as_str()).increment(1);
        metrics::histogram!("facegate_recognition_seconds").record(latency.as_secs_f64());
        metrics::histogram!("facegate_recognition_candidates").record(candidates as f64);
    }
}
