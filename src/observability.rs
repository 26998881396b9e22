//! Observability for Gantry.
//!
//! Provides logging and Prometheus metrics.

use crate::config::{ModelKind, ObservabilityConfig};
use crate::error::{GantryError, Result};
use crate::task::FinishedReason;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| GantryError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| GantryError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Run the Prometheus metrics server.
pub async fn run_metrics_server(config: ObservabilityConfig) -> Result<()> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| GantryError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

    register_metrics();

    let app = axum::Router::new()
        .route(
            "/metrics",
            axum::routing::get(move || async move { handle.render() }),
        )
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = TcpListener::bind(config.metrics_addr).await?;
    info!(addr = %config.metrics_addr, "Metrics server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| GantryError::Network(e.to_string()))?;

    Ok(())
}

/// Register standard metrics.
fn register_metrics() {
    gauge!("gantry_model_loaded").set(0.0);

    counter!("gantry_tasks_total").absolute(0);
    counter!("gantry_items_processed_total").absolute(0);
    counter!("gantry_items_dropped_total").absolute(0);
    counter!("gantry_requests_total").absolute(0);
}

/// Mark the model as loaded and serving.
pub fn set_model_loaded(kind: ModelKind) {
    gauge!("gantry_model_loaded", "kind" => kind.as_str()).set(1.0);
}

/// Record a finished task and how long processing took.
pub fn record_task(reason: FinishedReason, elapsed: Duration) {
    counter!("gantry_tasks_total", "finished_reason" => reason.as_str()).increment(1);
    histogram!("gantry_task_seconds").record(elapsed.as_secs_f64());
}

/// Record one item that made it through the whole pipeline.
pub fn record_item_processed() {
    counter!("gantry_items_processed_total").increment(1);
}

/// Record one item dropped at the named pipeline stage.
pub fn record_item_dropped(stage: &'static str) {
    counter!("gantry_items_dropped_total", "stage" => stage).increment(1);
}

/// Record one model execution.
pub fn record_inference(elapsed: Duration) {
    histogram!("gantry_inference_seconds").record(elapsed.as_secs_f64());
}

/// Record an API request and its response status.
pub fn record_api_request(status: u16) {
    counter!("gantry_requests_total", "status" => status.to_string()).increment(1);
}
