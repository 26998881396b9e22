//! Gantry - a self-hosted model inference server.
//!
//! Gantry hosts one prepared model behind a small HTTP API. It fetches the
//! referenced assets concurrently, runs them through the model one job at a
//! time, persists the outputs to object storage, and answers every request
//! with the same JSON envelope.
//!
//! # Features
//!
//! - **Concurrent Asset Fetching**: Bounded fan-out with per-item deadlines;
//!   one dead source never sinks a batch.
//! - **Gated Model Lifecycle**: Artifact deserialization, denormal cleanup,
//!   precision reduction, and device binding happen in a fixed order before
//!   any request executes.
//! - **Per-Item Failure Tolerance**: Items that fail to fetch, decode, or
//!   infer are dropped and reported through the job's finished reason.
//! - **S3-style Object Storage**: Assets and outputs move through a pluggable
//!   store addressed by `scheme://bucket/key` locators.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Gantry                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  API Layer: HTTP Endpoint | Request IDs | Response Envelope │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Server Core: Job Queue | Load Gate | Serial Task Loop      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Model Service: Fetch | Preprocess | Infer | Persist        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Storage: Memory / Filesystem Stores | Locators             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use gantry::config::GantryConfig;
//!
//! #[tokio::main]
//! async fn main() -> gantry::Result<()> {
//!     // Use development configuration
//!     let config = GantryConfig::development();
//!
//!     // Start the Gantry server
//!     gantry::run(config).await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod model;
pub mod observability;
pub mod server;
pub mod shutdown;
pub mod storage;
pub mod task;
pub mod tensor;

// Re-exports
pub use error::{GantryError, Result};

use config::{GantryConfig, ModelKind, StorageBackend};
use fetch::AssetFetcher;
use server::{ImageToImageService, ModelServer};
use shutdown::{ShutdownCoordinator, SignalHandler};
use storage::StorageClient;
use tracing::{error, info, warn};

/// Run the Gantry server with the given configuration.
pub async fn run(config: GantryConfig) -> Result<()> {
    observability::init(&config.observability)?;

    info!(
        kind = %config.model.kind,
        uri = %config.model.uri,
        device = %config.model.device,
        "starting gantry model server"
    );

    if config.storage.backend == StorageBackend::Filesystem {
        std::fs::create_dir_all(&config.storage.root_dir)?;
    }

    let storage = StorageClient::from_config(&config.storage)?;
    let fetcher = AssetFetcher::new(storage.clone(), &config.fetch)?;

    let service = match config.model.kind {
        ModelKind::ImageToImage => {
            ImageToImageService::new(config.model.clone(), storage, fetcher)
        }
    };

    let (mut server, handle) = ModelServer::new(service, config.server.queue_depth);

    // The load gate: nothing serves until the model is populated, and a
    // load failure takes the process down.
    server.load().await?;

    let coordinator = ShutdownCoordinator::new();
    tokio::spawn(SignalHandler::new(coordinator.clone()).run());

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Model server error: {}", e);
        }
    });

    if config.observability.metrics_enabled {
        info!("Starting metrics server on {}", config.observability.metrics_addr);
        let obs_config = config.observability.clone();
        tokio::spawn(async move {
            if let Err(e) = observability::run_metrics_server(obs_config).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let state = http::AppState {
        handle: handle.clone(),
        api_name: config.server.api_name.clone(),
    };
    http::serve(config.server.bind_addr, state, coordinator.watch()).await?;

    info!("Shutting down gantry gracefully...");

    // Dropping the handles closes the queue; the server loop drains and
    // stops on its own.
    drop(handle);
    if tokio::time::timeout(std::time::Duration::from_secs(5), server_task)
        .await
        .is_err()
    {
        warn!("Model server did not stop in time");
    }

    info!("Gantry shutdown complete");
    Ok(())
}
