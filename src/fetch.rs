//! Concurrent asset fetching with bounded fan-out.
//!
//! A batch of item references resolves in parallel, capped by a semaphore
//! shared across the fetcher, and outcomes stream back in completion order.
//! One slow or dead source never blocks the rest of the batch: each fetch
//! runs under its own deadline, and failures surface as absent payloads
//! rather than errors.

use crate::config::FetchConfig;
use crate::error::{GantryError, Result};
use crate::storage::StorageClient;
use crate::task::ItemRef;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

/// Result of one item fetch. An absent payload means the item was dropped;
/// the cause has already been logged.
#[derive(Debug)]
pub struct FetchOutcome {
    pub item: ItemRef,
    pub payload: Option<Vec<u8>>,
}

/// Resolves item references to payload bytes.
#[derive(Clone)]
pub struct AssetFetcher {
    http: reqwest::Client,
    storage: StorageClient,
    limiter: Arc<Semaphore>,
    timeout: Duration,
}

impl AssetFetcher {
    pub fn new(storage: StorageClient, config: &FetchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GantryError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            storage,
            limiter: Arc::new(Semaphore::new(config.max_in_flight)),
            timeout: config.timeout,
        })
    }

    /// Fetch a batch. Outcomes arrive in completion order, one per submitted
    /// item; the channel closes once the batch is done.
    pub fn fetch_all(&self, items: Vec<ItemRef>) -> mpsc::Receiver<FetchOutcome> {
        let (tx, rx) = mpsc::channel(items.len().max(1));

        for item in items {
            let tx = tx.clone();
            let http = self.http.clone();
            let storage = self.storage.clone();
            let limiter = self.limiter.clone();
            let deadline = self.timeout;

            tokio::spawn(async move {
                let payload = match limiter.acquire_owned().await {
                    Ok(_permit) => fetch_one(&http, &storage, &item, deadline).await,
                    Err(_) => None,
                };
                let _ = tx.send(FetchOutcome { item, payload }).await;
            });
        }

        rx
    }
}

/// Resolve one item under a deadline, logging and absorbing failures.
async fn fetch_one(
    http: &reqwest::Client,
    storage: &StorageClient,
    item: &ItemRef,
    deadline: Duration,
) -> Option<Vec<u8>> {
    match tokio::time::timeout(deadline, resolve(http, storage, item)).await {
        Ok(Ok(bytes)) => Some(bytes),
        Ok(Err(e)) => {
            warn!(item = %item, error = %e, "asset fetch failed");
            crate::observability::record_item_dropped("fetch");
            None
        }
        Err(_) => {
            warn!(item = %item, timeout_ms = deadline.as_millis() as u64, "asset fetch timed out");
            crate::observability::record_item_dropped("fetch");
            None
        }
    }
}

/// Route a reference to its source: inline bytes, this server's object
/// storage, an HTTP(S) URL, or a bare key in the default bucket.
async fn resolve(
    http: &reqwest::Client,
    storage: &StorageClient,
    item: &ItemRef,
) -> Result<Vec<u8>> {
    match item {
        ItemRef::Data(bytes) => Ok(bytes.clone()),
        ItemRef::Uri(uri) if storage.owns_uri(uri) => {
            let locator = uri.parse()?;
            storage.get(&locator).await
        }
        ItemRef::Uri(uri) if uri.starts_with("http://") || uri.starts_with("https://") => {
            let response = http.get(uri).send().await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        }
        ItemRef::Uri(key) => storage.get_key(key).await,
    }
}
