//! Object storage boundary for model artifacts and pipeline outputs.
//!
//! Stores are addressed by `(bucket, key)` pairs and exposed to the rest of
//! the system through [`StorageClient`], which owns the locator scheme and
//! the default bucket. Pipeline code uses the `try_*` helpers, which log
//! failures and degrade to sentinel values instead of aborting a whole job.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{GantryError, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// A parsed `scheme://bucket/key` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl FromStr for Locator {
    type Err = GantryError;

    fn from_str(text: &str) -> Result<Self> {
        let (scheme, rest) = text
            .split_once("://")
            .ok_or_else(|| GantryError::InvalidLocator(format!("missing scheme: {text}")))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| GantryError::InvalidLocator(format!("missing key: {text}")))?;

        if scheme.is_empty() || bucket.is_empty() || key.is_empty() {
            return Err(GantryError::InvalidLocator(format!(
                "empty component: {text}"
            )));
        }

        Ok(Locator {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

/// Backend-agnostic object store.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object. Returns `Ok(None)` when the object does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write an object, replacing any previous value.
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;
}

/// Handle to one object store plus the locator scheme and default bucket.
///
/// Cloning is cheap; clones share the underlying store.
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    scheme: String,
    bucket: String,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>, scheme: &str, bucket: &str) -> Self {
        Self {
            store,
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
        }
    }

    /// Construct the backend described by the configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Filesystem => Arc::new(FsStore::new(&config.root_dir)?),
        };
        Ok(Self::new(store, &config.scheme, &config.bucket))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether a reference string addresses this client's scheme.
    pub fn owns_uri(&self, uri: &str) -> bool {
        uri.strip_prefix(self.scheme.as_str())
            .is_some_and(|rest| rest.starts_with("://"))
    }

    /// Fetch an object by full locator. Missing objects are an error here;
    /// callers that tolerate absence use [`StorageClient::try_get`].
    pub async fn get(&self, locator: &Locator) -> Result<Vec<u8>> {
        if locator.scheme != self.scheme {
            return Err(GantryError::InvalidLocator(format!(
                "unsupported scheme in {locator}"
            )));
        }
        match self.store.get(&locator.bucket, &locator.key).await? {
            Some(bytes) => Ok(bytes),
            None => Err(GantryError::ObjectNotFound {
                bucket: locator.bucket.clone(),
                key: locator.key.clone(),
            }),
        }
    }

    /// Fetch an object by key from the default bucket.
    pub async fn get_key(&self, key: &str) -> Result<Vec<u8>> {
        match self.store.get(&self.bucket, key).await? {
            Some(bytes) => Ok(bytes),
            None => Err(GantryError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            }),
        }
    }

    /// Store an object under the default bucket and return its locator string.
    pub async fn put(&self, key: &str, data: Vec<u8>) -> Result<String> {
        self.store.put(&self.bucket, key, data).await?;
        Ok(format!("{}://{}/{}", self.scheme, self.bucket, key))
    }

    /// Degrading fetch: logs and returns `None` on absence or failure.
    pub async fn try_get(&self, locator: &Locator) -> Option<Vec<u8>> {
        match self.get(locator).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(locator = %locator, error = %e, "object download failed");
                None
            }
        }
    }

    /// Degrading store: logs and returns `None` on failure.
    pub async fn try_put(&self, key: &str, data: Vec<u8>) -> Option<String> {
        match self.put(key, data).await {
            Ok(locator) => Some(locator),
            Err(e) => {
                warn!(bucket = %self.bucket, key = %key, error = %e, "object upload failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_client() -> StorageClient {
        StorageClient::new(Arc::new(MemoryStore::new()), "s3", "test-bucket")
    }

    #[test]
    fn test_locator_parse() {
        let locator: Locator = "s3://models/cleanup/v1.model".parse().unwrap();
        assert_eq!(locator.scheme, "s3");
        assert_eq!(locator.bucket, "models");
        assert_eq!(locator.key, "cleanup/v1.model");
        assert_eq!(locator.to_string(), "s3://models/cleanup/v1.model");
    }

    #[test]
    fn test_locator_parse_rejects_malformed() {
        assert!("models/v1".parse::<Locator>().is_err());
        assert!("s3://models".parse::<Locator>().is_err());
        assert!("s3:///key".parse::<Locator>().is_err());
        assert!("s3://bucket/".parse::<Locator>().is_err());
    }

    #[test]
    fn test_owns_uri() {
        let client = memory_client();
        assert!(client.owns_uri("s3://bucket/key"));
        assert!(!client.owns_uri("https://example.com/key"));
        assert!(!client.owns_uri("s3stuff/key"));
    }

    #[tokio::test]
    async fn test_put_returns_locator() {
        let client = memory_client();
        let locator = client.put("img1_original.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(locator, "s3://test-bucket/img1_original.png");

        let fetched = client.get(&locator.parse().unwrap()).await.unwrap();
        assert_eq!(fetched, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_rejects_foreign_scheme() {
        let client = memory_client();
        let locator: Locator = "gs://test-bucket/key".parse().unwrap();
        assert!(matches!(
            client.get(&locator).await,
            Err(GantryError::InvalidLocator(_))
        ));
    }

    #[tokio::test]
    async fn test_try_get_absent_is_none() {
        let client = memory_client();
        let locator: Locator = "s3://test-bucket/missing".parse().unwrap();
        assert!(client.try_get(&locator).await.is_none());
    }

    #[tokio::test]
    async fn test_get_key_uses_default_bucket() {
        let client = memory_client();
        client.put("img9", vec![7]).await.unwrap();
        assert_eq!(client.get_key("img9").await.unwrap(), vec![7]);
        assert!(matches!(
            client.get_key("absent").await,
            Err(GantryError::ObjectNotFound { .. })
        ));
    }
}
