//! Configuration module for Gantry.

use crate::error::{GantryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a Gantry server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GantryConfig {
    /// HTTP serving configuration.
    pub server: ServerConfig,
    /// Model lifecycle configuration.
    pub model: ModelSettings,
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Asset fetching configuration.
    pub fetch: FetchConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl GantryConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GantryError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| GantryError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.queue_depth == 0 {
            return Err(GantryError::InvalidConfig {
                field: "server.queue_depth".to_string(),
                reason: "Queue depth must be non-zero".to_string(),
            });
        }

        if self.server.api_name.is_empty() {
            return Err(GantryError::InvalidConfig {
                field: "server.api_name".to_string(),
                reason: "API name must not be empty".to_string(),
            });
        }

        if self.model.uri.is_empty() {
            return Err(GantryError::InvalidConfig {
                field: "model.uri".to_string(),
                reason: "Model URI must not be empty".to_string(),
            });
        }

        if self.model.device.is_empty() {
            return Err(GantryError::InvalidConfig {
                field: "model.device".to_string(),
                reason: "Device tag must not be empty".to_string(),
            });
        }

        if self.model.resize_min == 0 || self.model.resize_min > self.model.resize_max {
            return Err(GantryError::InvalidConfig {
                field: "model.resize_min".to_string(),
                reason: "Resize bounds require 0 < min <= max".to_string(),
            });
        }

        if self.storage.bucket.is_empty() {
            return Err(GantryError::InvalidConfig {
                field: "storage.bucket".to_string(),
                reason: "Bucket name must not be empty".to_string(),
            });
        }

        if self.storage.scheme.is_empty() {
            return Err(GantryError::InvalidConfig {
                field: "storage.scheme".to_string(),
                reason: "Locator scheme must not be empty".to_string(),
            });
        }

        if self.storage.backend == StorageBackend::Filesystem
            && self.storage.root_dir.as_os_str().is_empty()
        {
            return Err(GantryError::InvalidConfig {
                field: "storage.root_dir".to_string(),
                reason: "Filesystem backend requires a root directory".to_string(),
            });
        }

        if self.fetch.max_in_flight == 0 {
            return Err(GantryError::InvalidConfig {
                field: "fetch.max_in_flight".to_string(),
                reason: "Fetch concurrency must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "127.0.0.1:8080".parse().expect("valid socket address"),
                api_name: "image_to_image".to_string(),
                queue_depth: 16,
            },
            model: ModelSettings {
                kind: ModelKind::ImageToImage,
                uri: "/tmp/gantry/models/dev.model".to_string(),
                device: "cpu:0".to_string(),
                generation_params: BTreeMap::new(),
                resize_min: 768,
                resize_max: 1024,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                scheme: "s3".to_string(),
                bucket: "gantry-dev".to_string(),
                root_dir: PathBuf::from("/tmp/gantry/objects"),
            },
            fetch: FetchConfig {
                max_in_flight: 4,
                timeout: Duration::from_secs(10),
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

/// HTTP serving configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the inference API.
    pub bind_addr: SocketAddr,
    /// API name used as the request identifier prefix.
    pub api_name: String,
    /// Maximum number of queued inference tasks.
    pub queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("valid socket address"),
            api_name: "image_to_image".to_string(),
            queue_depth: 64,
        }
    }
}

/// Model task family tag.
///
/// Selects which model service the server hosts. Each family owns its own
/// load and processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Image in, cleaned image out (watermark and artifact removal).
    ImageToImage,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::ImageToImage => "image_to_image",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Task family served by this process.
    pub kind: ModelKind,
    /// Artifact location: a storage locator or a local filesystem path.
    pub uri: String,
    /// Execution target tag (e.g. "cpu:0", "cuda:0").
    pub device: String,
    /// Default keyword parameters forwarded to inference.
    #[serde(default)]
    pub generation_params: BTreeMap<String, serde_json::Value>,
    /// Smallest allowed image dimension before upscaling applies.
    pub resize_min: u32,
    /// Largest allowed image dimension before downscaling applies.
    pub resize_max: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            kind: ModelKind::ImageToImage,
            uri: "/var/lib/gantry/models/cleanup.model".to_string(),
            device: "cuda:0".to_string(),
            generation_params: BTreeMap::new(),
            resize_min: 768,
            resize_max: 1024,
        }
    }
}

/// Object storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-memory store, useful for development and tests.
    Memory,
    /// Filesystem-backed store rooted at `root_dir`.
    Filesystem,
}

/// Object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend to construct.
    pub backend: StorageBackend,
    /// Locator scheme presented by the storage client.
    pub scheme: String,
    /// Default bucket for fetched assets and pipeline outputs.
    pub bucket: String,
    /// Root directory for the filesystem backend.
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            scheme: "s3".to_string(),
            bucket: "gantry".to_string(),
            root_dir: PathBuf::from("/var/lib/gantry/objects"),
        }
    }
}

/// Asset fetching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of concurrent downloads per server.
    pub max_in_flight: usize,
    /// Per-item fetch deadline.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics.
    pub metrics_enabled: bool,
    /// Metrics bind address.
    pub metrics_addr: SocketAddr,
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_addr: "0.0.0.0:9090".parse().expect("valid socket address"),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse_duration(&text).map_err(serde::de::Error::custom)
    }

    fn parse_duration(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        let (digits, unit_ms) = if let Some(rest) = text.strip_suffix("ms") {
            (rest, 1u64)
        } else if let Some(rest) = text.strip_suffix('s') {
            (rest, 1000)
        } else if let Some(rest) = text.strip_suffix('m') {
            (rest, 60 * 1000)
        } else {
            (text, 1)
        };

        digits
            .parse::<u64>()
            .map(|value| Duration::from_millis(value * unit_ms))
            .map_err(|e| e.to_string())
    }
}
