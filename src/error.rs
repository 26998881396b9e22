//! Error types for the Gantry model server.
//!
//! This module provides a unified error type [`GantryError`] for all Gantry
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! Errors are organized into the following categories:
//!
//! - **Configuration**: Invalid settings or missing configuration
//! - **Storage**: Object store and locator errors
//! - **Fetching**: Asset download and timeout errors
//! - **Model Lifecycle**: Artifact loading and preparation errors
//! - **Inference**: Model execution and decoding errors
//! - **Serving**: Request submission and availability errors
//!
//! # Example
//!
//! ```rust
//! use gantry::error::{GantryError, Result};
//!
//! fn parse_device(tag: &str) -> Result<String> {
//!     if tag.is_empty() {
//!         return Err(GantryError::InvalidInput("device tag cannot be empty".into()));
//!     }
//!     Ok(tag.to_string())
//! }
//!
//! fn handle_error(err: &GantryError) {
//!     if err.is_retryable() {
//!         println!("Retrying operation...");
//!     } else {
//!         println!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Main error type for Gantry operations.
#[derive(Error, Debug)]
pub enum GantryError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Storage errors
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Storage error: {0}")]
    Storage(String),

    // Asset fetching errors
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    // Model lifecycle errors
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Decode error: {0}")]
    Decode(String),

    // Serving errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GantryError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GantryError::Timeout(_) | GantryError::Unavailable(_) | GantryError::Network(_)
        )
    }
}

impl From<bincode::Error> for GantryError {
    fn from(e: bincode::Error) -> Self {
        GantryError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for GantryError {
    fn from(e: serde_json::Error) -> Self {
        GantryError::Serialization(e.to_string())
    }
}

impl From<image::ImageError> for GantryError {
    fn from(e: image::ImageError) -> Self {
        GantryError::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for GantryError {
    fn from(e: reqwest::Error) -> Self {
        GantryError::Network(e.to_string())
    }
}

/// Result type alias for Gantry operations.
pub type Result<T> = std::result::Result<T, GantryError>;
