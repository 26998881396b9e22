//! Command-line interface for Gantry.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Gantry - a self-hosted model inference server.
#[derive(Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GANTRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GANTRY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the inference server
    Serve {
        /// Address to listen on
        #[arg(long, env = "GANTRY_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, env = "GANTRY_PORT", default_value = "8080")]
        port: u16,

        /// Model artifact location (storage locator or local path)
        #[arg(long, env = "GANTRY_MODEL_URI")]
        model_uri: Option<String>,

        /// Execution target tag (e.g. cpu:0, cuda:0)
        #[arg(long, env = "GANTRY_MODEL_DEVICE")]
        model_device: Option<String>,

        /// Root directory for the filesystem object store
        #[arg(long, env = "GANTRY_STORAGE_DIR")]
        storage_dir: Option<PathBuf>,
    },

    /// Check a configuration file and exit
    Validate,

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
