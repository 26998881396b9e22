//! Gantry CLI - Main entry point.

use gantry::cli::{Cli, Commands};
use gantry::config::GantryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Serve {
            host,
            port,
            model_uri,
            model_device,
            storage_dir,
        } => {
            // Build configuration from the file if given, CLI args on top
            let mut config = match &cli.config {
                Some(path) => GantryConfig::from_file(path)?,
                None => GantryConfig::development(),
            };

            config.server.bind_addr = format!("{}:{}", host, port).parse()?;
            if let Some(uri) = model_uri {
                config.model.uri = uri;
            }
            if let Some(device) = model_device {
                config.model.device = device;
            }
            if let Some(dir) = storage_dir {
                config.storage.backend = gantry::config::StorageBackend::Filesystem;
                config.storage.root_dir = dir;
            }
            config.observability.log_level = cli.log_level;

            config.validate()?;

            // Run the server
            gantry::run(config).await?;
        }

        Commands::Validate => {
            let path = cli
                .config
                .ok_or_else(|| anyhow::anyhow!("--config is required for validate"))?;
            let config = GantryConfig::from_file(&path)?;
            println!(
                "Configuration OK: {} model from {}",
                config.model.kind, config.model.uri
            );
        }

        Commands::Version => {
            println!("Gantry v{}", env!("CARGO_PKG_VERSION"));
            println!("A self-hosted model inference server");
        }
    }

    Ok(())
}
