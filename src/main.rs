//! Mixdown CLI
//!
//! Command-line interface for rendering and exporting project manifests.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use mixdown::cli::{commands, Cli, Commands};
use mixdown::config::MixdownConfig;
use mixdown::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MixdownConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MixdownConfig::default(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging);

    info!("Mixdown v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd, config).await,
        None => {
            println!("Mixdown v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

async fn handle_command(cmd: Commands, mut config: MixdownConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            manifest,
            format,
            output,
            origin,
            bitrate,
        } => {
            if let Some(kbps) = bitrate {
                config.mp3.bitrate_kbps = kbps;
            }
            config.validate()?;
            commands::render(&manifest, format, &output, origin, &config).await?;
        }
        Commands::Stems { manifest, output } => {
            config.validate()?;
            commands::stems(&manifest, &output, &config).await?;
        }
        Commands::Info { manifest } => commands::show_info(&manifest)?,
        Commands::Schedule { manifest, origin } => commands::show_schedule(&manifest, origin)?,
    }
    Ok(())
}
