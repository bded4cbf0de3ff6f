//! CLI Module
//!
//! Command-line interface for rendering project manifests.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mixdown - offline renderer for multi-track projects
#[derive(Parser, Debug)]
#[command(name = "mixdown")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Single-file output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Wav,
    Mp3,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a manifest to a single WAV or MP3 file
    #[command(name = "render")]
    Render {
        /// Path to the project manifest
        manifest: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Wav)]
        format: OutputFormat,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Timeline position (seconds) to start rendering from
        #[arg(long, default_value_t = 0.0)]
        origin: f64,

        /// MP3 bitrate in kbps (overrides the config file)
        #[arg(short, long)]
        bitrate: Option<u32>,
    },

    /// Render every audible track in isolation into a ZIP of WAVs
    #[command(name = "stems")]
    Stems {
        /// Path to the project manifest
        manifest: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print a summary of a manifest
    #[command(name = "info")]
    Info {
        /// Path to the project manifest
        manifest: PathBuf,
    },

    /// Print the playback schedule of every clip
    #[command(name = "schedule")]
    Schedule {
        /// Path to the project manifest
        manifest: PathBuf,

        /// Timeline position (seconds) to schedule from
        #[arg(long, default_value_t = 0.0)]
        origin: f64,
    },
}
