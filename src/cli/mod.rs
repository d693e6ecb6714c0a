//! CLI interface for Glide

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Click-free additive synthesis with real-time control
#[derive(Parser)]
#[command(name = "glide")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play through the output device until the duration ends or Ctrl-C
    Play {
        /// Configuration file path
        #[arg(short, long, default_value = "glide.yaml")]
        config: PathBuf,

        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(short, long)]
        duration: Option<f32>,

        /// Fade-in and fade-out length in seconds
        #[arg(short, long, default_value = "1.0")]
        fade: f32,
    },

    /// Render a fade-in, hold and fade-out to a WAV file
    Record {
        /// Configuration file path
        #[arg(short, long, default_value = "glide.yaml")]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Total duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: f32,

        /// Fade-in length in seconds
        #[arg(long, default_value = "1.0")]
        fade_in: f32,

        /// Fade-out length in seconds
        #[arg(long, default_value = "2.0")]
        fade_out: f32,
    },

    /// List available output devices
    Devices,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "glide.yaml")]
        config: PathBuf,
    },

    /// List harmonic presets
    Presets {
        /// Preset library file (YAML or JSON)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Generate an example configuration file
    Init,
}
