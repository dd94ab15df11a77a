// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-recorder")]
#[command(about = "Record camera video with pause/resume and colour filters")]
#[command(version = camera_recorder::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a video from a live source
    Record(cli::RecordArgs),

    /// Extract a still from a recorded file
    Thumbnail {
        /// Recorded video file
        input: PathBuf,

        /// Position in seconds
        #[arg(short, long, default_value = "0")]
        time: f64,

        /// Output image path (default: next to the input, as PNG)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available video and audio encoders
    Encoders,

    /// Print the effective configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        write_defaults: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_recorder=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record(args) => cli::record_video(args),
        Commands::Thumbnail {
            input,
            time,
            output,
        } => cli::extract_thumbnail(input, time, output),
        Commands::Encoders => cli::list_encoders(),
        Commands::Config { write_defaults } => cli::show_config(write_defaults),
    }
}
