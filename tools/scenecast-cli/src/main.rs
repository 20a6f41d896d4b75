//! Scenecast CLI: inspect, render, and export scene documents.
//!
//! Usage:
//!   scenecast info <SCENE>                 Show scene information
//!   scenecast render <SCENE> --time <MS>   Render one frame to PNG
//!   scenecast export <SCENE> -o <FILE>     Export the timeline to video

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scenecast",
    about = "Animated scene timelines rendered to video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show scene information
    Info {
        /// Path to the scene document
        path: PathBuf,

        /// Print the object list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a single frame to PNG
    Render {
        /// Path to the scene document
        path: PathBuf,

        /// Scene time in milliseconds
        #[arg(short, long, default_value = "0")]
        time: f64,

        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,
    },

    /// Export the whole timeline
    Export {
        /// Path to the scene document
        path: PathBuf,

        /// Output file path (extension follows the format when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: gif|webm|mp4|mov|raw
        #[arg(long, default_value = "gif")]
        format: String,

        /// Frames per second (defaults to the configured rate)
        #[arg(long)]
        fps: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    scenecast_common::logging::init_logging(&scenecast_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { path, json } => commands::info::run(config, path, json),
        Commands::Render { path, time, output } => {
            commands::render::run(config, path, time, output).await
        }
        Commands::Export {
            path,
            output,
            format,
            fps,
        } => commands::export::run(config, path, output, format, fps).await,
    }
}
