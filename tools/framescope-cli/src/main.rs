//! Framescope CLI - tools for captured WebGPU frames
//!
//! # Commands
//!
//! - `framescope inspect` - Summarize a snapshot's resources and commands
//! - `framescope validate` - Replay a snapshot against the tracing device
//! - `framescope graph` - Resource dependency graph (DOT) or creation order
//! - `framescope replay` - Replay on a GPU and dump texture views as PNG
//!   (feature `wgpu`)
//!
//! # Usage
//!
//! ```bash
//! # Counts per resource kind and command family
//! framescope inspect frame-0042.json
//!
//! # Check that every command replays, printing the device calls
//! framescope validate frame-0042.json --trace
//!
//! # Render the dependency graph
//! framescope graph frame-0042.json -o frame.dot
//! ```
//!
//! Settings come from `framescope.toml` in the platform config directory, or
//! from `--config <path>`.

mod graph;
mod inspect;
#[cfg(feature = "wgpu")]
mod replay;
mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use framescope_core::Config;
use framescope_shared::FrameSnapshot;
use tracing_subscriber::EnvFilter;

/// Framescope CLI - tools for captured WebGPU frames
#[derive(Parser)]
#[command(name = "framescope")]
#[command(about = "Inspect, validate and replay captured WebGPU frames")]
#[command(version)]
struct Cli {
    /// Config file (defaults to framescope.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a snapshot's resources and commands
    Inspect(inspect::InspectArgs),

    /// Replay a snapshot against the tracing device
    Validate(validate::ValidateArgs),

    /// Print the resource dependency graph
    Graph(graph::GraphArgs),

    /// Replay on a GPU and dump every texture view as PNG
    #[cfg(feature = "wgpu")]
    Replay(replay::ReplayArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Validate(args) => validate::execute(args, &config),
        Commands::Graph(args) => graph::execute(args),
        #[cfg(feature = "wgpu")]
        Commands::Replay(args) => replay::execute(args, &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(Config::load()),
    }
}

/// Reads a snapshot file, naming the path on failure.
pub(crate) fn read_snapshot(path: &Path) -> Result<FrameSnapshot> {
    FrameSnapshot::read_from(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))
}
