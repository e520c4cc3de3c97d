//! Inspect command - summarize a snapshot

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescope_core::inspect::DependencyGraph;

use crate::read_snapshot;

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Snapshot file (.json)
    pub snapshot: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let snapshot = read_snapshot(&args.snapshot)?;
    let summary = snapshot.summary();

    if args.json {
        let text =
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{text}");
        return Ok(());
    }

    println!("=== Frame {} ===", snapshot.frame_id);
    println!(
        "  Surface: {}x{}",
        snapshot.surface_size.width, snapshot.surface_size.height
    );
    println!(
        "  Duration: {:.3} ms",
        snapshot.timing.end - snapshot.timing.start
    );

    println!();
    println!("Resources: {}", snapshot.resources.len());
    for (kind, count) in &summary.resources {
        println!("  {kind:<24} {count}");
    }

    println!();
    println!("Commands: {}", snapshot.command_count());
    println!("  Queue commands:   {}", summary.base_commands);
    println!("  Encoders:         {}", summary.encoders);
    println!("  Encoder commands: {}", summary.encoder_commands);
    println!("  Passes:           {}", summary.passes);
    println!("  Pass commands:    {}", summary.pass_commands);
    println!("  Draws:            {}", summary.draws);
    println!("  Dispatches:       {}", summary.dispatches);

    let missing = DependencyGraph::build(&snapshot).missing_references();
    if !missing.is_empty() {
        println!();
        println!("=== Missing References ===");
        for id in &missing {
            println!("  {id}");
        }
    }

    Ok(())
}
