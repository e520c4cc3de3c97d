//! Validate command - replay a snapshot against the tracing device

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use framescope_core::Config;
use framescope_core::replay::{TraceDevice, replay_frame};

use crate::read_snapshot;

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// Snapshot file (.json)
    pub snapshot: PathBuf,

    /// Print every device call made during replay
    #[arg(long)]
    pub trace: bool,
}

/// Execute the validate command
pub fn execute(args: ValidateArgs, config: &Config) -> Result<()> {
    println!("Validating snapshot: {}", args.snapshot.display());
    let snapshot = read_snapshot(&args.snapshot)?;

    let (report, pool) = replay_frame(TraceDevice::new(), snapshot, config.replay.clone())?;

    if args.trace {
        println!();
        println!("=== Device Calls ===");
        for (index, event) in pool.device().events().iter().enumerate() {
            println!("  {index:>5}  {event:?}");
        }
    }

    println!();
    println!("=== Snapshot Valid ===");
    println!("Frame: {}", report.frame_id);
    println!("Resources created: {}", report.resources_created);
    println!("Encoders: {}", report.encoders);
    println!("Passes: {}", report.passes);
    println!("Commands: {}", report.commands);
    println!("Draws: {}", report.draws);
    println!("Dispatches: {}", report.dispatches);
    println!("Submits: {}", report.submits);

    let leftover = pool.pending_command_buffers();
    if leftover > 0 {
        println!();
        println!("{leftover} command buffer(s) finished but never submitted");
    }

    Ok(())
}
