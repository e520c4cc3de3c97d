//! Graph command - resource dependency graph of a snapshot

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescope_core::inspect::DependencyGraph;

use crate::read_snapshot;

/// Arguments for the graph command
#[derive(Args)]
pub struct GraphArgs {
    /// Snapshot file (.json)
    pub snapshot: PathBuf,

    /// Write the DOT output here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the dependencies-first creation order instead of DOT
    #[arg(long)]
    pub order: bool,
}

/// Execute the graph command
pub fn execute(args: GraphArgs) -> Result<()> {
    let snapshot = read_snapshot(&args.snapshot)?;
    let graph = DependencyGraph::build(&snapshot);

    if args.order {
        let order = graph.creation_order();
        println!("=== Creation Order ({} resources) ===", order.order.len());
        for (index, id) in order.order.iter().enumerate() {
            let kind = graph
                .kind_of(*id)
                .map(|kind| kind.to_string())
                .unwrap_or_default();
            println!("  {index:>4}  {id:<8} {kind}");
        }
        if !order.unresolved.is_empty() {
            println!();
            println!("Unresolved:");
            for id in &order.unresolved {
                println!("  {id}");
            }
        }
        if !order.cyclic.is_empty() {
            println!();
            println!("On a cycle:");
            for id in &order.cyclic {
                println!("  {id}");
            }
        }
        return Ok(());
    }

    let dot = graph.to_dot();
    match args.output {
        Some(path) => {
            std::fs::write(&path, dot)
                .with_context(|| format!("Failed to write graph: {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{dot}"),
    }
    Ok(())
}
