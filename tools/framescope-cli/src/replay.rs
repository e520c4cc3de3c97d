//! Replay command - rebuild a frame on a GPU and dump its texture views

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescope_core::Config;
use framescope_core::inspect::write_png;
use framescope_core::replay::{WgpuDevice, replay_frame};
use tracing::warn;

use crate::read_snapshot;

/// Arguments for the replay command
#[derive(Args)]
pub struct ReplayArgs {
    /// Snapshot file (.json)
    pub snapshot: PathBuf,

    /// Directory for PNG dumps of every texture view
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// Execute the replay command
pub fn execute(args: ReplayArgs, config: &Config) -> Result<()> {
    let snapshot = read_snapshot(&args.snapshot)?;
    let device = WgpuDevice::new(&snapshot.adapter_options).context("Failed to open a GPU")?;
    println!("=== Replay ===");
    println!("  Adapter: {}", device.adapter_info().name);

    let (report, pool) = replay_frame(device, snapshot, config.replay.clone())?;
    println!("  Frame: {}", report.frame_id);
    println!("  Resources created: {}", report.resources_created);
    println!("  Draws: {}  Dispatches: {}", report.draws, report.dispatches);

    let Some(out_dir) = args.out_dir else {
        return Ok(());
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut written = 0;
    for view in pool.texture_views() {
        let rgba = match pool.device().read_texture_rgba(view) {
            Ok(rgba) => rgba,
            Err(e) => {
                warn!(view = %view.view_id, error = %e, "skipping texture view");
                continue;
            }
        };
        let name = match &view.label {
            Some(label) => format!("view-{}-{}.png", view.view_id.get(), file_safe(label)),
            None => format!("view-{}.png", view.view_id.get()),
        };
        let path = out_dir.join(name);
        write_png(&path, view.width, view.height, &rgba)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += 1;
    }
    println!("  Wrote {written} image(s) to {}", out_dir.display());
    Ok(())
}

fn file_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
