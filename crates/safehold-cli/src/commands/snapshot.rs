//! Snapshot commands

use std::path::PathBuf;

use clap::{Args, Subcommand};

use safehold_core::World;
use safehold_store::{diff_snapshots, SnapshotStore};

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Capture a snapshot of a world state file
    Capture(CaptureArgs),
    /// Diff two snapshot files
    Diff(DiffArgs),
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// World state file (JSON)
    #[arg(long)]
    pub world: PathBuf,

    /// Directory to write the snapshot into
    #[arg(long, default_value = ".safehold/snapshots")]
    pub dir: PathBuf,

    /// Snapshot name
    #[arg(long, default_value = "manual")]
    pub name: String,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    pub path_a: PathBuf,
    pub path_b: PathBuf,
}

pub fn execute(args: SnapshotArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        SnapshotCommand::Capture(capture_args) => execute_capture(capture_args),
        SnapshotCommand::Diff(diff_args) => execute_diff(diff_args),
    }
}

fn execute_capture(args: CaptureArgs) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(&args.world)?;
    let world: World = serde_json::from_slice(&bytes)?;

    let store = SnapshotStore::new(&args.dir);
    let path = store.capture(&world, &args.name)?;

    println!("Snapshot captured:");
    println!("  path: {}", path.display());
    println!("  entity_count: {}", world.entity_count());
    Ok(())
}

fn execute_diff(args: DiffArgs) -> Result<(), Box<dyn std::error::Error>> {
    let diff = diff_snapshots(&args.path_a, &args.path_b)?;
    println!("{}", diff.render_summary());
    Ok(())
}
