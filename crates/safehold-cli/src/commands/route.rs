//! Route command: run one request through the full safety envelope

use std::path::PathBuf;

use clap::Args;

use safehold_core::World;
use safehold_engine::CommandRouter;

#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Request as JSON: {"cmd": "...", "args": {...}}
    pub request: String,

    /// World state file (JSON); starts empty when omitted
    #[arg(long)]
    pub world: Option<PathBuf>,

    /// Policy document to enforce during PreFlight
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Directory for pre-execution snapshots
    #[arg(long, default_value = ".safehold/snapshots")]
    pub snapshot_dir: PathBuf,

    /// Write the post-command world state back to the world file
    #[arg(long)]
    pub save: bool,
}

pub fn execute(args: RouteArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut router = CommandRouter::new(&args.snapshot_dir);

    if let Some(world_path) = &args.world {
        let bytes = std::fs::read(world_path)?;
        let world: World = serde_json::from_slice(&bytes)?;
        *router.world_mut() = world;
    }
    if let Some(policy_path) = &args.policy {
        let count = router.load_policy(policy_path)?;
        eprintln!("Policy loaded: {} rule(s)", count);
    }

    let response = router.route_json(&args.request);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if args.save {
        if let Some(world_path) = &args.world {
            let json = serde_json::to_string_pretty(router.world())?;
            std::fs::write(world_path, json)?;
        } else {
            return Err("--save requires --world".into());
        }
    }

    if response.get("ok") == Some(&serde_json::Value::Bool(false)) {
        std::process::exit(2);
    }
    Ok(())
}
