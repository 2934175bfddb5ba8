//! The `info` command

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use qpool_concurrency::QueueManager;

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// Summary of the runtime and pool layout
#[derive(Debug, Serialize)]
pub struct InfoReport {
    /// Runtime name
    pub runtime: String,
    /// Known devices
    pub device_count: i8,
    /// Slots per (device, priority class) pool
    pub queues_per_pool: usize,
    /// Normalized (min, max) priority bounds
    pub priority_range: (i32, i32),
}

/// Implementation of the info command
pub fn execute(manager: &QueueManager, args: &InfoArgs) -> Result<()> {
    let report = InfoReport {
        runtime: manager.runtime().name().to_string(),
        device_count: manager.device_count(),
        queues_per_pool: manager.queues_per_pool(),
        priority_range: manager.priority_range()?,
    };
    super::emit(&report, args.json, |r| {
        println!("Runtime:         {}", r.runtime);
        println!("Devices:         {}", r.device_count);
        println!("Queues per pool: {}", r.queues_per_pool);
        println!(
            "Priority range:  {} (normal) .. {} (highest)",
            r.priority_range.0, r.priority_range.1
        );
    })
}
