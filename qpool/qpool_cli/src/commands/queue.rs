//! Queue acquisition commands
//!
//! `acquire` hands out pooled queues round-robin and `pack` shows the packed
//! form of one queue, checking that it resolves back to the same native queue.

use anyhow::{ensure, Result};
use clap::Args;
use serde::Serialize;

use qpool_concurrency::QueueManager;
use qpool_core::{DeviceIndex, PackedQueue};

/// Arguments for the acquire command
#[derive(Args, Debug)]
pub struct AcquireArgs {
    /// Device to acquire from; -1 means the active device
    #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
    pub device: DeviceIndex,

    /// Use the high-priority pool
    #[clap(long)]
    pub high: bool,

    /// Number of queues to acquire
    #[clap(long, default_value_t = 1)]
    pub count: usize,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// One acquired queue
#[derive(Debug, Serialize)]
pub struct AcquiredQueue {
    /// Display form of the handle
    pub queue: String,
    /// Pool slot
    pub slot: Option<usize>,
    /// Native queue handle
    pub native: String,
    /// Normalized priority
    pub priority: i32,
}

/// Implementation of the acquire command
pub fn execute_acquire(manager: &QueueManager, args: &AcquireArgs) -> Result<()> {
    let mut acquired = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        let handle = manager.acquire_pooled(args.device, args.high)?;
        acquired.push(AcquiredQueue {
            queue: handle.to_string(),
            slot: handle.slot(),
            native: manager.native_queue(&handle)?.to_string(),
            priority: manager.priority(&handle)?,
        });
    }
    super::emit(&acquired, args.json, |queues| {
        for q in queues {
            println!("{}  native={}  priority={}", q.queue, q.native, q.priority);
        }
    })
}

/// Arguments for the pack command
#[derive(Args, Debug)]
pub struct PackArgs {
    /// Device to acquire from; -1 means the active device
    #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
    pub device: DeviceIndex,

    /// Use the high-priority pool
    #[clap(long)]
    pub high: bool,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// Packed form of one queue
#[derive(Debug, Serialize)]
pub struct PackReport {
    /// Display form of the handle
    pub queue: String,
    /// The packed triple
    pub packed: PackedQueue,
    /// Native queue reached through the original handle
    pub native: String,
    /// Whether unpacking reached the same native queue
    pub round_trip: bool,
}

/// Implementation of the pack command
pub fn execute_pack(manager: &QueueManager, args: &PackArgs) -> Result<()> {
    let handle = manager.acquire_pooled(args.device, args.high)?;
    let native = manager.native_queue(&handle)?;
    let packed = manager.pack(&handle);
    let unpacked = manager.unpack(packed)?;
    let round_trip = unpacked == handle && manager.native_queue(&unpacked)? == native;
    ensure!(round_trip, "{} did not unpack to the same queue", handle);

    let report = PackReport {
        queue: handle.to_string(),
        packed,
        native: native.to_string(),
        round_trip,
    };
    super::emit(&report, args.json, |r| {
        let (id, device, kind) = r.packed.into_raw();
        println!("{}", r.queue);
        println!("packed: (queue_id={:#x}, device_index={}, device_kind={})", id, device, kind);
        println!("native: {}", r.native);
        println!("round trip: ok");
    })
}
