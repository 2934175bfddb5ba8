//! The `stress` command
//!
//! Hammers one pool from several threads and reports how many native queues
//! were constructed. However many acquisitions run, the count never exceeds
//! the pool capacity.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Result};
use clap::Args;
use log::debug;
use serde::Serialize;

use qpool_concurrency::QueueManager;
use qpool_core::{DeviceIndex, QueueClass};

/// Arguments for the stress command
#[derive(Args, Debug)]
pub struct StressArgs {
    /// Device to acquire from; -1 means the active device
    #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
    pub device: DeviceIndex,

    /// Use the high-priority pool
    #[clap(long)]
    pub high: bool,

    /// Number of threads
    #[clap(long, default_value_t = 8)]
    pub threads: usize,

    /// Acquisitions per thread
    #[clap(long, default_value_t = 1000)]
    pub iterations: usize,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// Outcome of a stress run
#[derive(Debug, Serialize)]
pub struct StressReport {
    /// Threads used
    pub threads: usize,
    /// Total acquisitions
    pub acquisitions: usize,
    /// Distinct queues handed out
    pub distinct_queues: usize,
    /// Native queues constructed in the pool
    pub constructed: usize,
    /// Pool capacity
    pub capacity: usize,
    /// Wall time in milliseconds
    pub elapsed_ms: u128,
}

/// Implementation of the stress command
pub fn execute(manager: Arc<QueueManager>, args: &StressArgs) -> Result<()> {
    let device = manager.resolve_device(args.device)?;
    let threads = args.threads.max(1);
    let barrier = Arc::new(Barrier::new(threads));
    let start = Instant::now();

    let workers: Vec<_> = (0..threads)
        .map(|index| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            let (high, iterations) = (args.high, args.iterations);
            thread::spawn(move || {
                barrier.wait();
                let mut seen = HashSet::new();
                for _ in 0..iterations {
                    seen.insert(manager.acquire_pooled(device, high)?);
                }
                debug!("Worker {} saw {} distinct queues", index, seen.len());
                Ok::<_, qpool_core::QueueError>(seen)
            })
        })
        .collect();

    let mut distinct = HashSet::new();
    for worker in workers {
        let seen = worker
            .join()
            .map_err(|_| anyhow!("stress worker panicked"))??;
        distinct.extend(seen);
    }

    let report = StressReport {
        threads,
        acquisitions: threads * args.iterations,
        distinct_queues: distinct.len(),
        constructed: manager.constructed_queues(device, QueueClass::from_high_priority(args.high)),
        capacity: manager.queues_per_pool(),
        elapsed_ms: start.elapsed().as_millis(),
    };
    super::emit(&report, args.json, |r| {
        println!("Acquisitions:    {} across {} threads", r.acquisitions, r.threads);
        println!("Distinct queues: {}", r.distinct_queues);
        println!("Constructed:     {} of {}", r.constructed, r.capacity);
        println!("Elapsed:         {} ms", r.elapsed_ms);
    })
}
