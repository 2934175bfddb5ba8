use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};

use qpool_concurrency::QueueManager;
use qpool_core::{DeviceIndex, SimulatedRuntime};

mod commands;
mod config;

use commands::info::InfoArgs;
use commands::queue::{AcquireArgs, PackArgs};
use commands::stress::StressArgs;
use config::CliConfig;

/// qpool Command Line Interface
///
/// Drives the pooled queue manager over the simulated reference runtime.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// TOML configuration file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Number of simulated devices
    #[clap(long, global = true)]
    devices: Option<DeviceIndex>,

    /// Log at debug level
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the runtime and pool layout
    Info(InfoArgs),

    /// Acquire pooled queues round-robin
    Acquire(AcquireArgs),

    /// Acquire a queue and show its packed form
    Pack(PackArgs),

    /// Acquire from many threads and count constructed queues
    Stress(StressArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = CliConfig::load(cli.config.as_deref(), cli.devices)?;
    debug!("Loaded configuration: {:?}", config);

    let runtime = Arc::new(SimulatedRuntime::new(config.simulated.clone()));
    let manager = Arc::new(QueueManager::new(runtime, config.pool.clone())?);

    match cli.command {
        Commands::Info(args) => commands::info::execute(&manager, &args),
        Commands::Acquire(args) => commands::queue::execute_acquire(&manager, &args),
        Commands::Pack(args) => commands::queue::execute_pack(&manager, &args),
        Commands::Stress(args) => commands::stress::execute(manager, &args),
    }
}
