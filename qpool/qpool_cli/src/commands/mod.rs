//! CLI commands
//!
//! Each command runs against a queue manager built over the simulated runtime.

pub mod info;
pub mod queue;
pub mod stress;

use serde::Serialize;

/// Print a report as pretty JSON or through its human-readable form.
pub fn emit<T: Serialize>(report: &T, json: bool, human: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        human(report);
    }
    Ok(())
}
