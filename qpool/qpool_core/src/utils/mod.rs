//! Utility functions and helpers.
//!
//! This module provides configuration loading shared by qpool components.

pub mod config;

pub use config::QueuePoolConfig;
