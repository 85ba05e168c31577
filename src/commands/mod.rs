//! Command-line interface for progress-tree
//!
//! # Implementation Model
//!
//! The `run` function parses command-line arguments using clap, loads the
//! configuration, and drives a simulated workload through a progress tree
//! drawn with [`ConsoleRenderer`](crate::progress::ConsoleRenderer):
//!
//! 1. Load `progress.toml` (or the file given with `--config`) and apply
//!    command-line overrides
//! 2. Spawn the requested children under a root bar and tick them
//!    concurrently, then tick the root
//! 3. Report every stall to the host's error stream as it happens
//! 4. Print a one-line summary to the host's output stream
//!
//! All terminal and process interaction goes through the [`Host`] trait so the
//! whole flow can be exercised from tests.

mod common;
mod config;
mod demo;
mod host;
mod run;

pub use common::{ColorMode, LogLevel, init_logging};
pub use config::{Config, DEFAULT_CONFIG_FILE};
pub use demo::{DemoArgs, run_demo};
pub use host::Host;
#[cfg(test)]
pub use host::TestHost;
pub use run::run;
