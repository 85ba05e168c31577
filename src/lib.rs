//! Nested console progress bars with concurrent ticking and stall detection.
//!
//! # Module Organization
//!
//! - [`progress`]: Progress state, idle timers, and parent/child coordination
//! - [`commands`]: Command-line interface and the simulated workload behind it
//!
//! # Example
//!
//! ```no_run
//! use progress_tree::progress::{ProgressBar, ProgressOptions};
//! use core::time::Duration;
//!
//! # async fn example() {
//! let root = ProgressBar::builder(2, "Downloading")
//!     .options(ProgressOptions::default().with_idle_timeout(Duration::from_secs(5)))
//!     .on_stalled(|percentage, message| eprintln!("stalled at {percentage:.0}%: {message}"))
//!     .build();
//!
//! let child = root.spawn(10, "index", None);
//! for _ in 0..10 {
//!     child.tick(None);
//! }
//!
//! root.tick(Some("unpacking"));
//! root.tick(None);
//! assert!(root.is_done());
//! # }
//! ```

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod commands;
pub mod progress;

pub use commands::{Host, run};
