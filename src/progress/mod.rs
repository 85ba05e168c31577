//! Progress state, stall detection, and parent/child coordination.
//!
//! # Implementation Model
//!
//! A [`ProgressBar`] owns a [`ProgressState`] (tick counts, message, timestamps),
//! an idle [`StallTimer`], and the children spawned from it. Ticks may arrive
//! concurrently from any number of threads; each one updates the state, pushes
//! the bar's idle timer back, and asks the tree's [`Renderer`] to redraw.
//!
//! While a bar has unfinished children its own timer is stopped and the children
//! watch for stalls instead. When the last child finishes, the parent re-arms
//! its timer unless it has already finished itself. A stall is reported at most
//! once per idle period through the callback supplied to the root.

mod console;
mod coordinator;
mod options;
mod renderer;
mod stall_timer;
mod state;

pub use console::ConsoleRenderer;
pub use coordinator::{ProgressBar, ProgressBarBuilder};
pub use options::{BarColor, DEFAULT_IDLE_TIMEOUT, ProgressOptions};
pub use renderer::{NullRenderer, Renderer};
pub use stall_timer::{DelayTimer, RESET_FAILED_MESSAGE, StallCallback, StallTimer, TimerFactory, delay_timer_factory};
pub use state::ProgressState;
