use super::options::{BarColor, ProgressOptions};
use chrono::{DateTime, Local, TimeDelta};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Converts a caller-supplied count into a tick value, treating negatives as zero.
fn clamp_ticks(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Tick, message, and timing bookkeeping for a single bar.
///
/// Every field is individually atomic. Readers may briefly observe a new tick
/// count together with the previous message; the next redisplay converges.
#[derive(Debug)]
pub struct ProgressState {
    max_ticks: AtomicU64,
    current_tick: AtomicU64,
    message: Mutex<String>,
    start_time: DateTime<Local>,
    end_time: OnceLock<DateTime<Local>>,
    options: ProgressOptions,
}

impl ProgressState {
    #[must_use]
    pub fn new(max_ticks: i64, message: impl Into<String>, options: ProgressOptions) -> Self {
        Self {
            max_ticks: AtomicU64::new(clamp_ticks(max_ticks)),
            current_tick: AtomicU64::new(0),
            message: Mutex::new(message.into()),
            start_time: Local::now(),
            end_time: OnceLock::new(),
            options,
        }
    }

    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        self.max_ticks.load(Ordering::Acquire)
    }

    /// Replace the target tick count. Negative values become zero.
    pub fn set_max_ticks(&self, max_ticks: i64) {
        let _ = self.max_ticks.swap(clamp_ticks(max_ticks), Ordering::AcqRel);
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.message.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_message(&self, message: impl Into<String>) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = message.into();
    }

    /// Record one unit of work, or jump to `explicit` when given.
    ///
    /// Returns `true` only for the call that moved the bar into its finished state.
    pub fn advance(&self, explicit: Option<i64>, message: Option<&str>) -> bool {
        match explicit {
            Some(value) => self.current_tick.store(clamp_ticks(value), Ordering::Release),
            None => {
                let _ = self.current_tick.fetch_add(1, Ordering::AcqRel);
            }
        }

        if let Some(message) = message {
            self.set_message(message);
        }

        self.current_tick() >= self.max_ticks() && self.end_time.set(Local::now()).is_ok()
    }

    /// Completion in the range `[0, 100]`.
    ///
    /// A bar that expects zero ticks is always complete.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "percentages do not need exact tick counts")]
    pub fn percentage(&self) -> f64 {
        let max = self.max_ticks() as f64;
        let current = self.current_tick() as f64;
        let percentage = ((100.0 / max) * current).clamp(0.0, 100.0);

        // 0 / 0 yields NaN for bars that expect no ticks
        if percentage.is_nan() || percentage < 0.0 { 100.0 } else { percentage }
    }

    #[must_use]
    pub const fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time.get().copied()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.end_time.get().is_some()
    }

    /// Time spent so far, or the total time once the bar has finished.
    #[must_use]
    pub fn elapsed(&self) -> TimeDelta {
        self.end_time().unwrap_or_else(Local::now) - self.start_time
    }

    /// Whether the renderer should hide or compact this bar.
    #[must_use]
    pub fn collapse(&self) -> bool {
        self.is_done() && self.options.collapse_when_finished
    }

    #[must_use]
    pub fn foreground_color(&self) -> BarColor {
        if self.is_done() {
            self.options.foreground_color_done.unwrap_or(self.options.foreground_color)
        } else {
            self.options.foreground_color
        }
    }

    #[must_use]
    pub const fn options(&self) -> &ProgressOptions {
        &self.options
    }
}
