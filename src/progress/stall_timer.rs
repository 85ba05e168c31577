//! One-shot, resettable idle timers.
//!
//! A [`StallTimer`] fires its callback once if it is neither reset nor stopped
//! within its timeout. [`DelayTimer`] implements this as a cancellable delayed
//! task on the tokio runtime that was current when the timer was created.

use core::fmt::{Debug, Formatter};
use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "     timer";

/// Message passed to the callback when a scheduled fire was lost before it could be rescheduled.
pub const RESET_FAILED_MESSAGE: &str = "Reset of timer failed";

/// Invoked with the last known `(percentage, message)` when progress stalls.
pub type StallCallback = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// Creates the timer owned by each progress bar.
pub type TimerFactory = Arc<dyn Fn() -> Box<dyn StallTimer> + Send + Sync>;

/// A single-shot delay timer that can be re-armed.
pub trait StallTimer: Send + Sync + Debug {
    /// Arm the timer to fire `callback` once after `timeout`.
    ///
    /// `percentage` and `message` are reported if the timer fires before its first reset.
    fn start(&self, callback: StallCallback, timeout: Duration, percentage: f64, message: &str);

    /// Record the latest snapshot and push the fire back by a full timeout.
    ///
    /// Does nothing when the timer is stopped.
    fn reset(&self, percentage: f64, message: &str);

    /// Disarm the timer. Safe to call repeatedly.
    fn stop(&self);

    /// Whether a fire is currently scheduled.
    fn is_armed(&self) -> bool;
}

/// Factory producing tokio-backed [`DelayTimer`]s.
#[must_use]
pub fn delay_timer_factory() -> TimerFactory {
    Arc::new(|| -> Box<dyn StallTimer> { Box::new(DelayTimer::new()) })
}

enum Schedule {
    Stopped,
    Pending(JoinHandle<()>),
    Fired,
}

struct TimerSlot {
    schedule: Schedule,
    generation: u64,
    timeout: Duration,
    callback: Option<StallCallback>,
    percentage: f64,
    message: String,
}

/// Tokio implementation of [`StallTimer`].
pub struct DelayTimer {
    runtime: Option<Handle>,
    slot: Arc<Mutex<TimerSlot>>,
}

impl DelayTimer {
    /// Create an idle timer bound to the current tokio runtime, if any.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runtime: Handle::try_current().ok(),
            slot: Arc::new(Mutex::new(TimerSlot {
                schedule: Schedule::Stopped,
                generation: 0,
                timeout: Duration::ZERO,
                callback: None,
                percentage: 0.0,
                message: String::new(),
            })),
        }
    }

    fn schedule(&self, slot: &mut TimerSlot) {
        slot.generation += 1;

        let Some(runtime) = &self.runtime else {
            log::warn!(target: LOG_TARGET, "No tokio runtime available, stall detection is disabled");
            slot.schedule = Schedule::Stopped;
            return;
        };

        let generation = slot.generation;
        let timeout = slot.timeout;
        let shared = Arc::clone(&self.slot);
        slot.schedule = Schedule::Pending(runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            fire(&shared, generation);
        }));
    }

    /// Abort the pending task without updating the schedule, as a runtime shutdown would.
    #[cfg(test)]
    pub(crate) fn lose_pending_fire(&self) {
        if let Schedule::Pending(task) = &self.slot.lock().unwrap_or_else(PoisonError::into_inner).schedule {
            task.abort();
        }
    }
}

fn fire(shared: &Mutex<TimerSlot>, generation: u64) {
    let (callback, percentage, message) = {
        let mut slot = shared.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation != generation || !matches!(slot.schedule, Schedule::Pending(_)) {
            // superseded by a reset or stop
            return;
        }

        slot.schedule = Schedule::Fired;
        (slot.callback.clone(), slot.percentage, slot.message.clone())
    };

    log::debug!(target: LOG_TARGET, "Idle timer fired at {percentage:.1}%");
    if let Some(callback) = callback {
        callback(percentage, &message);
    }
}

impl Default for DelayTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StallTimer for DelayTimer {
    fn start(&self, callback: StallCallback, timeout: Duration, percentage: f64, message: &str) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Schedule::Pending(task) = &slot.schedule {
            task.abort();
        }

        slot.callback = Some(callback);
        slot.timeout = timeout;
        slot.percentage = percentage;
        message.clone_into(&mut slot.message);
        self.schedule(&mut slot);
    }

    fn reset(&self, percentage: f64, message: &str) {
        let lost_callback = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.percentage = percentage;
            message.clone_into(&mut slot.message);

            let lost = match &slot.schedule {
                Schedule::Stopped => return,
                Schedule::Pending(task) if task.is_finished() => true,
                Schedule::Pending(task) => {
                    task.abort();
                    false
                }
                Schedule::Fired => false,
            };

            if lost {
                // the delayed task ended without firing, so there is nothing left to reschedule
                slot.schedule = Schedule::Stopped;
                slot.generation += 1;
                slot.callback.clone()
            } else {
                self.schedule(&mut slot);
                None
            }
        };

        if let Some(callback) = lost_callback {
            log::debug!(target: LOG_TARGET, "Idle timer was lost before it could be reset");
            callback(percentage, RESET_FAILED_MESSAGE);
        }
    }

    fn stop(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Schedule::Pending(task) = &slot.schedule {
            task.abort();
        }

        slot.schedule = Schedule::Stopped;
        slot.generation += 1;
    }

    fn is_armed(&self) -> bool {
        matches!(
            &self.slot.lock().unwrap_or_else(PoisonError::into_inner).schedule,
            Schedule::Pending(task) if !task.is_finished()
        )
    }
}

impl Drop for DelayTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Debug for DelayTimer {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DelayTimer")
            .field("runtime", &self.runtime.is_some())
            .field("armed", &self.is_armed())
            .finish_non_exhaustive()
    }
}
