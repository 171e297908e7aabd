//! Event Loop Implementation
//!
//! This module provides the timer facility that deferred callbacks are
//! scheduled on. [`TimerHost`] is the capability set (`schedule_once`,
//! `schedule_repeating`, `cancel`); [`EventLoop`] implements it on a
//! single-threaded virtual clock that only moves when one of the `run_*`
//! methods is called.
//!
//! Callbacks run on the caller's thread, one at a time. The loop never holds
//! a borrow of its own queue while a callback executes, so callbacks may
//! schedule and cancel timers (including their own) freely.

use crate::config::TimerConfig;
use crate::error::TimerId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Callback invoked when a timer fires
pub type TimerCallback = Rc<dyn Fn() -> anyhow::Result<()>>;

/// Platform timer facility
///
/// A scheduled callback fires no earlier than the requested delay, and
/// cancelling before it fires guarantees it is not invoked.
pub trait TimerHost {
    /// Arm a timer that fires once after `delay_ms`
    fn schedule_once(&self, callback: TimerCallback, delay_ms: u64) -> TimerId;

    /// Arm a timer that fires every `interval_ms` until cancelled
    fn schedule_repeating(&self, callback: TimerCallback, interval_ms: u64) -> TimerId;

    /// Disarm a timer. Returns false if it was unknown, already fired or already cancelled.
    fn cancel(&self, id: TimerId) -> bool;

    /// Whether `id` is still armed, i.e. will fire unless cancelled
    fn is_armed(&self, id: TimerId) -> bool;

    /// Largest delay this host accepts
    fn max_delay_ms(&self) -> u64 {
        crate::config::DEFAULT_MAX_DELAY_MS
    }

    /// Receive an error returned by a scheduled callback
    ///
    /// Nothing called the callback directly, so there is no caller to hand
    /// the error back to. Hosts without an error queue just log it.
    fn report_uncaught(&self, id: TimerId, error: anyhow::Error) {
        tracing::error!(timer = %id, error = %error, "uncaught error in timer callback");
    }
}

/// A timer waiting in the queue
struct TimerTask {
    /// Unique timer ID (stable across repeats)
    id: TimerId,
    /// Scheduling order, breaks ties between equal fire times
    seq: u64,
    /// The callback to execute
    callback: TimerCallback,
    /// When the task should fire (virtual time in ms)
    fire_at: u64,
    /// Delay in milliseconds (for repeating tasks)
    delay: u64,
    /// Is this a repeating task (setInterval)?
    repeating: bool,
}

/// A callback error that surfaced from a scheduled firing
#[derive(Debug)]
pub struct UncaughtError {
    /// Timer whose callback failed
    pub timer_id: TimerId,
    /// Virtual time of the failed firing
    pub time: u64,
    /// The error returned by the callback
    pub error: anyhow::Error,
}

/// Result of a `run_*` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Number of timer callbacks invoked
    pub timers_fired: usize,
    /// Number of those callbacks that returned an error
    pub uncaught_errors: usize,
    /// The virtual time when the run finished
    pub final_time: u64,
    /// The run stopped because `max_ticks_per_run` was reached
    pub truncated: bool,
}

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLoopStats {
    /// Timers armed
    pub total_scheduled: u64,
    /// Timer callbacks invoked
    pub total_fired: u64,
    /// Timers disarmed before firing (or between repeats)
    pub total_cancelled: u64,
    /// Callbacks that returned an error
    pub total_uncaught_errors: u64,
    /// Longest single callback, wall-clock microseconds
    pub longest_callback_us: u64,
}

/// The event loop owns the timer queue and the virtual clock
pub struct EventLoop {
    config: TimerConfig,
    /// Current virtual time in milliseconds
    virtual_time: Cell<u64>,
    /// Next timer ID
    next_timer_id: Cell<u64>,
    /// Next scheduling sequence number
    next_seq: Cell<u64>,
    /// Armed timers
    timers: RefCell<Vec<TimerTask>>,
    /// Errors returned by scheduled callbacks, oldest first
    uncaught_errors: RefCell<Vec<UncaughtError>>,
    stats: RefCell<EventLoopStats>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create a new event loop with the default configuration
    pub fn new() -> Self {
        Self::with_config(TimerConfig::default())
    }

    /// Create a new event loop with a custom configuration
    pub fn with_config(config: TimerConfig) -> Self {
        Self {
            config,
            virtual_time: Cell::new(0),
            next_timer_id: Cell::new(1),
            next_seq: Cell::new(0),
            timers: RefCell::new(Vec::new()),
            uncaught_errors: RefCell::new(Vec::new()),
            stats: RefCell::new(EventLoopStats::default()),
        }
    }

    /// The configuration this loop enforces
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Get current virtual time
    pub fn current_time(&self) -> u64 {
        self.virtual_time.get()
    }

    /// Arm a timer (setTimeout/setInterval)
    pub fn schedule_timer(&self, callback: TimerCallback, delay: u64, repeating: bool) -> TimerId {
        let id = TimerId(self.next_timer_id.get());
        self.next_timer_id.set(id.0 + 1);

        let delay = if repeating {
            delay.max(self.config.min_interval_ms)
        } else {
            delay
        };
        let fire_at = self.current_time().saturating_add(delay);
        let seq = self.bump_seq();
        self.timers.borrow_mut().push(TimerTask {
            id,
            seq,
            callback,
            fire_at,
            delay,
            repeating,
        });
        self.stats.borrow_mut().total_scheduled += 1;

        tracing::debug!(timer = %id, delay, repeating, fire_at, "timer scheduled");
        id
    }

    /// Disarm a timer by ID
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        let removed = {
            let mut timers = self.timers.borrow_mut();
            let before = timers.len();
            timers.retain(|t| t.id != id);
            before != timers.len()
        };

        if removed {
            self.stats.borrow_mut().total_cancelled += 1;
            tracing::debug!(timer = %id, "timer cancelled");
        }
        removed
    }

    /// Check if any timer is armed
    pub fn has_pending_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }

    /// Number of armed timers
    pub fn pending_timer_count(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Get the time of the next scheduled firing
    pub fn next_timer_time(&self) -> Option<u64> {
        self.timers.borrow().iter().map(|t| t.fire_at).min()
    }

    /// Fire every timer due within the next `ms` milliseconds, then move the
    /// clock to the end of the window
    pub fn run_for(&self, ms: u64) -> RunResult {
        let deadline = self.current_time().saturating_add(ms);
        let mut result = self.run_until(deadline, |_| {});
        if !result.truncated {
            self.virtual_time.set(deadline);
            result.final_time = deadline;
        }
        result
    }

    /// Fire timers until none remain
    ///
    /// A repeating timer that is never cancelled keeps the queue non-empty;
    /// such runs end once `max_ticks_per_run` firings have happened and
    /// report `truncated`.
    pub fn run_to_completion(&self) -> RunResult {
        self.run_until(u64::MAX, |_| {})
    }

    /// Like [`run_for`](Self::run_for), but sleeps on the wall clock until
    /// each firing is due, so a window of `duration` takes that long
    pub fn run_for_realtime(&self, duration: Duration) -> RunResult {
        let start = Instant::now();
        let base = self.current_time();
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let deadline = base.saturating_add(ms);

        let mut result = self.run_until(deadline, |fire_at| {
            let due = start + Duration::from_millis(fire_at.saturating_sub(base));
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        });

        if !result.truncated {
            let elapsed = start.elapsed();
            if elapsed < duration {
                thread::sleep(duration - elapsed);
            }
            self.virtual_time.set(deadline);
            result.final_time = deadline;
        }
        result
    }

    /// Take all errors reported by scheduled callbacks since the last drain
    pub fn drain_uncaught_errors(&self) -> Vec<UncaughtError> {
        std::mem::take(&mut *self.uncaught_errors.borrow_mut())
    }

    /// Drop every armed timer and pending error
    ///
    /// Handles whose timers were dropped stop reporting themselves pending.
    pub fn clear(&self) {
        let dropped: Vec<TimerTask> = std::mem::take(&mut *self.timers.borrow_mut());
        self.uncaught_errors.borrow_mut().clear();
        tracing::debug!(timers = dropped.len(), "event loop cleared");
        // Callbacks may own handles that cancel on drop; release them with no borrow held.
        drop(dropped);
    }

    /// Get a snapshot of the current event loop statistics.
    pub fn stats(&self) -> EventLoopStats {
        self.stats.borrow().clone()
    }

    /// Reset all event loop statistics to zero.
    pub fn reset_stats(&self) {
        *self.stats.borrow_mut() = EventLoopStats::default();
    }

    fn bump_seq(&self) -> u64 {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        seq
    }

    /// Fire due timers in (fire_at, seq) order up to `deadline`.
    /// `before_fire` runs with the fire time before each callback.
    fn run_until(&self, deadline: u64, mut before_fire: impl FnMut(u64)) -> RunResult {
        let mut result = RunResult::default();

        loop {
            let Some(fire_at) = self.next_timer_time().filter(|t| *t <= deadline) else {
                break;
            };
            if result.timers_fired >= self.config.max_ticks_per_run {
                result.truncated = true;
                tracing::warn!(
                    budget = self.config.max_ticks_per_run,
                    time = self.current_time(),
                    "tick budget exhausted, stopping run"
                );
                break;
            }

            before_fire(fire_at);
            match self.fire_next(deadline) {
                Some(failed) => {
                    result.timers_fired += 1;
                    if failed {
                        result.uncaught_errors += 1;
                    }
                }
                None => break,
            }
        }

        result.final_time = self.current_time();
        result
    }

    /// Pop the earliest due timer, re-arm it if repeating, and invoke it.
    /// Returns `Some(failed)` if a callback ran.
    fn fire_next(&self, deadline: u64) -> Option<bool> {
        let (id, callback) = {
            let mut timers = self.timers.borrow_mut();
            let idx = timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.fire_at <= deadline)
                .min_by_key(|(_, t)| (t.fire_at, t.seq))
                .map(|(i, _)| i)?;
            let task = timers.remove(idx);

            if task.fire_at > self.virtual_time.get() {
                self.virtual_time.set(task.fire_at);
            }

            // Re-arm before running so the callback can cancel its own interval
            if task.repeating {
                let seq = self.bump_seq();
                timers.push(TimerTask {
                    id: task.id,
                    seq,
                    callback: task.callback.clone(),
                    fire_at: self.virtual_time.get().saturating_add(task.delay),
                    delay: task.delay,
                    repeating: true,
                });
            }
            (task.id, task.callback)
        };

        let now = self.current_time();
        tracing::trace!(timer = %id, time = now, "timer fired");

        let started = Instant::now();
        let outcome = callback();
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        {
            let mut stats = self.stats.borrow_mut();
            stats.total_fired += 1;
            stats.longest_callback_us = stats.longest_callback_us.max(elapsed_us);
        }

        match outcome {
            Ok(()) => Some(false),
            Err(error) => {
                self.report_uncaught(id, error);
                Some(true)
            }
        }
    }
}

impl TimerHost for EventLoop {
    fn schedule_once(&self, callback: TimerCallback, delay_ms: u64) -> TimerId {
        self.schedule_timer(callback, delay_ms, false)
    }

    fn schedule_repeating(&self, callback: TimerCallback, interval_ms: u64) -> TimerId {
        self.schedule_timer(callback, interval_ms, true)
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.cancel_timer(id)
    }

    fn is_armed(&self, id: TimerId) -> bool {
        self.timers.borrow().iter().any(|t| t.id == id)
    }

    fn max_delay_ms(&self) -> u64 {
        self.config.max_delay_ms
    }

    /// Log the error and queue it for [`drain_uncaught_errors`](EventLoop::drain_uncaught_errors)
    fn report_uncaught(&self, id: TimerId, error: anyhow::Error) {
        let time = self.current_time();
        self.stats.borrow_mut().total_uncaught_errors += 1;
        tracing::error!(timer = %id, time, error = %error, "uncaught error in timer callback");
        self.uncaught_errors.borrow_mut().push(UncaughtError {
            timer_id: id,
            time,
            error,
        });
    }
}
