//! Restartable interval timer
//!
//! An [`IntervalTimer`] runs a callback every `interval_ms` while it is
//! started. Unlike a bare repeating [`DeferredCallback`], it can be stopped
//! and started again, reports whether it is running, and can notify
//! `on_start` / `on_stop` hooks.
//!
//! ```
//! use deferral::event_loop::EventLoop;
//! use deferral::timer::IntervalTimer;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let host = Rc::new(EventLoop::new());
//! let seconds = Rc::new(Cell::new(0));
//! let s = seconds.clone();
//! let counter = IntervalTimer::new(&host, 1000, move || {
//!     s.set(s.get() + 1);
//!     Ok(())
//! })?;
//!
//! counter.start()?;
//! host.run_for(3000);
//! counter.stop();
//! assert_eq!(seconds.get(), 3);
//! # Ok::<(), deferral::Error>(())
//! ```
//!
//! Dropping the timer stops it without calling `on_stop`.

use crate::deferred::{self, DeferredCallback, DeferredFn, Receiver};
use crate::error::{messages, Error, Result};
use crate::event_loop::TimerHost;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Hook = Box<dyn Fn()>;

/// A repeating callback that can be stopped and started again
///
/// Each `start` arms a fresh repeating [`DeferredCallback`] on the host;
/// `stop` cancels it. The tick count survives restarts.
pub struct IntervalTimer {
    host: Rc<dyn TimerHost>,
    interval_ms: u64,
    tick: Rc<DeferredFn>,
    ticks: Rc<Cell<u64>>,
    on_start: Option<Hook>,
    on_stop: Option<Hook>,
    running: RefCell<Option<DeferredCallback>>,
}

impl IntervalTimer {
    /// Create a stopped timer
    pub fn new<H, F>(host: &Rc<H>, interval_ms: u64, callback: F) -> Result<Self>
    where
        H: TimerHost + 'static,
        F: Fn() -> anyhow::Result<()> + 'static,
    {
        let max = host.max_delay_ms();
        if interval_ms > max {
            let requested = i64::try_from(interval_ms).unwrap_or(i64::MAX);
            return Err(Error::invalid_delay(requested, messages::delay_too_large(max)));
        }

        let ticks = Rc::new(Cell::new(0u64));
        let counter = ticks.clone();
        let tick: Rc<DeferredFn> = Rc::new(move |_: &Receiver<'_>, _: &[Value]| -> anyhow::Result<()> {
            counter.set(counter.get() + 1);
            callback()
        });

        Ok(Self {
            host: host.clone(),
            interval_ms,
            tick,
            ticks,
            on_start: None,
            on_stop: None,
            running: RefCell::new(None),
        })
    }

    /// Hook called each time the timer transitions to running
    pub fn on_start(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Hook called each time the timer transitions to stopped
    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Box::new(hook));
        self
    }

    /// Start ticking. No-op if already running.
    ///
    /// A timer whose schedule was dropped by the host counts as stopped and
    /// is armed again.
    pub fn start(&self) -> Result<&Self> {
        if self.is_running() {
            return Ok(self);
        }

        let delay = i64::try_from(self.interval_ms).unwrap_or(i64::MAX);
        let handle = deferred::arm(&self.host, self.tick.clone(), delay, Vec::new(), None, true)?;
        *self.running.borrow_mut() = Some(handle);
        tracing::debug!(interval = self.interval_ms, "interval timer started");

        if let Some(hook) = &self.on_start {
            hook();
        }
        Ok(self)
    }

    /// Stop ticking. No-op if already stopped.
    pub fn stop(&self) -> &Self {
        let Some(handle) = self.running.borrow_mut().take() else {
            return self;
        };
        if !handle.is_pending() {
            return self;
        }
        handle.cancel();
        tracing::debug!(interval = self.interval_ms, "interval timer stopped");

        if let Some(hook) = &self.on_stop {
            hook();
        }
        self
    }

    /// Whether a tick is currently scheduled
    pub fn is_running(&self) -> bool {
        self.running
            .borrow()
            .as_ref()
            .is_some_and(DeferredCallback::is_pending)
    }

    /// The tick interval in milliseconds
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Number of scheduled ticks run since creation
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.running.get_mut().take() {
            handle.cancel();
        }
    }
}

impl fmt::Debug for IntervalTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalTimer")
            .field("interval_ms", &self.interval_ms)
            .field("running", &self.is_running())
            .field("ticks", &self.ticks.get())
            .finish()
    }
}
