//! Deferred and repeating callbacks
//!
//! [`schedule_callback`] wraps a function, its arguments and an optional
//! receiver, arms a timer on a [`TimerHost`], and returns a
//! [`DeferredCallback`] handle. The handle can cancel the pending timer,
//! run the function immediately with [`exec`](DeferredCallback::exec), and
//! report whether the function has run via
//! [`has_executed`](DeferredCallback::has_executed).
//!
//! ```
//! use deferral::event_loop::EventLoop;
//! use deferral::{schedule_callback, Value};
//! use std::rc::Rc;
//!
//! let host = Rc::new(EventLoop::new());
//! let handle = schedule_callback(
//!     &host,
//!     |_this, args| {
//!         println!("fired with {}", args[0]);
//!         Ok(())
//!     },
//!     50,
//!     vec![Value::from("a")],
//!     None,
//!     false,
//! )?;
//!
//! assert!(!handle.has_executed());
//! host.run_for(50);
//! assert!(handle.has_executed());
//! # Ok::<(), deferral::Error>(())
//! ```
//!
//! # Lifetime
//!
//! The host keeps the callback alive while its timer is armed, so dropping
//! the handle does not cancel anything. For a repeating callback this means
//! a caller that loses the handle can no longer stop it: the interval keeps
//! firing for as long as the host lives.

use crate::error::{messages, Error, Result, TimerId};
use crate::event_loop::{TimerCallback, TimerHost};
use crate::value::Value;
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Signature of a deferred function: receiver plus positional arguments
pub type DeferredFn = dyn Fn(&Receiver<'_>, &[Value]) -> anyhow::Result<()>;

/// The receiver a deferred function is invoked with
pub enum Receiver<'a> {
    /// No `this_arg` was given; the receiver is the callback's own handle
    Handle(&'a DeferredCallback),
    /// The `this_arg` supplied at scheduling time
    Value(&'a Value),
}

impl<'a> Receiver<'a> {
    /// The handle, if the receiver defaulted to it
    pub fn handle(&self) -> Option<&'a DeferredCallback> {
        match self {
            Receiver::Handle(h) => Some(*h),
            Receiver::Value(_) => None,
        }
    }

    /// The bound value, if a `this_arg` was supplied
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Receiver::Handle(_) => None,
            Receiver::Value(v) => Some(*v),
        }
    }
}

struct Inner {
    func: Rc<DeferredFn>,
    args: Vec<Value>,
    this_arg: Option<Value>,
    delay_ms: u64,
    repeating: bool,
    has_executed: Cell<bool>,
    timer: Cell<Option<TimerId>>,
    host: Weak<dyn TimerHost>,
}

/// Handle to a scheduled callback
///
/// Clones share the same state; [`same_handle`](Self::same_handle) tells
/// whether two handles refer to the same scheduled callback.
#[derive(Clone)]
pub struct DeferredCallback {
    inner: Rc<Inner>,
}

/// Schedule `func` to run after `delay_ms`, once or (`repeating`) every `delay_ms`.
///
/// `args` are passed on every invocation. The receiver is `this_arg` when
/// given, otherwise the returned handle itself. The timer is armed before
/// this function returns.
///
/// Fails with [`Error::InvalidDelay`] if `delay_ms` is negative or larger
/// than the host's maximum; no timer is armed in that case.
pub fn schedule_callback<H, F>(
    host: &Rc<H>,
    func: F,
    delay_ms: i64,
    args: Vec<Value>,
    this_arg: Option<Value>,
    repeating: bool,
) -> Result<DeferredCallback>
where
    H: TimerHost + 'static,
    F: Fn(&Receiver<'_>, &[Value]) -> anyhow::Result<()> + 'static,
{
    let host: Rc<dyn TimerHost> = host.clone();
    arm(&host, Rc::new(func), delay_ms, args, this_arg, repeating)
}

/// [`schedule_callback`] for a host only known as a trait object
pub fn schedule_on<F>(
    host: &Rc<dyn TimerHost>,
    func: F,
    delay_ms: i64,
    args: Vec<Value>,
    this_arg: Option<Value>,
    repeating: bool,
) -> Result<DeferredCallback>
where
    F: Fn(&Receiver<'_>, &[Value]) -> anyhow::Result<()> + 'static,
{
    arm(host, Rc::new(func), delay_ms, args, this_arg, repeating)
}

/// Run `func` once after `delay_ms`, with no arguments and the handle as receiver
pub fn delay<H, F>(host: &Rc<H>, delay_ms: i64, func: F) -> Result<DeferredCallback>
where
    H: TimerHost + 'static,
    F: Fn(&Receiver<'_>, &[Value]) -> anyhow::Result<()> + 'static,
{
    schedule_callback(host, func, delay_ms, Vec::new(), None, false)
}

/// Run `func` every `interval_ms`, with no arguments and the handle as receiver
pub fn every<H, F>(host: &Rc<H>, interval_ms: i64, func: F) -> Result<DeferredCallback>
where
    H: TimerHost + 'static,
    F: Fn(&Receiver<'_>, &[Value]) -> anyhow::Result<()> + 'static,
{
    schedule_callback(host, func, interval_ms, Vec::new(), None, true)
}

/// Validate the delay, build the handle and arm its timer
pub(crate) fn arm(
    host: &Rc<dyn TimerHost>,
    func: Rc<DeferredFn>,
    delay_ms: i64,
    args: Vec<Value>,
    this_arg: Option<Value>,
    repeating: bool,
) -> Result<DeferredCallback> {
    let delay = u64::try_from(delay_ms)
        .map_err(|_| Error::invalid_delay(delay_ms, messages::NEGATIVE_DELAY))?;
    let max = host.max_delay_ms();
    if delay > max {
        return Err(Error::invalid_delay(delay_ms, messages::delay_too_large(max)));
    }

    let inner = Rc::new(Inner {
        func,
        args,
        this_arg,
        delay_ms: delay,
        repeating,
        has_executed: Cell::new(false),
        timer: Cell::new(None),
        host: Rc::downgrade(host),
    });

    let fire_target = inner.clone();
    let callback: TimerCallback = Rc::new(move || DeferredCallback::fire(&fire_target));
    let id = if repeating {
        host.schedule_repeating(callback, delay)
    } else {
        host.schedule_once(callback, delay)
    };
    inner.timer.set(Some(id));

    tracing::debug!(timer = %id, delay, repeating, "callback deferred");
    Ok(DeferredCallback { inner })
}

impl DeferredCallback {
    /// Disarm the pending timer, if any
    ///
    /// Safe to call repeatedly and after the callback has fired. Leaves
    /// [`has_executed`](Self::has_executed) as it is.
    pub fn cancel(&self) -> &Self {
        if let Some(id) = self.inner.timer.take() {
            if let Some(host) = self.inner.host.upgrade() {
                host.cancel(id);
            }
            tracing::debug!(timer = %id, "deferred callback cancelled");
        }
        self
    }

    /// Run the function now and cancel the pending timer
    pub fn exec(&self) -> Result<&Self> {
        self.exec_with(true)
    }

    /// Run the function now with the scheduled arguments and receiver
    ///
    /// With `cancel_pending` the pending timer is disarmed first, so the
    /// function does not run a second time from the schedule. Without it the
    /// timer stays armed and fires at its original time; a repeating
    /// schedule is not shifted by the manual run.
    ///
    /// An error from the function is returned as [`Error::Callback`] and
    /// leaves `has_executed` unchanged.
    pub fn exec_with(&self, cancel_pending: bool) -> Result<&Self> {
        if cancel_pending {
            self.cancel();
        }
        self.invoke()?;
        self.inner.has_executed.set(true);
        Ok(self)
    }

    /// Whether the function has completed in the current cycle
    ///
    /// For a repeating callback this reads `false` while a tick's invocation
    /// is running and `true` once it has returned successfully. A tick that
    /// fails leaves it `false`.
    pub fn has_executed(&self) -> bool {
        self.inner.has_executed.get()
    }

    /// Whether a timer is still armed for this callback
    ///
    /// Asks the host, so timers dropped by the host itself (for example
    /// [`EventLoop::clear`](crate::event_loop::EventLoop::clear)) read as not pending.
    pub fn is_pending(&self) -> bool {
        self.timer_id().is_some()
    }

    /// The host timer currently armed for this callback
    pub fn timer_id(&self) -> Option<TimerId> {
        let id = self.inner.timer.get()?;
        let host = self.inner.host.upgrade()?;
        host.is_armed(id).then_some(id)
    }

    /// The delay (one-shot) or interval (repeating) in milliseconds
    pub fn delay_ms(&self) -> u64 {
        self.inner.delay_ms
    }

    /// Whether this callback fires every `delay_ms` rather than once
    pub fn is_repeating(&self) -> bool {
        self.inner.repeating
    }

    /// The wrapped function
    pub fn func(&self) -> Rc<DeferredFn> {
        self.inner.func.clone()
    }

    /// Arguments passed on every invocation
    pub fn args(&self) -> &[Value] {
        &self.inner.args
    }

    /// The bound receiver, or `None` when the handle is its own receiver
    pub fn this_arg(&self) -> Option<&Value> {
        self.inner.this_arg.as_ref()
    }

    /// Whether both handles refer to the same scheduled callback
    pub fn same_handle(&self, other: &DeferredCallback) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn invoke(&self) -> anyhow::Result<()> {
        let receiver = match &self.inner.this_arg {
            Some(value) => Receiver::Value(value),
            None => Receiver::Handle(self),
        };
        (self.inner.func)(&receiver, &self.inner.args)
    }

    /// Timer entry point
    fn fire(inner: &Rc<Inner>) -> anyhow::Result<()> {
        let handle = DeferredCallback {
            inner: inner.clone(),
        };
        if inner.repeating {
            inner.has_executed.set(false);
        } else {
            inner.timer.set(None);
        }

        handle.invoke()?;
        inner.has_executed.set(true);
        Ok(())
    }
}

impl fmt::Debug for DeferredCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCallback")
            .field("delay_ms", &self.inner.delay_ms)
            .field("repeating", &self.inner.repeating)
            .field("has_executed", &self.inner.has_executed.get())
            .field("timer", &self.timer_id())
            .field("args", &self.inner.args)
            .field("this_arg", &self.inner.this_arg)
            .finish()
    }
}
