//! Deferral: deferred and repeating callbacks with explicit handles
//!
//! Deferral schedules a function to run once after a delay or repeatedly at
//! a fixed interval, and hands back a [`DeferredCallback`] that can cancel
//! the schedule, run the function immediately, and report whether it has
//! run. Timers are armed on a [`TimerHost`](event_loop::TimerHost); the
//! bundled [`EventLoop`](event_loop::EventLoop) runs them on a
//! single-threaded virtual clock.
//!
//! # Quick Start
//!
//! ```
//! use deferral::event_loop::EventLoop;
//! use deferral::every;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! fn main() -> deferral::Result<()> {
//!     let host = Rc::new(EventLoop::new());
//!     let ticks = Rc::new(Cell::new(0));
//!     let t = ticks.clone();
//!     let handle = every(&host, 50, move |_, _| {
//!         t.set(t.get() + 1);
//!         Ok(())
//!     })?;
//!
//!     host.run_for(120);
//!     assert_eq!(ticks.get(), 2);
//!     assert!(handle.has_executed());
//!
//!     handle.cancel();
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Scheduling** | [`deferred`], [`timer`] |
//! | **Platform** | [`event_loop`] |
//! | **Support** | [`value`], [`config`], [`error`](Error) |

pub mod config;
pub mod deferred;
pub mod event_loop;
pub mod prelude;
pub mod timer;
pub mod value;

mod error;

pub use deferred::{delay, every, schedule_callback, schedule_on, DeferredCallback, Receiver};
pub use error::{messages, Error, Result, TimerId};
pub use value::Value;

/// Deferral version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
