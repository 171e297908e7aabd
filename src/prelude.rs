//! Prelude module for convenient imports
//!
//! ```
//! use deferral::prelude::*;
//! use std::rc::Rc;
//!
//! fn main() -> Result<()> {
//!     let host = Rc::new(EventLoop::new());
//!     let handle = delay(&host, 10, |_, _| Ok(()))?;
//!     host.run_for(10);
//!     assert!(handle.has_executed());
//!     Ok(())
//! }
//! ```

// Scheduling
pub use crate::deferred::{delay, every, schedule_callback, schedule_on, DeferredCallback, Receiver};
pub use crate::timer::IntervalTimer;

// Timer facility
pub use crate::event_loop::{EventLoop, RunResult, TimerHost};

// Configuration
pub use crate::config::TimerConfig;

// Values and errors
pub use crate::error::{Error, Result, TimerId};
pub use crate::value::Value;

// Version constant
pub use crate::VERSION;
