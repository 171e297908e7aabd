//! Shared test helpers for integration tests
#![allow(dead_code)]

use deferral::event_loop::EventLoop;
use deferral::{DeferredCallback, Receiver, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Receiver observed by a recorded call
pub enum Seen {
    Handle(DeferredCallback),
    Value(Value),
}

/// One invocation captured by [`recorder`]
pub struct Call {
    /// Virtual time of the call
    pub time: u64,
    pub args: Vec<Value>,
    pub this: Seen,
    /// `has_executed` of the receiving handle while the call ran
    pub has_executed_during: Option<bool>,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Create a fresh event loop
pub fn host() -> Rc<EventLoop> {
    Rc::new(EventLoop::new())
}

/// A callback that records every invocation into the returned log
pub fn recorder(
    host: &Rc<EventLoop>,
) -> (CallLog, impl Fn(&Receiver<'_>, &[Value]) -> anyhow::Result<()> + 'static) {
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let clock = Rc::downgrade(host);
    let func = move |this: &Receiver<'_>, args: &[Value]| -> anyhow::Result<()> {
        let (seen, during) = match this {
            Receiver::Handle(h) => (Seen::Handle((*h).clone()), Some(h.has_executed())),
            Receiver::Value(v) => (Seen::Value((*v).clone()), None),
        };
        sink.borrow_mut().push(Call {
            time: clock.upgrade().map(|h| h.current_time()).unwrap_or_default(),
            args: args.to_vec(),
            this: seen,
            has_executed_during: during,
        });
        Ok(())
    };
    (log, func)
}

/// A callback that only counts invocations
pub fn counter() -> (Rc<Cell<u32>>, impl Fn(&Receiver<'_>, &[Value]) -> anyhow::Result<()> + 'static) {
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    (count, move |_: &Receiver<'_>, _: &[Value]| -> anyhow::Result<()> {
        c.set(c.get() + 1);
        Ok(())
    })
}

/// The `['a', 2, {arg: 3}]` argument list
pub fn sample_args() -> Vec<Value> {
    let obj = Value::new_object();
    obj.set("arg", Value::from(3));
    vec![Value::from("a"), Value::from(2), obj]
}
