//! Shared helpers for the unit tests

use async_runtime::{EventLoop, RejectionLog};
use core_types::{Function, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Routes runtime tracing output to the test harness. Only the first call
/// installs a subscriber.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// An event loop whose rejection events land in the returned log.
pub fn logged_loop() -> (EventLoop, Rc<RejectionLog>) {
    init_test_logging();
    let log = Rc::new(RejectionLog::new());
    let event_loop = EventLoop::builder().tracker(log.clone()).build();
    (event_loop, log)
}

pub type Calls = Rc<RefCell<Vec<Value>>>;

pub fn calls() -> Calls {
    Rc::new(RefCell::new(Vec::new()))
}

/// A handler that records its first argument and returns `Undefined`.
pub fn recorder(calls: &Calls) -> Value {
    let calls = calls.clone();
    Function::new("record", move |_, args| {
        calls
            .borrow_mut()
            .push(args.into_iter().next().unwrap_or(Value::Undefined));
        Ok(Value::Undefined)
    })
    .into()
}

/// A handler that records a fixed tag, for ordering checks.
pub fn tagger(calls: &Calls, tag: &str) -> Value {
    let (calls, tag) = (calls.clone(), Value::from(tag));
    Function::new("tag", move |_, _| {
        calls.borrow_mut().push(tag.clone());
        Ok(Value::Undefined)
    })
    .into()
}

/// A handler that returns its argument plus `n`.
pub fn add(n: i32) -> Value {
    Function::new("add", move |_, args| match args.first() {
        Some(Value::Smi(v)) => Ok(Value::Smi(v + n)),
        other => Err(Value::type_error(format!("expected a number, got {:?}", other))),
    })
    .into()
}

/// A handler that returns a fixed value.
pub fn returning(value: Value) -> Value {
    Function::new("returning", move |_, _| Ok(value.clone())).into()
}

/// A handler that throws a fixed payload.
pub fn throwing(payload: Value) -> Value {
    Function::new("throwing", move |_, _| Err(payload.clone())).into()
}
