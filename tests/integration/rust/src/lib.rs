//! Integration test suite for the promise runtime
//!
//! This crate provides integration tests that verify the value model and the
//! async runtime work together across component boundaries.

use async_runtime::EventLoop;
use core_types::{Function, Object, Value};

/// Re-export components for test convenience
pub mod components {
    pub use async_runtime;
    pub use core_types;
}

/// Builds a promise prototype object carrying the loop's intrinsic `then`
/// and `catch`, the way a host installs them.
pub fn promise_prototype(event_loop: &EventLoop) -> Object {
    Object::new()
        .with("then", event_loop.then_function())
        .with("catch", event_loop.catch_function())
}

/// Calls `method` on `receiver` through `prototype`, as script would.
pub fn call_method(prototype: &Object, method: &str, receiver: Value, args: Vec<Value>) -> Result<Value, Value> {
    let function = prototype.get(method)?;
    match function.as_function() {
        Some(function) => function.call(receiver, args),
        None => Err(Value::type_error(format!("{} is not a function", method))),
    }
}

/// The first argument of a call, or `Undefined`.
pub fn first(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::Undefined)
}

/// A function value from a closure.
pub fn function(name: &str, f: impl Fn(Value, Vec<Value>) -> Result<Value, Value> + 'static) -> Value {
    Function::new(name, f).into()
}
