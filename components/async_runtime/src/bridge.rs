//! Callable invocation bridge.
//!
//! The runtime never calls script code itself. Handlers, initializers and
//! thenable `then` members are invoked through an [`InvocationBridge`] owned
//! by the host, which reports either the return value or the thrown payload.
//! The same bridge answers the thenable capability probe, since only the
//! object model knows how to read a member.

use core_types::{Completion, Value};

/// Host interface for calling script values and probing for `then`.
pub trait InvocationBridge {
    /// Calls `callable` with the given receiver and arguments.
    ///
    /// Implementations must support `Value::Function`; the runtime's own
    /// resolving functions and intrinsic `then` are plain functions.
    fn invoke(&self, callable: &Value, this: Value, args: Vec<Value>) -> Completion;

    /// Returns true if `value` can be invoked.
    fn is_callable(&self, value: &Value) -> bool {
        matches!(value, Value::Function(_))
    }

    /// Looks up a callable `then` member on `value`.
    ///
    /// `Ok(None)` means "not a thenable" and is conclusive. `Err` carries a
    /// payload thrown while reading the member.
    fn then_capability(&self, value: &Value) -> Result<Option<Value>, Value>;
}

/// Bridge for hosts whose callables are [`core_types::Function`] values and
/// whose objects are [`core_types::Object`] values.
///
/// # Examples
///
/// ```
/// use async_runtime::{InvocationBridge, NativeBridge};
/// use core_types::{Function, Object, Value};
///
/// let bridge = NativeBridge;
/// let then = Function::new("then", |_, _| Ok(Value::Undefined));
/// let thenable = Value::Object(Object::new().with("then", then));
///
/// assert!(bridge.then_capability(&thenable).unwrap().is_some());
/// assert!(bridge.then_capability(&Value::Smi(1)).unwrap().is_none());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBridge;

impl InvocationBridge for NativeBridge {
    fn invoke(&self, callable: &Value, this: Value, args: Vec<Value>) -> Completion {
        match callable {
            Value::Function(function) => function.call(this, args),
            other => Err(Value::type_error(format!("{} is not a function", other))),
        }
    }

    fn then_capability(&self, value: &Value) -> Result<Option<Value>, Value> {
        let Value::Object(object) = value else {
            return Ok(None);
        };
        let then = object.get("then")?;
        Ok(self.is_callable(&then).then_some(then))
    }
}
