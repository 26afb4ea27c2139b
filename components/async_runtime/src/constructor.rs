//! Promise construction: `new Promise(initializer)`, `Promise.resolve`,
//! `Promise.reject`.

use crate::error::RuntimeResult;
use crate::event_loop::EventLoop;
use crate::heap::Promise;
use crate::resolution::ResolutionGuard;
use core_types::Value;

impl EventLoop {
    /// `new Promise(initializer)`.
    ///
    /// `initializer` is invoked synchronously, once, with a `resolve` and a
    /// `reject` function bound to the new promise. If it throws, the promise
    /// rejects with the thrown payload, unless it was already resolved.
    ///
    /// A non-callable initializer throws a `TypeError` and creates nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_runtime::{EventLoop, PromiseState};
    /// use core_types::{Function, Value};
    ///
    /// let event_loop = EventLoop::new();
    /// let initializer = Function::new("init", |_, args| {
    ///     let resolve = args[0].as_function().unwrap();
    ///     resolve.call(Value::Undefined, vec![Value::Smi(1)])
    /// });
    /// let promise = event_loop.construct(&initializer.into()).unwrap();
    /// assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Fulfilled);
    /// ```
    pub fn construct(&self, initializer: &Value) -> Result<Promise, Value> {
        if !self.inner.bridge.is_callable(initializer) {
            return Err(Value::type_error(format!(
                "Promise resolver {} is not a function",
                initializer
            )));
        }
        let promise = self.new_promise();
        let functions = self.resolving_functions(&promise, ResolutionGuard::Record);
        let reject = functions.reject.clone();
        if let Err(thrown) = self
            .inner
            .bridge
            .invoke(initializer, Value::Undefined, functions.into_args())
        {
            reject.call(Value::Undefined, vec![thrown])?;
        }
        Ok(promise)
    }

    /// `Promise.resolve(value)`: `value` itself if it is already a promise of
    /// this loop, otherwise a new promise resolved with it.
    pub fn promise_resolve(&self, value: Value) -> RuntimeResult<Promise> {
        if let Some(promise) = self.as_promise(&value) {
            return Ok(promise);
        }
        let promise = self.new_promise();
        self.resolve(&promise, value)?;
        Ok(promise)
    }

    /// `Promise.reject(reason)`: a new promise rejected with `reason`.
    pub fn promise_reject(&self, reason: Value) -> RuntimeResult<Promise> {
        let promise = self.new_promise();
        self.reject(&promise, reason)?;
        Ok(promise)
    }
}
