//! Promise resolution: settling a promise from an arbitrary value.
//!
//! `resolve_promise` is the recursive resolution procedure. A value that is
//! the promise itself rejects it with a cycle error; a thenable is adopted in
//! a separate microtask; anything else fulfills the promise. Adoption hands
//! the thenable a fresh pair of one-shot resolving functions whose `resolve`
//! re-enters this procedure, so a chain of thenables unwraps one microtask per
//! link instead of recursing on the native stack.

use crate::error::{RuntimeError, RuntimeResult};
use crate::event_loop::EventLoop;
use crate::heap::Promise;
use crate::promise::{PromiseState, Settlement};
use crate::task_queue::MicroTask;
use core_types::{ErrorKind, Function, JsError, Value};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, trace};

/// Which guard makes a pair of resolving functions one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolutionGuard {
    /// The record's own resolution lock, shared with every other external
    /// resolver of the promise.
    Record,
    /// A flag private to this pair, for thenable adoption. The record is
    /// already locked by the resolve call that started the adoption.
    OneShot,
}

/// A `resolve`/`reject` pair bound to one promise.
pub(crate) struct ResolvingFunctions {
    pub(crate) resolve: Function,
    pub(crate) reject: Function,
}

impl ResolvingFunctions {
    pub(crate) fn into_args(self) -> Vec<Value> {
        vec![Value::Function(self.resolve), Value::Function(self.reject)]
    }
}

/// The payload a promise resolved with itself is rejected with.
pub fn cycle_error() -> Value {
    JsError::new(ErrorKind::TypeError, "Chaining cycle detected for promise").into()
}

fn first_arg(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::Undefined)
}

impl EventLoop {
    /// Resolves `promise` with `value`.
    ///
    /// Only the first resolve or reject of a promise is honored, even while
    /// the promise is still pending on a thenable it adopted.
    pub fn resolve(&self, promise: &Promise, value: Value) -> RuntimeResult<()> {
        if self.lock_resolution(promise)? {
            self.resolve_promise(promise, value);
        }
        Ok(())
    }

    /// Rejects `promise` with `reason`, under the same lock as
    /// [`EventLoop::resolve`].
    pub fn reject(&self, promise: &Promise, reason: Value) -> RuntimeResult<()> {
        if self.lock_resolution(promise)? {
            self.reject_promise(promise, reason);
        }
        Ok(())
    }

    /// Probes `value` for a callable `then` member.
    ///
    /// Promises of this loop answer with the loop's intrinsic `then`;
    /// primitives are never thenables; other objects are probed by the
    /// bridge. `Err` carries a payload thrown by the probe.
    pub fn then_capability(&self, value: &Value) -> Result<Option<Value>, Value> {
        if self.as_promise(value).is_some() {
            return Ok(Some(Value::Function(self.then_function())));
        }
        if !value.is_object() {
            return Ok(None);
        }
        self.inner.bridge.then_capability(value)
    }

    fn lock_resolution(&self, promise: &Promise) -> RuntimeResult<bool> {
        self.with_record(promise, |record| {
            !std::mem::replace(&mut record.already_resolved, true)
        })
    }

    pub(crate) fn resolve_promise(&self, promise: &Promise, value: Value) {
        if self
            .as_promise(&value)
            .is_some_and(|inner| inner.same_promise(promise))
        {
            debug!(promise = %promise.id(), "promise resolved with itself");
            self.reject_promise(promise, cycle_error());
            return;
        }
        match self.then_capability(&value) {
            Err(thrown) => self.reject_promise(promise, thrown),
            Ok(Some(then)) => self.schedule_adoption(promise, value, then),
            Ok(None) => self.fulfill_promise(promise, value),
        }
    }

    pub(crate) fn fulfill_promise(&self, promise: &Promise, value: Value) {
        self.settle(promise, PromiseState::Fulfilled, value);
    }

    pub(crate) fn reject_promise(&self, promise: &Promise, reason: Value) {
        self.settle(promise, PromiseState::Rejected, reason);
    }

    fn settle(&self, promise: &Promise, state: PromiseState, value: Value) {
        let id = promise.id();
        let (settlement, unhandled) = {
            let mut heap = self.inner.heap.borrow_mut();
            let Some(record) = heap.get_mut(id) else {
                return;
            };
            let Some(settlement) = record.settle(state, value.clone()) else {
                trace!(promise = %id, "already settled, ignoring");
                return;
            };
            (settlement, state == PromiseState::Rejected && !record.is_handled)
        };
        let Settlement { fire, discarded } = settlement;
        trace!(promise = %id, ?state, reactions = fire.len(), "promise settled");
        for reaction in fire {
            self.enqueue_reaction_job(reaction, value.clone());
        }
        drop(discarded);
        if unhandled && self.inner.config.track_unhandled_rejections {
            self.inner.pending_rejections.borrow_mut().push(id);
        }
    }

    fn schedule_adoption(&self, promise: &Promise, thenable: Value, then: Value) {
        debug!(promise = %promise.id(), "adopting thenable");
        let weak = self.downgrade();
        let promise = promise.clone();
        self.enqueue_microtask(MicroTask::new(move || {
            if let Some(event_loop) = weak.upgrade() {
                event_loop.run_adoption(&promise, thenable, then);
            }
            Ok(())
        }));
    }

    fn run_adoption(&self, promise: &Promise, thenable: Value, then: Value) {
        let functions = self.resolving_functions(promise, ResolutionGuard::OneShot);
        let reject = functions.reject.clone();
        if let Err(thrown) = self.inner.bridge.invoke(&then, thenable, functions.into_args()) {
            // No effect if the thenable already called resolve or reject.
            // One-shot functions never throw; the record lock is not consulted.
            if let Err(unexpected) = reject.call(Value::Undefined, vec![thrown]) {
                debug!(promise = %promise.id(), reason = %unexpected, "adoption reject threw");
            }
        }
    }

    pub(crate) fn resolving_functions(
        &self,
        promise: &Promise,
        guard: ResolutionGuard,
    ) -> ResolvingFunctions {
        let fired = Rc::new(Cell::new(false));
        let resolve = {
            let (weak, promise, fired) = (self.downgrade(), promise.clone(), fired.clone());
            Function::new("resolve", move |_, args| {
                let Some(event_loop) = weak.upgrade() else {
                    return Ok(Value::Undefined);
                };
                if event_loop.claim(&promise, guard, &fired)? {
                    event_loop.resolve_promise(&promise, first_arg(args));
                }
                Ok(Value::Undefined)
            })
        };
        let reject = {
            let (weak, promise) = (self.downgrade(), promise.clone());
            Function::new("reject", move |_, args| {
                let Some(event_loop) = weak.upgrade() else {
                    return Ok(Value::Undefined);
                };
                if event_loop.claim(&promise, guard, &fired)? {
                    event_loop.reject_promise(&promise, first_arg(args));
                }
                Ok(Value::Undefined)
            })
        };
        ResolvingFunctions { resolve, reject }
    }

    /// Returns true if this call is the first to settle through `guard`.
    fn claim(
        &self,
        promise: &Promise,
        guard: ResolutionGuard,
        fired: &Cell<bool>,
    ) -> Result<bool, Value> {
        match guard {
            ResolutionGuard::OneShot => Ok(!fired.replace(true)),
            ResolutionGuard::Record => self
                .lock_resolution(promise)
                .map_err(RuntimeError::into_thrown),
        }
    }
}
