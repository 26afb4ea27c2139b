//! `then`/`catch` and reaction jobs.
//!
//! `then` registers a fulfill-side and a reject-side reaction sharing one
//! derived promise. A reaction job invokes its handler through the bridge and
//! settles the derived promise with the outcome: a returned value goes
//! through full resolution (so returned thenables are adopted), a thrown
//! payload rejects. A missing handler passes the settlement through.

use crate::error::{RuntimeError, RuntimeResult};
use crate::event_loop::{EventLoop, WeakEventLoop};
use crate::heap::Promise;
use crate::promise::{PromiseReaction, PromiseState, ReactionKind};
use crate::task_queue::MicroTask;
use core_types::{Completion, Function, Value};
use tracing::trace;

/// The loop's script-visible promise methods, created on first use.
pub(crate) struct Intrinsics {
    then: Function,
    catch: Function,
}

impl Intrinsics {
    fn new(weak: WeakEventLoop) -> Self {
        let then = {
            let weak = weak.clone();
            Function::new("then", move |this, args| match weak.upgrade() {
                Some(event_loop) => event_loop.then_method(this, args),
                None => Err(Value::type_error("event loop is gone")),
            })
        };
        let catch = Function::new("catch", move |this, args| match weak.upgrade() {
            Some(event_loop) => event_loop.catch_method(this, args),
            None => Err(Value::type_error("event loop is gone")),
        });
        Self { then, catch }
    }
}

impl EventLoop {
    /// Registers handlers on `promise` and returns the derived promise they
    /// settle.
    ///
    /// Handlers never run inside this call, even if `promise` has already
    /// settled: the matching reaction is queued as a microtask.
    pub fn then(
        &self,
        promise: &Promise,
        on_fulfilled: Option<Value>,
        on_rejected: Option<Value>,
    ) -> RuntimeResult<Promise> {
        if !promise.belongs_to(&self.inner.releases) {
            return Err(RuntimeError::ForeignPromise(promise.id()));
        }
        let derived = self.new_promise();
        let fulfill = PromiseReaction::new(ReactionKind::Fulfill, on_fulfilled, derived.clone());
        let reject = PromiseReaction::new(ReactionKind::Reject, on_rejected, derived.clone());

        let (ready, handled_late) = self.with_record(promise, |record| {
            let handled_late = record.state == PromiseState::Rejected
                && !record.is_handled
                && record.rejection_reported;
            record.is_handled = true;
            let settled_with = record.result().cloned().unwrap_or(Value::Undefined);
            let ready = match record.state {
                PromiseState::Pending => {
                    record.fulfill_reactions.push(fulfill);
                    record.reject_reactions.push(reject);
                    None
                }
                PromiseState::Fulfilled => Some((fulfill, settled_with)),
                PromiseState::Rejected => Some((reject, settled_with)),
            };
            (ready, handled_late)
        })?;

        if handled_late {
            self.inner.tracker.rejection_handled(promise.id());
        }
        if let Some((reaction, argument)) = ready {
            self.enqueue_reaction_job(reaction, argument);
        }
        Ok(derived)
    }

    /// `then(promise, None, on_rejected)`.
    pub fn catch(&self, promise: &Promise, on_rejected: Option<Value>) -> RuntimeResult<Promise> {
        self.then(promise, None, on_rejected)
    }

    /// The intrinsic `then` function, for installation on a promise
    /// prototype. Called with `this` set to a promise of this loop.
    pub fn then_function(&self) -> Function {
        self.intrinsics().then.clone()
    }

    /// The intrinsic `catch` function.
    pub fn catch_function(&self) -> Function {
        self.intrinsics().catch.clone()
    }

    fn intrinsics(&self) -> &Intrinsics {
        self.inner
            .intrinsics
            .get_or_init(|| Intrinsics::new(self.downgrade()))
    }

    fn then_method(&self, this: Value, args: Vec<Value>) -> Completion {
        let promise = self.as_promise(&this).ok_or_else(|| {
            Value::type_error("Method Promise.prototype.then called on incompatible receiver")
        })?;
        let mut args = args.into_iter();
        let on_fulfilled = args.next().filter(|v| self.inner.bridge.is_callable(v));
        let on_rejected = args.next().filter(|v| self.inner.bridge.is_callable(v));
        self.then(&promise, on_fulfilled, on_rejected)
            .map(|derived| derived.to_value())
            .map_err(RuntimeError::into_thrown)
    }

    // `catch(f)` is `then(undefined, f)`, receiver check included.
    fn catch_method(&self, this: Value, args: Vec<Value>) -> Completion {
        let on_rejected = args.into_iter().next().unwrap_or(Value::Undefined);
        self.then_method(this, vec![Value::Undefined, on_rejected])
    }

    pub(crate) fn enqueue_reaction_job(&self, reaction: PromiseReaction, argument: Value) {
        trace!(derived = %reaction.derived.id(), kind = ?reaction.kind, "reaction scheduled");
        let weak = self.downgrade();
        self.enqueue_microtask(MicroTask::new(move || match weak.upgrade() {
            Some(event_loop) => event_loop.run_reaction(reaction, argument),
            None => Ok(()),
        }));
    }

    fn run_reaction(&self, reaction: PromiseReaction, argument: Value) -> RuntimeResult<()> {
        let outcome = match &reaction.handler {
            Some(handler) => self
                .inner
                .bridge
                .invoke(handler, Value::Undefined, vec![argument]),
            None => match reaction.kind {
                ReactionKind::Fulfill => Ok(argument),
                ReactionKind::Reject => Err(argument),
            },
        };
        match outcome {
            Ok(value) => self.resolve(&reaction.derived, value),
            Err(reason) => self.reject(&reaction.derived, reason),
        }
    }
}
