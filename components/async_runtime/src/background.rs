//! Background task bridge.
//!
//! Work running on other threads never touches a promise record. It holds a
//! [`Completer`], which posts a settlement intent over a channel owned by the
//! event loop. The loop turns each intent into a microtask at its next
//! checkpoint, and only that microtask settles the promise.
//!
//! The intent carries an explicit [`Outcome`]: success with a value, or
//! failure with a [`RejectionSignal`]. "The work failed" and "the work
//! produced a value that happens to describe a failure" stay distinct.

use crate::error::{RuntimeError, RuntimeResult};
use crate::event_loop::EventLoop;
use crate::heap::Promise;
use crate::promise::PromiseId;
use crate::task_queue::MicroTask;
use core_types::{ErrorKind, JsError, Value};
use crossbeam::channel::Sender;
use tracing::{debug, trace};

/// Marks a failed unit of background work and carries its rejection payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectionSignal<T> {
    payload: T,
}

impl<T> RejectionSignal<T> {
    /// Wraps a rejection payload.
    pub fn new(payload: T) -> Self {
        Self { payload }
    }

    /// The payload the promise will be rejected with.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Unwraps the payload.
    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// Result of a unit of background work.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The work succeeded with a value
    Success(T),
    /// The work failed
    Failure(RejectionSignal<T>),
}

impl<T> Outcome<T> {
    /// Shorthand for `Outcome::Failure(RejectionSignal::new(payload))`.
    pub fn failure(payload: T) -> Self {
        Outcome::Failure(RejectionSignal::new(payload))
    }

    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Maps the value or payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(signal) => Outcome::failure(f(signal.into_payload())),
        }
    }
}

impl<T> From<Result<T, T>> for Outcome<T> {
    fn from(result: Result<T, T>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(payload) => Outcome::failure(payload),
        }
    }
}

type Produce = Box<dyn FnOnce() -> Outcome<Value> + Send>;

pub(crate) enum SettlementIntent {
    Settle { promise: PromiseId, produce: Produce },
    Abandoned { promise: PromiseId },
}

/// The sending half of a background promise.
///
/// A `Completer` is `Send` and settles its promise at most once. Dropping it
/// without settling (for example when the worker panics) rejects the promise
/// with an `InternalError`.
pub struct Completer {
    promise: PromiseId,
    sender: Sender<SettlementIntent>,
    settled: bool,
}

impl Completer {
    /// Id of the promise this completer settles.
    pub fn promise_id(&self) -> PromiseId {
        self.promise
    }

    /// Posts the outcome. The value is converted on the event loop thread.
    pub fn complete<T>(mut self, outcome: Outcome<T>)
    where
        T: Into<Value> + Send + 'static,
    {
        self.settled = true;
        let intent = SettlementIntent::Settle {
            promise: self.promise,
            produce: Box::new(move || outcome.map(Into::into)),
        };
        if self.sender.send(intent).is_err() {
            trace!(promise = %self.promise, "event loop gone, settlement dropped");
        }
    }

    /// Posts a successful outcome.
    pub fn fulfill<T>(self, value: T)
    where
        T: Into<Value> + Send + 'static,
    {
        self.complete(Outcome::Success(value));
    }

    /// Posts a failed outcome.
    pub fn reject<T>(self, payload: T)
    where
        T: Into<Value> + Send + 'static,
    {
        self.complete(Outcome::failure(payload));
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if !self.settled {
            let intent = SettlementIntent::Abandoned {
                promise: self.promise,
            };
            if self.sender.send(intent).is_err() {
                trace!(promise = %self.promise, "event loop gone, abandonment dropped");
            }
        }
    }
}

impl std::fmt::Debug for Completer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Completer({})", self.promise)
    }
}

fn abandoned_error() -> Value {
    JsError::new(
        ErrorKind::InternalError,
        "background work was abandoned before settling",
    )
    .into()
}

impl EventLoop {
    /// Creates a pending promise together with the [`Completer`] that
    /// settles it from any thread.
    ///
    /// The loop keeps the promise alive until the completer reports back.
    pub fn completer(&self) -> (Promise, Completer) {
        let promise = self.new_promise();
        self.inner
            .inflight
            .borrow_mut()
            .insert(promise.id(), promise.clone());
        let completer = Completer {
            promise: promise.id(),
            sender: self.inner.intent_tx.clone(),
            settled: false,
        };
        (promise, completer)
    }

    /// Runs `work` on a new worker thread and returns the promise its
    /// outcome settles.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_runtime::{EventLoop, Outcome};
    /// use core_types::Value;
    ///
    /// let event_loop = EventLoop::new();
    /// let promise = event_loop.spawn_blocking(|| Outcome::Success(6 * 7)).unwrap();
    /// event_loop.run_until_done().unwrap();
    /// assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::Smi(42)));
    /// ```
    pub fn spawn_blocking<F, T>(&self, work: F) -> RuntimeResult<Promise>
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Into<Value> + Send + 'static,
    {
        let (promise, completer) = self.completer();
        self.inner.workers.borrow_mut().insert(promise.id());
        let spawned = std::thread::Builder::new()
            .name(self.inner.config.worker_thread_name.clone())
            .spawn(move || completer.complete(work()));
        if let Err(err) = spawned {
            self.inner.inflight.borrow_mut().remove(&promise.id());
            self.inner.workers.borrow_mut().remove(&promise.id());
            return Err(RuntimeError::Spawn(err));
        }
        Ok(promise)
    }

    /// Number of promises waiting on background work.
    pub fn pending_background(&self) -> usize {
        self.inner.inflight.borrow().len()
    }

    /// Number of [`spawn_blocking`](EventLoop::spawn_blocking) workers that
    /// have not reported back yet.
    pub fn pending_workers(&self) -> usize {
        self.inner.workers.borrow().len()
    }

    /// Moves every posted intent into the microtask queue without blocking.
    pub(crate) fn deliver_background_intents(&self) -> usize {
        let mut delivered = 0;
        while let Ok(intent) = self.inner.intent_rx.try_recv() {
            self.enqueue_settlement(intent);
            delivered += 1;
        }
        delivered
    }

    /// Parks until one intent arrives, then queues it.
    ///
    /// Only called while a spawned worker is outstanding: each worker owns
    /// its completer and posts exactly once, on completion or on unwind.
    pub(crate) fn wait_for_background(&self) {
        if let Ok(intent) = self.inner.intent_rx.recv() {
            self.enqueue_settlement(intent);
        }
    }

    fn enqueue_settlement(&self, intent: SettlementIntent) {
        let weak = self.downgrade();
        self.enqueue_microtask(MicroTask::new(move || match weak.upgrade() {
            Some(event_loop) => event_loop.apply_settlement(intent),
            None => Ok(()),
        }));
    }

    fn apply_settlement(&self, intent: SettlementIntent) -> RuntimeResult<()> {
        let (id, outcome) = match intent {
            SettlementIntent::Settle { promise, produce } => (promise, produce()),
            SettlementIntent::Abandoned { promise } => (promise, Outcome::failure(abandoned_error())),
        };
        self.inner.workers.borrow_mut().remove(&id);
        let promise = self.inner.inflight.borrow_mut().remove(&id);
        let Some(promise) = promise else {
            trace!(promise = %id, "settlement for a promise no longer in flight");
            return Ok(());
        };
        debug!(promise = %id, success = outcome.is_success(), "background settlement delivered");
        match outcome {
            Outcome::Success(value) => self.resolve(&promise, value),
            Outcome::Failure(signal) => self.reject(&promise, signal.into_payload()),
        }
    }
}
