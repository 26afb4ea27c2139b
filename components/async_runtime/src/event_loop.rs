//! Event loop implementation.
//!
//! The event loop owns the task and microtask queues, the promise heap and
//! the host collaborators (invocation bridge, rejection tracker). It is the
//! single logical thread on which every promise record is mutated.
//!
//! Each turn of the loop:
//! 1. Delivers settlement intents posted by background work
//! 2. Takes the oldest task from the task queue and executes it
//! 3. Performs a checkpoint: drains all microtasks, reports unhandled
//!    rejections, frees unreachable promise records
//! 4. Repeats while tasks remain, or while a background worker has yet to
//!    report

use crate::background::SettlementIntent;
use crate::bridge::{InvocationBridge, NativeBridge};
use crate::chaining::Intrinsics;
use crate::config::RuntimeConfig;
use crate::diagnostics::{LoggingTracker, RejectionTracker};
use crate::error::{RuntimeError, RuntimeResult};
use crate::heap::{Promise, PromiseHeap, ReleaseQueue};
use crate::promise::{PromiseId, PromiseRecord, PromiseState};
use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
use core_types::Value;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

pub(crate) struct Inner {
    pub(crate) config: RuntimeConfig,
    pub(crate) bridge: Box<dyn InvocationBridge>,
    pub(crate) tracker: Rc<dyn RejectionTracker>,
    pub(crate) heap: RefCell<PromiseHeap>,
    pub(crate) releases: ReleaseQueue,
    pub(crate) pending_rejections: RefCell<Vec<PromiseId>>,
    pub(crate) inflight: RefCell<HashMap<PromiseId, Promise>>,
    pub(crate) workers: RefCell<HashSet<PromiseId>>,
    pub(crate) intent_tx: Sender<SettlementIntent>,
    pub(crate) intent_rx: Receiver<SettlementIntent>,
    pub(crate) intrinsics: OnceCell<Intrinsics>,
    task_queue: RefCell<TaskQueue>,
    microtask_queue: RefCell<MicrotaskQueue>,
    draining: Cell<bool>,
}

/// The JavaScript event loop.
///
/// `EventLoop` is a cheap-clone handle; clones share the same loop. It is
/// deliberately `!Send`: background threads reach it only through
/// [`Completer`](crate::Completer).
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, PromiseState};
/// use core_types::{Function, Value};
///
/// let event_loop = EventLoop::new();
/// let promise = event_loop.promise_resolve(Value::Smi(1)).unwrap();
/// let add_one = Function::new("addOne", |_, args| match args.first() {
///     Some(Value::Smi(n)) => Ok(Value::Smi(n + 1)),
///     _ => Ok(Value::Undefined),
/// });
/// let derived = event_loop.then(&promise, Some(add_one.into()), None).unwrap();
///
/// // Reactions never run inline.
/// assert_eq!(event_loop.state(&derived).unwrap(), PromiseState::Pending);
///
/// event_loop.run_until_done().unwrap();
/// assert_eq!(event_loop.result(&derived).unwrap(), Some(Value::Smi(2)));
/// ```
#[derive(Clone)]
pub struct EventLoop {
    pub(crate) inner: Rc<Inner>,
}

/// A non-owning reference to an [`EventLoop`].
///
/// Intrinsic functions and queued microtasks hold one of these, so a loop
/// that is dropped with work still queued is freed rather than leaked.
#[derive(Clone)]
pub struct WeakEventLoop {
    inner: Weak<Inner>,
}

impl WeakEventLoop {
    /// Returns the loop if it is still alive.
    pub fn upgrade(&self) -> Option<EventLoop> {
        self.inner.upgrade().map(|inner| EventLoop { inner })
    }
}

/// Builder for an [`EventLoop`] with non-default collaborators.
pub struct EventLoopBuilder {
    config: RuntimeConfig,
    bridge: Box<dyn InvocationBridge>,
    tracker: Rc<dyn RejectionTracker>,
}

impl EventLoopBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the bridge used to call script values.
    pub fn bridge(mut self, bridge: impl InvocationBridge + 'static) -> Self {
        self.bridge = Box::new(bridge);
        self
    }

    /// Sets the receiver of unhandled-rejection events.
    pub fn tracker(mut self, tracker: Rc<dyn RejectionTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Creates the event loop.
    pub fn build(self) -> EventLoop {
        let (intent_tx, intent_rx) = unbounded();
        EventLoop {
            inner: Rc::new(Inner {
                config: self.config,
                bridge: self.bridge,
                tracker: self.tracker,
                heap: RefCell::new(PromiseHeap::new()),
                releases: Rc::new(RefCell::new(Vec::new())),
                pending_rejections: RefCell::new(Vec::new()),
                inflight: RefCell::new(HashMap::new()),
                workers: RefCell::new(HashSet::new()),
                intent_tx,
                intent_rx,
                intrinsics: OnceCell::new(),
                task_queue: RefCell::new(TaskQueue::new()),
                microtask_queue: RefCell::new(MicrotaskQueue::new()),
                draining: Cell::new(false),
            }),
        }
    }
}

impl EventLoop {
    /// Creates an event loop with the default configuration, the
    /// [`NativeBridge`] and the [`LoggingTracker`].
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an event loop with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Starts building an event loop.
    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder {
            config: RuntimeConfig::default(),
            bridge: Box::new(NativeBridge),
            tracker: Rc::new(LoggingTracker),
        }
    }

    /// Returns a weak handle on this loop.
    pub fn downgrade(&self) -> WeakEventLoop {
        WeakEventLoop {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// The loop's configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&self, task: Task) {
        self.inner.task_queue.borrow_mut().enqueue(task);
    }

    /// Adds a microtask to the microtask queue.
    ///
    /// The microtask runs at the next checkpoint, after every microtask
    /// enqueued before it.
    pub fn enqueue_microtask(&self, microtask: MicroTask) {
        self.inner.microtask_queue.borrow_mut().enqueue(microtask);
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.inner.task_queue.borrow().is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.inner.microtask_queue.borrow().is_empty()
    }

    /// Number of microtasks waiting to run.
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtask_queue.borrow().len()
    }

    /// Runs all microtasks in the queue until empty.
    ///
    /// Microtasks enqueued while draining also run before this returns. A
    /// call made from inside a running microtask is a no-op: microtasks never
    /// interleave. An `Err` from a microtask stops the drain and is returned;
    /// the remaining microtasks stay queued.
    pub fn run_all_microtasks(&self) -> RuntimeResult<()> {
        if self.inner.draining.replace(true) {
            return Ok(());
        }
        let result = self.drain_microtasks();
        self.inner.draining.set(false);
        result
    }

    fn drain_microtasks(&self) -> RuntimeResult<()> {
        loop {
            let next = self.inner.microtask_queue.borrow_mut().dequeue();
            match next {
                Some(microtask) => microtask.run()?,
                None => return Ok(()),
            }
        }
    }

    /// Drains microtasks, then reports unhandled rejections and (if
    /// configured) collects unreachable promises.
    ///
    /// This is the boundary between two macrotasks.
    pub fn perform_checkpoint(&self) -> RuntimeResult<()> {
        self.deliver_background_intents();
        self.run_all_microtasks()?;
        self.report_unhandled_rejections();
        if self.inner.config.collect_at_checkpoint {
            self.collect_garbage();
        }
        Ok(())
    }

    /// Processes one complete cycle: one task followed by a checkpoint.
    pub fn process_one_cycle(&self) -> RuntimeResult<()> {
        self.deliver_background_intents();
        let task = self.inner.task_queue.borrow_mut().dequeue();
        if let Some(task) = task {
            task.run()?;
        }
        self.perform_checkpoint()
    }

    /// Runs tasks and checkpoints until no task or microtask is runnable.
    ///
    /// Settlements already posted by background work are picked up, but this
    /// never waits for more: promises whose completers are still out stay
    /// pending.
    pub fn run_until_idle(&self) -> RuntimeResult<()> {
        loop {
            self.process_one_cycle()?;
            if self.is_task_queue_empty() && self.is_microtask_queue_empty() {
                return Ok(());
            }
        }
    }

    /// Runs the event loop until no task, microtask or worker started by
    /// [`spawn_blocking`](EventLoop::spawn_blocking) is left.
    ///
    /// When only such workers remain, the thread parks until one posts its
    /// settlement. Completers handed out by [`completer`](EventLoop::completer)
    /// are never waited for; the loop returns with their promises pending.
    pub fn run_until_done(&self) -> RuntimeResult<()> {
        loop {
            self.run_until_idle()?;
            if self.inner.workers.borrow().is_empty() {
                return Ok(());
            }
            self.wait_for_background();
        }
    }

    /// Creates a pending promise.
    pub fn new_promise(&self) -> Promise {
        let id = self.inner.heap.borrow_mut().allocate(PromiseRecord::new());
        trace!(promise = %id, "promise created");
        Promise::new(id, &self.inner.releases)
    }

    /// Returns the promise handle behind `value` if it is a promise owned by
    /// this loop.
    pub fn as_promise(&self, value: &Value) -> Option<Promise> {
        Promise::from_value(value).filter(|promise| promise.belongs_to(&self.inner.releases))
    }

    /// The current state of `promise`.
    pub fn state(&self, promise: &Promise) -> RuntimeResult<PromiseState> {
        self.with_record(promise, |record| record.state)
    }

    /// The settlement value of `promise`, or `None` while it is pending.
    pub fn result(&self, promise: &Promise) -> RuntimeResult<Option<Value>> {
        self.with_record(promise, |record| record.result().cloned())
    }

    /// Returns true once any reaction has been attached to `promise`.
    pub fn is_handled(&self, promise: &Promise) -> RuntimeResult<bool> {
        self.with_record(promise, |record| record.is_handled)
    }

    /// Number of promise records currently alive.
    pub fn live_promises(&self) -> usize {
        self.inner.heap.borrow().len()
    }

    /// Frees the records of promises that are no longer referenced.
    ///
    /// A collected record that was rejected without a handler and not yet
    /// reported is reported now. Returns the number of records freed.
    pub fn collect_garbage(&self) -> usize {
        let mut freed = 0;
        loop {
            let released = std::mem::take(&mut *self.inner.releases.borrow_mut());
            if released.is_empty() {
                break;
            }
            for id in released {
                let record = self.inner.heap.borrow_mut().remove(id);
                let Some(mut record) = record else {
                    continue;
                };
                freed += 1;
                if self.inner.config.track_unhandled_rejections && record.awaits_rejection_report() {
                    record.rejection_reported = true;
                    let reason = record.result().cloned().unwrap_or(Value::Undefined);
                    self.inner.tracker.unhandled_rejection(id, &reason);
                }
                // Dropping the record may release the promises its reactions
                // were going to settle; the outer loop picks those up.
                drop(record);
            }
        }
        if freed > 0 {
            debug!(freed, live = self.live_promises(), "collected promise records");
        }
        freed
    }

    pub(crate) fn with_record<R>(
        &self,
        promise: &Promise,
        f: impl FnOnce(&mut PromiseRecord) -> R,
    ) -> RuntimeResult<R> {
        if !promise.belongs_to(&self.inner.releases) {
            return Err(RuntimeError::ForeignPromise(promise.id()));
        }
        let mut heap = self.inner.heap.borrow_mut();
        let record = heap
            .get_mut(promise.id())
            .ok_or(RuntimeError::Collected(promise.id()))?;
        Ok(f(record))
    }

    fn report_unhandled_rejections(&self) {
        let pending = std::mem::take(&mut *self.inner.pending_rejections.borrow_mut());
        if pending.is_empty() || !self.inner.config.track_unhandled_rejections {
            return;
        }
        let mut reports = Vec::new();
        {
            let mut heap = self.inner.heap.borrow_mut();
            for id in pending {
                let Some(record) = heap.get_mut(id) else {
                    continue;
                };
                if record.awaits_rejection_report() {
                    record.rejection_reported = true;
                    reports.push((id, record.result().cloned().unwrap_or(Value::Undefined)));
                }
            }
        }
        for (id, reason) in reports {
            self.inner.tracker.unhandled_rejection(id, &reason);
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("tasks", &self.inner.task_queue.borrow().len())
            .field("microtasks", &self.inner.microtask_queue.borrow().len())
            .field("heap", &*self.inner.heap.borrow())
            .field("inflight", &self.inner.inflight.borrow().len())
            .field("workers", &self.inner.workers.borrow().len())
            .finish()
    }
}
