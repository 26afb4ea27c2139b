//! Unhandled rejection diagnostics.
//!
//! A rejected promise that has no reject handler when the microtask queue
//! drains (or when its record is collected) is reported once through the
//! event loop's [`RejectionTracker`]. Reports are advisory: they never change
//! program flow.

use crate::promise::PromiseId;
use core_types::Value;
use std::cell::RefCell;

/// Receives unhandled-rejection events.
pub trait RejectionTracker {
    /// A rejected promise ended a checkpoint, or became unreachable, with no
    /// handler attached. Fired at most once per promise.
    fn unhandled_rejection(&self, promise: PromiseId, reason: &Value);

    /// A handler was attached to a promise previously reported as unhandled.
    fn rejection_handled(&self, _promise: PromiseId) {}
}

/// Default tracker: emits a `tracing` warning per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTracker;

impl RejectionTracker for LoggingTracker {
    fn unhandled_rejection(&self, promise: PromiseId, reason: &Value) {
        tracing::warn!(promise = %promise, reason = %reason, "unhandled promise rejection");
    }

    fn rejection_handled(&self, promise: PromiseId) {
        tracing::info!(promise = %promise, "promise rejection handled late");
    }
}

/// A diagnostic event recorded by [`RejectionLog`].
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionEvent {
    /// See [`RejectionTracker::unhandled_rejection`]
    Unhandled(PromiseId, Value),
    /// See [`RejectionTracker::rejection_handled`]
    Handled(PromiseId),
}

/// Tracker that records every event, for hosts that surface them later
/// (and for tests).
#[derive(Debug, Default)]
pub struct RejectionLog {
    events: RefCell<Vec<RejectionEvent>>,
}

impl RejectionLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far, in order.
    pub fn events(&self) -> Vec<RejectionEvent> {
        self.events.borrow().clone()
    }

    /// Reasons of the unhandled events so far.
    pub fn unhandled(&self) -> Vec<Value> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                RejectionEvent::Unhandled(_, reason) => Some(reason.clone()),
                RejectionEvent::Handled(_) => None,
            })
            .collect()
    }
}

impl RejectionTracker for RejectionLog {
    fn unhandled_rejection(&self, promise: PromiseId, reason: &Value) {
        self.events
            .borrow_mut()
            .push(RejectionEvent::Unhandled(promise, reason.clone()));
    }

    fn rejection_handled(&self, promise: PromiseId) {
        self.events.borrow_mut().push(RejectionEvent::Handled(promise));
    }
}
