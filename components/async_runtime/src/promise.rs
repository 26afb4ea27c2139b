//! Promise records and the settlement state machine.
//!
//! A [`PromiseRecord`] holds the state of one promise. Records live in the
//! [`PromiseHeap`](crate::heap::PromiseHeap) and are only ever touched on the
//! event loop thread, so the state machine itself takes no locks. Scheduling
//! the detached reactions is the event loop's job; this module only decides
//! *which* reactions a settlement releases.

use crate::heap::Promise;
use core_types::Value;
use std::fmt;

/// Stable identifier of a promise record.
///
/// The generation makes ids of collected records unusable: a slot reused by a
/// newer record gets a new generation, so a stale id never aliases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromiseId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise#{}.{}", self.index, self.generation)
    }
}

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been fulfilled with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

/// Which side of a settlement a reaction listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    /// Runs when the promise fulfills.
    Fulfill,
    /// Runs when the promise rejects.
    Reject,
}

/// One side of a `then` registration.
///
/// `then` creates a fulfill-side and a reject-side reaction that share the
/// same derived promise; only the side matching the eventual state runs.
#[derive(Debug)]
pub struct PromiseReaction {
    /// Side this reaction listens to
    pub kind: ReactionKind,
    /// Handler to invoke, or `None` to pass the settlement through
    pub handler: Option<Value>,
    /// The promise settled by this reaction's outcome
    pub derived: Promise,
}

impl PromiseReaction {
    /// Creates a reaction for one side of a `then` call.
    pub fn new(kind: ReactionKind, handler: Option<Value>, derived: Promise) -> Self {
        Self {
            kind,
            handler,
            derived,
        }
    }
}

/// Reactions released by a settlement.
///
/// `fire` must be scheduled; `discarded` is the other side's list, which can
/// never run and is returned only so the caller decides where it is dropped.
#[derive(Debug)]
pub struct Settlement {
    /// Reactions to schedule, in registration order
    pub fire: Vec<PromiseReaction>,
    /// Reactions for the side that did not happen
    pub discarded: Vec<PromiseReaction>,
}

/// The state of one promise.
///
/// # Examples
///
/// ```
/// use async_runtime::{PromiseRecord, PromiseState};
/// use core_types::Value;
///
/// let mut record = PromiseRecord::new();
/// assert!(record.settle(PromiseState::Fulfilled, Value::Smi(42)).is_some());
/// assert_eq!(record.state, PromiseState::Fulfilled);
/// assert_eq!(record.result(), Some(&Value::Smi(42)));
///
/// // Settlement is irreversible.
/// assert!(record.settle(PromiseState::Rejected, Value::Null).is_none());
/// assert_eq!(record.state, PromiseState::Fulfilled);
/// ```
#[derive(Debug)]
pub struct PromiseRecord {
    /// The current state of the Promise
    pub state: PromiseState,
    value: Option<Value>,
    /// Reactions waiting for fulfillment
    pub fulfill_reactions: Vec<PromiseReaction>,
    /// Reactions waiting for rejection
    pub reject_reactions: Vec<PromiseReaction>,
    /// Set the first time any reaction is attached
    pub is_handled: bool,
    /// Set once an external resolve or reject has been accepted
    pub already_resolved: bool,
    /// Set once the unhandled-rejection diagnostic has fired
    pub rejection_reported: bool,
}

impl PromiseRecord {
    /// Creates a pending record with no reactions.
    pub fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            value: None,
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            is_handled: false,
            already_resolved: false,
            rejection_reported: false,
        }
    }

    /// The settlement value, or `None` while pending.
    pub fn result(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns true while the record has not settled.
    pub fn is_pending(&self) -> bool {
        self.state == PromiseState::Pending
    }

    /// Transitions a pending record to `state` with `value`.
    ///
    /// Returns `None` (and changes nothing) if the record already settled or
    /// if `state` is `Pending`. Otherwise both reaction lists are detached
    /// and returned, split by whether they should fire.
    pub fn settle(&mut self, state: PromiseState, value: Value) -> Option<Settlement> {
        if !self.is_pending() || state == PromiseState::Pending {
            return None;
        }
        self.state = state;
        self.value = Some(value);
        let fulfill = std::mem::take(&mut self.fulfill_reactions);
        let reject = std::mem::take(&mut self.reject_reactions);
        Some(match state {
            PromiseState::Fulfilled => Settlement {
                fire: fulfill,
                discarded: reject,
            },
            _ => Settlement {
                fire: reject,
                discarded: fulfill,
            },
        })
    }

    /// Returns true if this record should produce an unhandled-rejection
    /// diagnostic that has not been produced yet.
    pub fn awaits_rejection_report(&self) -> bool {
        self.state == PromiseState::Rejected && !self.is_handled && !self.rejection_reported
    }
}

impl Default for PromiseRecord {
    fn default() -> Self {
        Self::new()
    }
}
