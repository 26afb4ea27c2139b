//! Promise storage and reachability.
//!
//! Records are kept in a generational arena and addressed by [`PromiseId`].
//! Everything outside the arena (script bindings, reactions waiting on a
//! derived promise, queued microtasks, resolving functions) refers to a record
//! through a [`Promise`] handle. All handles of one record share a single
//! root; when the last one is dropped the id is queued for release and the
//! next [`EventLoop::collect_garbage`](crate::EventLoop::collect_garbage)
//! frees the record.

use crate::promise::{PromiseId, PromiseRecord};
use core_types::Value;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Ids whose last handle was dropped, waiting for collection.
pub(crate) type ReleaseQueue = Rc<RefCell<Vec<PromiseId>>>;

struct Slot {
    generation: u32,
    record: Option<PromiseRecord>,
}

/// Generational arena of promise records.
#[derive(Default)]
pub struct PromiseHeap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl PromiseHeap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record and returns its id.
    pub fn allocate(&mut self, record: PromiseRecord) -> PromiseId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return PromiseId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        PromiseId {
            index,
            generation: 0,
        }
    }

    /// Looks up a live record.
    pub fn get(&self, id: PromiseId) -> Option<&PromiseRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    /// Looks up a live record for mutation.
    pub fn get_mut(&mut self, id: PromiseId) -> Option<&mut PromiseRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    /// Removes a record, invalidating `id`.
    pub fn remove(&mut self, id: PromiseId) -> Option<PromiseRecord> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(record)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if no records are live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl fmt::Debug for PromiseHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseHeap")
            .field("live", &self.live)
            .field("capacity", &self.slots.len())
            .finish()
    }
}

struct PromiseRoot {
    id: PromiseId,
    releases: Weak<RefCell<Vec<PromiseId>>>,
    // Weak so the script-visible object does not keep its own root alive.
    object: RefCell<Option<Weak<RefCell<dyn Any>>>>,
}

impl Drop for PromiseRoot {
    fn drop(&mut self) {
        if let Some(releases) = self.releases.upgrade() {
            releases.borrow_mut().push(self.id);
        }
    }
}

/// A handle on a promise record owned by an [`EventLoop`](crate::EventLoop).
///
/// Handles are cheap to clone. The record stays alive as long as any handle
/// does, including the handle embedded in the script value returned by
/// [`Promise::to_value`].
#[derive(Clone)]
pub struct Promise {
    root: Rc<PromiseRoot>,
}

impl Promise {
    pub(crate) fn new(id: PromiseId, releases: &ReleaseQueue) -> Self {
        Self {
            root: Rc::new(PromiseRoot {
                id,
                releases: Rc::downgrade(releases),
                object: RefCell::new(None),
            }),
        }
    }

    /// The id of the underlying record.
    pub fn id(&self) -> PromiseId {
        self.root.id
    }

    /// Returns the script value for this promise.
    ///
    /// While a returned value is alive, further calls return the same
    /// object, so promise values compare equal by identity.
    pub fn to_value(&self) -> Value {
        let mut cached = self.root.object.borrow_mut();
        if let Some(object) = cached.as_ref().and_then(Weak::upgrade) {
            return Value::NativeObject(object);
        }
        let object: Rc<RefCell<dyn Any>> = Rc::new(RefCell::new(self.clone()));
        *cached = Some(Rc::downgrade(&object));
        Value::NativeObject(object)
    }

    /// Extracts the promise handle from a script value, if it is one.
    pub fn from_value(value: &Value) -> Option<Promise> {
        match value {
            Value::NativeObject(object) => object.try_borrow().ok()?.downcast_ref::<Promise>().cloned(),
            _ => None,
        }
    }

    /// Returns true if both handles refer to the same record.
    pub fn same_promise(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.root, &other.root)
    }

    pub(crate) fn belongs_to(&self, releases: &ReleaseQueue) -> bool {
        std::ptr::eq(self.root.releases.as_ptr(), Rc::as_ptr(releases))
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Promise({})", self.root.id)
    }
}
