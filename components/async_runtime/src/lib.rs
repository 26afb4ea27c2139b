//! Promise runtime for JavaScript execution.
//!
//! This crate provides the asynchronous core of a JavaScript engine:
//! - Event loop with task and microtask queues
//! - Promise records with a generational heap and reachability-driven release
//! - The promise resolution procedure, including thenable adoption
//! - `then`/`catch` chaining with microtask-scheduled reactions
//! - A bridge that lets background threads settle promises
//! - Unhandled-rejection diagnostics
//!
//! # Overview
//!
//! - [`EventLoop`] - owns every promise record and runs all reactions
//! - [`Promise`] - handle on a promise record; dropping the last handle
//!   releases the record
//! - [`InvocationBridge`] - how the runtime calls script values
//! - [`RejectionTracker`] - where unhandled rejections are reported
//! - [`Completer`] - `Send` handle that settles a promise from another thread
//!
//! # Examples
//!
//! ## Event Loop Usage
//!
//! ```
//! use async_runtime::{EventLoop, Task};
//!
//! let event_loop = EventLoop::new();
//! event_loop.enqueue_task(Task::new(|| Ok(())));
//! event_loop.run_until_done().unwrap();
//! ```
//!
//! ## Promise Usage
//!
//! ```
//! use async_runtime::{EventLoop, PromiseState};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let promise = event_loop.new_promise();
//! event_loop.resolve(&promise, Value::Smi(42)).unwrap();
//! assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Fulfilled);
//! ```
//!
//! ## Background Work
//!
//! ```
//! use async_runtime::{EventLoop, Outcome, PromiseState};
//!
//! let event_loop = EventLoop::new();
//! let promise = event_loop
//!     .spawn_blocking(|| Outcome::<&str>::failure("disk full"))
//!     .unwrap();
//! event_loop.run_until_done().unwrap();
//! assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Rejected);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod bridge;
mod chaining;
pub mod config;
mod constructor;
pub mod diagnostics;
pub mod error;
pub mod event_loop;
pub mod heap;
pub mod promise;
mod resolution;
pub mod task_queue;

// Re-export main types at crate root
pub use background::{Completer, Outcome, RejectionSignal};
pub use bridge::{InvocationBridge, NativeBridge};
pub use config::RuntimeConfig;
pub use diagnostics::{LoggingTracker, RejectionEvent, RejectionLog, RejectionTracker};
pub use error::{RuntimeError, RuntimeResult};
pub use event_loop::{EventLoop, EventLoopBuilder, WeakEventLoop};
pub use heap::{Promise, PromiseHeap};
pub use promise::{PromiseId, PromiseReaction, PromiseRecord, PromiseState, ReactionKind, Settlement};
pub use resolution::cycle_error;
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
