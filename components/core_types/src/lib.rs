//! Core JavaScript value types and error handling.
//!
//! This crate provides the value model the async runtime is written against:
//! the [`Value`] enum, the two object capabilities it needs from the engine
//! (calling a [`Function`], reading a member of an [`Object`]), and engine
//! errors.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`Function`] - Callable with a receiver and arguments
//! - [`Object`] - Plain property bag, with optional getters
//! - [`JsError`] / [`ErrorKind`] - JavaScript errors
//! - [`Completion`] - Return value or thrown payload of a call
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, Function, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let thrower = Function::new("thrower", |_, _| {
//!     Err(JsError::new(ErrorKind::TypeError, "undefined is not a function").into())
//! });
//! assert!(thrower.call(Value::Undefined, vec![]).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod object;
mod value;

pub use error::{ErrorKind, JsError};
pub use object::{Completion, Function, Object};
pub use value::Value;
