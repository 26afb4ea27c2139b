//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError};

#[test]
fn error_kinds_are_distinct() {
    assert_ne!(ErrorKind::TypeError, ErrorKind::RangeError);
    assert_eq!(ErrorKind::InternalError, ErrorKind::InternalError);
}

#[test]
fn js_error_is_std_error() {
    fn takes_error(_: &dyn std::error::Error) {}
    let error = JsError::new(ErrorKind::TypeError, "Chaining cycle detected for promise");
    takes_error(&error);
    assert_eq!(
        error.to_string(),
        "TypeError: Chaining cycle detected for promise"
    );
}

#[test]
fn js_error_equality_compares_kind_and_message() {
    let a = JsError::new(ErrorKind::TypeError, "x");
    assert_eq!(a, JsError::new(ErrorKind::TypeError, "x"));
    assert_ne!(a, JsError::new(ErrorKind::RangeError, "x"));
    assert_ne!(a, JsError::new(ErrorKind::TypeError, "y"));
}
