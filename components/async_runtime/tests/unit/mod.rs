//! Integration test runner for unit tests
//! This file makes cargo test discover the unit test modules

mod common;

mod background_test;
mod event_loop_test;
mod properties_test;
