//! Integration test runner for contract tests
