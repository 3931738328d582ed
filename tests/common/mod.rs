//! Common test utilities for batch-zip integration tests

#[allow(dead_code)]
pub mod fixtures;

pub use fixtures::*;
