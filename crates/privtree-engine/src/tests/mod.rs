//! Engine tests against a real in-memory SQLite store.
//!
//! - `common` - Shared fixture and helpers
//! - `resolution` - Cascade, block and cache behaviour
//! - `tree` - Node lifecycle, move and revert
//! - `grants` - Grant editing rules
//! - `scenario` - End-to-end delegation walkthrough
//! - `failures` - Store failure injection with mocks

pub mod common;

mod tree;
