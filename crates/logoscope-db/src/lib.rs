//! Logoscope persistence layer
//!
//! Store traits describing every state transition the pipeline needs, their Postgres
//! implementations, and (behind `test-helpers`) an in-memory implementation.

pub mod db;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use db::*;
