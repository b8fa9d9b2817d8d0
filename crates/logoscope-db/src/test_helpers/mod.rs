//! Test helpers for service and API tests
//!
//! Provides an in-memory implementation of every store trait so the higher crates can
//! be exercised without a database. The conditional updates mirror the SQL in the
//! repositories statement for statement.

pub mod memory;

pub use memory::*;
