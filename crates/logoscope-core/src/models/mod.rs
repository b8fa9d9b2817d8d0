//! Domain models shared across crates.

pub mod account;
pub mod analysis;
pub mod curation;
pub mod report;
pub mod staging;
pub mod tier;

pub use account::*;
pub use analysis::*;
pub use curation::*;
pub use report::*;
pub use staging::*;
pub use tier::*;
