//! Database repositories for the data access layer
//!
//! Each repository owns one table and implements the matching store trait from
//! `traits`. Services only ever see the traits, so tests can swap in the in-memory
//! store.

pub mod account;
pub mod analysis;
pub mod curation;
mod rows;
pub mod staging;
pub mod traits;
pub mod transaction;

pub use account::AccountRepository;
pub use analysis::AnalysisRepository;
pub use curation::CurationRepository;
pub use staging::StagingRepository;
pub use traits::{
    AccountStore, AnalysisStore, CurationStore, FreeSlotReservation, RunLease, StagingStore,
};
pub use transaction::with_transaction;
