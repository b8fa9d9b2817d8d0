//! In-memory collaborators and fixtures for service and API tests.

mod fakes;
mod fixtures;
mod storage;

pub use fakes::{FakeGateway, RecordingNotifier, ScriptedProvider};
pub use fixtures::{
    analysis_fixture, completed_analysis, png_bytes, sample_report, section_json,
    staged_submission, tokens,
};
pub use logoscope_db::test_helpers::InMemoryStore;
pub use storage::MemoryStorage;
