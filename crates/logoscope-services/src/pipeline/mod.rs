//! Multi-stage analysis pipeline
//!
//! Stage A describes the image, Stage B extracts the report sections the tier pays for
//! (bounded concurrency), Stage C assembles and scores the report.

mod assembly;
mod claude;
mod provider;
mod runner;
pub mod schema;
mod stages;

pub use assembly::{assemble, AssemblyFailure};
pub use claude::ClaudeProvider;
pub use provider::ContentProvider;
pub use runner::{PipelineEvent, PipelineRun, PipelineRunner, PipelineSettings};
pub use stages::{SectionOutput, StageSettings};
