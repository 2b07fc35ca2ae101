//! Per-report enrichment pipeline.
//!
//! - `state`: stages, run states and the transition function
//! - `stages`: the [`Stages`] trait and its live implementation
//! - `orchestrator`: runs the stages and publishes results to the platform
//! - `excerpt`: description text and attachment filenames

pub mod excerpt;
pub mod orchestrator;
pub mod stages;
pub mod state;

pub use excerpt::{attachment_filename, build_excerpt, TRUNCATION_MARKER};
pub use orchestrator::{MarkConfig, Orchestrator, ReportOutcome, ReportProcessor, PROCESSED_CAPACITY};
pub use stages::{LiveStages, Stages};
pub use state::{transition, Event, PipelineState, Stage, StateTracker, TransitionError};
