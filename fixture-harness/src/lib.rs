//! # Fixture Harness
//!
//! A parallel correctness and memory-safety harness for a compiled program
//! that reads stdin and writes stdout.
//!
//! ## Architecture
//!
//! The pipeline runs in one direction:
//! - `discovery`: fixture enumeration and precondition checks
//! - `scheduler`: slice partitioning and worker dispatch
//! - `worker`: sequential processing of one slice
//! - `execution`: child process invocation, optionally under a memory detector
//! - `normalize`: delimiter-token canonicalization of output text
//! - `comparison`: pass/fail oracle for one fixture
//! - `sampling`: per-fixture detector selection
//! - `reporting`: aggregation, console report and the persisted summary
//! - `config`: command line and programmatic configuration
//! - `harness`: the orchestrator tying the stages together

use std::path::PathBuf;

pub mod comparison;
pub mod config;
pub mod discovery;
pub mod execution;
pub mod harness;
pub mod normalize;
pub mod reporting;
pub mod sampling;
pub mod scheduler;
pub mod worker;

pub use comparison::{OutputComparator, OutputComparison, Verdict};
pub use config::HarnessConfig;
pub use discovery::{CorpusLoader, Fixture};
pub use execution::{DetectorCommand, ExecutionFailure, ExecutionMode, ExecutionResult, TargetExecutor};
pub use harness::{FixtureHarness, HarnessBuilder};
pub use normalize::OutputNormalizer;
pub use reporting::{DetectorReport, FixtureOutcome, RunSummary, WorkerReport};
pub use sampling::DetectorSampler;
pub use scheduler::{Scheduler, SliceRunner};
pub use worker::{FixtureStep, FixtureWorker};

/// Current version of the harness
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Harness errors
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fixture discovery failed: {0}")]
    Discovery(String),

    #[error("Missing reference output files for {} fixture(s)", .0.len())]
    MissingReferences(Vec<PathBuf>),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}
