//! Configuration and settings for the harness

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::HarnessError;

/// Detector arguments that make every leak and error class fail the wrapped run
pub const DEFAULT_DETECTOR_ARGS: &str =
    "--leak-check=full --show-leak-kinds=all --errors-for-leak-kinds=all --error-exitcode=1";

/// Parse a detector sampling rate, rejecting values outside [0, 1]
fn parse_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value.parse().map_err(|_| format!("`{}` is not a number", value))?;

    if !(0.0..=1.0).contains(&rate) {
        return Err("Detector rate must be between 0 and 1".to_string());
    }

    Ok(rate)
}

/// Configuration for one harness run
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "fixture-harness")]
#[command(about = "Run stdin fixtures against a program, with optional memory checking")]
#[command(version)]
pub struct HarnessConfig {
    /// Path to the program under test
    #[arg(short, long, default_value = "./a.out")]
    pub executable: PathBuf,

    /// Directory containing paired input/reference fixtures
    #[arg(short, long, default_value = "tests")]
    pub fixtures: PathBuf,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Directory created for run artifacts
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Where the JSON run summary is written
    #[arg(long, default_value = "test_results.json")]
    pub results: PathBuf,

    /// Run the memory detector on all fixtures, or on the given fraction of them
    #[arg(
        long,
        visible_alias = "valgrind",
        value_name = "RATE",
        num_args = 0..=1,
        default_value_t = 0.0,
        default_missing_value = "1.0",
        value_parser = parse_rate
    )]
    pub memcheck: f64,

    /// Memory-error detector command
    #[arg(long, default_value = "valgrind")]
    pub detector: String,

    /// Arguments passed to the detector before the executable (shell quoted)
    #[arg(long, default_value = DEFAULT_DETECTOR_ARGS, allow_hyphen_values = true)]
    pub detector_args: String,

    /// Timeout for each child process in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Seed for detector sampling (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// File extension of fixture inputs
    #[arg(long, default_value = "in")]
    pub input_suffix: String,

    /// File extension of reference outputs
    #[arg(long, default_value = "out")]
    pub output_suffix: String,

    /// Token group delimiter used by output normalization
    #[arg(long, default_value_t = '_')]
    pub delimiter: char,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable quiet mode (no progress bar)
    #[arg(short, long)]
    pub quiet: bool,
}

impl HarnessConfig {
    /// Create a configuration with the command line defaults
    pub fn new(executable: PathBuf, fixtures: PathBuf) -> Self {
        Self {
            executable,
            fixtures,
            jobs: 0,
            output_dir: PathBuf::from("output"),
            results: PathBuf::from("test_results.json"),
            memcheck: 0.0,
            detector: "valgrind".to_string(),
            detector_args: DEFAULT_DETECTOR_ARGS.to_string(),
            timeout: 60,
            seed: None,
            input_suffix: "in".to_string(),
            output_suffix: "out".to_string(),
            delimiter: '_',
            verbose: false,
            quiet: false,
        }
    }

    /// Get the number of workers to use
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1)
        } else {
            self.jobs
        }
    }

    /// Per-child deadline
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Split the detector argument string into an argument vector
    pub fn detector_argv(&self) -> Result<Vec<String>, HarnessError> {
        shlex::split(&self.detector_args).ok_or_else(|| {
            HarnessError::Config(format!("Cannot parse detector arguments: {}", self.detector_args))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), HarnessError> {
        if !self.executable.exists() {
            return Err(HarnessError::Config(format!(
                "{} not found. Please compile the program first.",
                self.executable.display()
            )));
        }

        if !self.fixtures.is_dir() {
            return Err(HarnessError::Config(format!(
                "Fixture directory {} not found.",
                self.fixtures.display()
            )));
        }

        if self.timeout == 0 {
            return Err(HarnessError::Config("Timeout must be greater than 0".to_string()));
        }

        if !(0.0..=1.0).contains(&self.memcheck) {
            return Err(HarnessError::Config(format!(
                "Detector rate must be between 0 and 1, got {}",
                self.memcheck
            )));
        }

        if self.input_suffix.is_empty() || self.input_suffix == self.output_suffix {
            return Err(HarnessError::Config(
                "Input and output suffixes must be non-empty and distinct".to_string(),
            ));
        }

        if self.detector.trim().is_empty() {
            return Err(HarnessError::Config("Detector command is empty".to_string()));
        }

        self.detector_argv()?;

        Ok(())
    }
}
