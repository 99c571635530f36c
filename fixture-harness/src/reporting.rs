//! Result aggregation, console reporting and the persisted run summary

use console::style;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::comparison::{OutputComparison, Verdict};
use crate::execution::{ExecutionFailure, ExecutionMode, ExecutionResult};
use crate::HarnessError;

/// What the memory detector had to say about a fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectorReport {
    NotRun,
    Ran { exit_code: i32, output: String },
}

impl DetectorReport {
    pub fn from_execution(result: &ExecutionResult) -> Self {
        match result.mode {
            ExecutionMode::Detector => {
                Self::Ran { exit_code: result.exit_code, output: result.stderr.clone() }
            }
            ExecutionMode::Plain => Self::NotRun,
        }
    }
}

impl fmt::Display for DetectorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRun => write!(f, "Detector not run"),
            Self::Ran { output, .. } => write!(f, "{}", output),
        }
    }
}

/// Raw payload kept for a failing fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDiagnostics {
    pub input: String,
    pub reference: String,
    pub current: String,
    /// Unified diff of the normalized outputs
    pub diff: String,
    /// Execution or harness error text, if the run itself went wrong
    pub error: Option<String>,
    pub detector: DetectorReport,
}

/// Verdict for one fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureOutcome {
    pub fixture: String,
    pub output_correct: bool,
    pub memory_safe: bool,
    pub execution_failure: Option<ExecutionFailure>,
    pub duration: Duration,
    /// Present only when the fixture failed
    #[serde(flatten)]
    pub diagnostics: Option<FailureDiagnostics>,
}

impl FixtureOutcome {
    /// Fold one execution into an outcome, dropping the payload if it passed
    pub fn from_execution(
        fixture: &str,
        input: &str,
        reference: &str,
        result: ExecutionResult,
        verdict: Verdict,
        comparison: OutputComparison,
    ) -> Self {
        let passed = verdict.passed() && result.failure.is_none();
        let detector = DetectorReport::from_execution(&result);
        let error = result.failure.map(|_| result.stderr.clone());

        let diagnostics = (!passed).then(|| FailureDiagnostics {
            input: input.to_string(),
            reference: reference.to_string(),
            current: result.stdout,
            diff: comparison.diff,
            error,
            detector,
        });

        Self {
            fixture: fixture.to_string(),
            output_correct: verdict.output_correct,
            memory_safe: verdict.memory_safe,
            execution_failure: result.failure,
            duration: result.duration,
            diagnostics,
        }
    }

    /// A fixture that could not be evaluated because the harness itself failed
    pub fn aborted(fixture: &str, input: &str, reference: &str, message: String) -> Self {
        Self {
            fixture: fixture.to_string(),
            output_correct: false,
            memory_safe: true,
            execution_failure: None,
            duration: Duration::ZERO,
            diagnostics: Some(FailureDiagnostics {
                input: input.to_string(),
                reference: reference.to_string(),
                current: String::new(),
                diff: String::new(),
                error: Some(message),
                detector: DetectorReport::NotRun,
            }),
        }
    }

    pub fn passed(&self) -> bool {
        self.output_correct && self.memory_safe && self.execution_failure.is_none()
            && self.diagnostics.is_none()
    }
}

/// One worker's tally for its slice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Fixtures that were executed and judged
    pub processed: usize,
    pub correct: usize,
    /// Fixtures skipped because their files could not be read
    pub skipped: usize,
    /// Failing outcomes in slice order
    pub failures: Vec<FixtureOutcome>,
}

impl WorkerReport {
    pub fn new(worker_id: usize) -> Self {
        Self { worker_id, ..Default::default() }
    }

    pub fn record(&mut self, outcome: FixtureOutcome) {
        self.processed += 1;
        if outcome.passed() {
            self.correct += 1;
        } else {
            self.failures.push(outcome);
        }
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }
}

/// Final aggregate of a run; the only persisted artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub correct: usize,
    pub skipped: usize,
    pub detector_rate: f64,
    pub seed: u64,
    pub workers: usize,
    pub duration: Duration,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub failures: Vec<FixtureOutcome>,
}

impl RunSummary {
    /// Merge worker reports. Failures keep worker order, then slice order.
    pub fn from_reports(
        mut reports: Vec<WorkerReport>,
        detector_rate: f64,
        seed: u64,
        duration: Duration,
    ) -> Self {
        reports.sort_by_key(|r| r.worker_id);

        let workers = reports.len();
        let total = reports.iter().map(|r| r.processed).sum();
        let correct = reports.iter().map(|r| r.correct).sum();
        let skipped = reports.iter().map(|r| r.skipped).sum();
        let failures = reports.into_iter().flat_map(|r| r.failures).collect();

        Self {
            total,
            correct,
            skipped,
            detector_rate,
            seed,
            workers,
            duration,
            timestamp: chrono::Utc::now(),
            failures,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.correct == self.total
    }

    /// Success rate as a percentage, `None` when nothing was processed
    pub fn success_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64 * 100.0)
    }

    /// Print diagnostics for every failing fixture
    pub fn print_failures(&self) {
        if self.failures.is_empty() {
            return;
        }

        println!("\n{}", style("Found errors in the following fixtures:").bold().red());
        for outcome in &self.failures {
            print_failure(outcome);
        }
    }

    pub fn print_summary(&self) {
        println!("\n{}", style("Test Summary:").bold());
        println!("Total Tests: {}", self.total);
        println!("Passed Tests: {}", style(self.correct).bold().green());

        if self.skipped > 0 {
            println!("Skipped Tests: {}", style(self.skipped).bold().yellow());
        }

        if let Some(rate) = self.success_rate() {
            let line = format!("Success Rate: {:.2}%", rate);
            if self.all_passed() {
                println!("{}", style(line).bold().green());
            } else {
                println!("{}", style(line).bold().red());
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the summary, replacing any previous file
    pub fn save_to_file(&self, path: &Path) -> Result<(), HarnessError> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn print_failure(outcome: &FixtureOutcome) {
    println!("\n{}", style(format!("Test {}:", outcome.fixture)).bold());

    let Some(diagnostics) = &outcome.diagnostics else {
        return;
    };

    println!("Input:");
    println!("{}", diagnostics.input);

    if let Some(error) = &diagnostics.error {
        let label = match outcome.execution_failure {
            Some(ExecutionFailure::TimedOut) => "Execution timed out:",
            Some(_) => "Execution error:",
            None => "Harness error:",
        };
        println!("{}", style(label).red());
        println!("{}", error);
    }

    if !outcome.output_correct {
        println!("{}", style("Output mismatch:").red());
        println!("Expected output:");
        println!("{}", diagnostics.reference);
        println!("Your output:");
        println!("{}", diagnostics.current);

        if !diagnostics.diff.is_empty() {
            println!("Normalized diff:");
            for line in diagnostics.diff.lines() {
                if line.starts_with('+') {
                    println!("  {}", style(line).green());
                } else if line.starts_with('-') {
                    println!("  {}", style(line).red());
                } else {
                    println!("  {}", style(line).dim());
                }
            }
        }
    }

    if !outcome.memory_safe {
        println!("{}", style("Memory issues detected:").red());
        println!("{}", diagnostics.detector);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run Summary:")?;
        writeln!(f, "  Total: {}", self.total)?;
        writeln!(f, "  Passed: {}", self.correct)?;
        writeln!(f, "  Failed: {}", self.failures.len())?;
        writeln!(f, "  Skipped: {}", self.skipped)?;
        if let Some(rate) = self.success_rate() {
            writeln!(f, "  Success Rate: {:.2}%", rate)?;
        }
        writeln!(f, "  Detector Rate: {:.1}%", self.detector_rate * 100.0)?;
        writeln!(f, "  Duration: {:.2?}", self.duration)?;
        Ok(())
    }
}
