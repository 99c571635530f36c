//! Sequential processing of one slice of fixtures

use futures::future::{BoxFuture, FutureExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::comparison::{OutputComparator, OutputComparison};
use crate::config::HarnessConfig;
use crate::discovery::Fixture;
use crate::execution::TargetExecutor;
use crate::normalize::OutputNormalizer;
use crate::reporting::{FixtureOutcome, WorkerReport};
use crate::sampling::DetectorSampler;
use crate::scheduler::SliceRunner;
use crate::HarnessError;

/// How often a worker logs its progress
const PROGRESS_INTERVAL: usize = 10;

/// Runs, judges and tallies the fixtures of a slice, one at a time
#[derive(Debug, Clone)]
pub struct FixtureWorker {
    executor: TargetExecutor,
    comparator: OutputComparator,
    sampler: DetectorSampler,
}

impl FixtureWorker {
    pub fn new(executor: TargetExecutor, comparator: OutputComparator, sampler: DetectorSampler) -> Self {
        Self { executor, comparator, sampler }
    }

    pub fn from_config(config: &HarnessConfig, seed: u64) -> Result<Self, HarnessError> {
        Ok(Self::new(
            TargetExecutor::from_config(config)?,
            OutputComparator::new(OutputNormalizer::new(config.delimiter)),
            DetectorSampler::new(config.memcheck, seed),
        ))
    }

    pub fn sampler(&self) -> &DetectorSampler {
        &self.sampler
    }

    /// Process a slice in order and return its tally
    pub async fn process_slice(&self, worker_id: usize, fixtures: Vec<Fixture>) -> WorkerReport {
        run_contained(self, worker_id, &fixtures).await
    }

    /// Run one fixture. Returns `None` when its files cannot be read.
    pub async fn process_fixture(&self, fixture: &Fixture) -> Option<FixtureOutcome> {
        let loaded = match fixture.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("{}", e);
                return None;
            }
        };

        let mode = self.sampler.mode_for(&fixture.name);
        let result = self.executor.execute(&loaded.input, mode).await;

        let verdict = self.comparator.evaluate(&loaded.reference, &result);
        let comparison = if verdict.output_correct {
            OutputComparison::identical()
        } else {
            self.comparator.compare_output(&loaded.reference, &result.stdout)
        };

        log::debug!(
            "Fixture {}: mode={:?} output_correct={} memory_safe={} in {:.2?}",
            fixture.name,
            mode,
            verdict.output_correct,
            verdict.memory_safe,
            result.duration
        );

        Some(FixtureOutcome::from_execution(
            &fixture.name,
            &loaded.input,
            &loaded.reference,
            result,
            verdict,
            comparison,
        ))
    }
}

/// Per-fixture processing step driven by a worker's slice loop
pub trait FixtureStep: Send + Sync {
    /// Returns `None` when the fixture has to be skipped
    fn run_fixture<'a>(&'a self, fixture: &'a Fixture) -> BoxFuture<'a, Option<FixtureOutcome>>;
}

impl FixtureStep for FixtureWorker {
    fn run_fixture<'a>(&'a self, fixture: &'a Fixture) -> BoxFuture<'a, Option<FixtureOutcome>> {
        self.process_fixture(fixture).boxed()
    }
}

/// Drive `step` over the fixtures in order. A panic fails only the fixture
/// that raised it.
pub async fn run_contained<S>(step: &S, worker_id: usize, fixtures: &[Fixture]) -> WorkerReport
where
    S: FixtureStep + ?Sized,
{
    let mut report = WorkerReport::new(worker_id);

    for fixture in fixtures {
        match AssertUnwindSafe(step.run_fixture(fixture)).catch_unwind().await {
            Ok(Some(outcome)) => report.record(outcome),
            Ok(None) => report.record_skip(),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("Worker {}: fixture {} panicked: {}", worker_id, fixture.name, message);
                report.record(FixtureOutcome::aborted(
                    &fixture.name,
                    "",
                    "",
                    format!("Harness panicked while processing fixture: {}", message),
                ));
            }
        }

        if report.processed > 0 && report.processed % PROGRESS_INTERVAL == 0 {
            log::info!("Worker {}: Processed {} tests", worker_id, report.processed);
        }
    }

    report
}

impl SliceRunner for FixtureWorker {
    fn run_slice(self: Arc<Self>, worker_id: usize, fixtures: Vec<Fixture>) -> BoxFuture<'static, WorkerReport> {
        async move { self.process_slice(worker_id, fixtures).await }.boxed()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
