//! Main harness orchestrating discovery, execution and reporting

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::HarnessConfig;
use crate::discovery::{CorpusLoader, Fixture};
use crate::reporting::{RunSummary, WorkerReport};
use crate::scheduler::Scheduler;
use crate::worker::FixtureWorker;
use crate::HarnessError;

/// Runs the whole fixture corpus against the program under test
pub struct FixtureHarness {
    config: HarnessConfig,
    loader: CorpusLoader,
    scheduler: Scheduler,
}

impl FixtureHarness {
    /// Create a harness, failing on any startup precondition
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        config.validate()?;

        let loader = CorpusLoader::from_config(&config);
        let scheduler = Scheduler::new(config.effective_jobs());

        Ok(Self { config, loader, scheduler })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Discover fixtures, run them all and persist the summary.
    ///
    /// Returns an error only for precondition failures, in which case no
    /// summary file is written.
    pub async fn run(&self) -> Result<RunSummary, HarnessError> {
        let start_time = Instant::now();

        let fixtures = self.loader.load()?;

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let worker = Arc::new(FixtureWorker::from_config(
            &self.config,
            self.config.seed.unwrap_or_else(rand::random::<u64>),
        )?);
        let seed = worker.sampler().seed();

        if !self.config.quiet {
            println!("Running {} tests with {} workers", fixtures.len(), self.scheduler.workers());
            println!("Detector rate: {:.1}% ({})", self.config.memcheck * 100.0, self.config.detector);
        }
        log::info!("Detector sampling seed: {}", seed);

        let reports = self.execute(&fixtures, worker).await?;

        let summary =
            RunSummary::from_reports(reports, self.config.memcheck, seed, start_time.elapsed());

        summary.print_failures();
        summary.print_summary();

        summary.save_to_file(&self.config.results)?;
        log::info!("Results written to {}", self.config.results.display());
        log::debug!("{}", summary);

        Ok(summary)
    }

    /// Execute fixtures with progress reporting
    async fn execute(
        &self,
        fixtures: &[Fixture],
        worker: Arc<FixtureWorker>,
    ) -> Result<Vec<WorkerReport>, HarnessError> {
        let progress = if !self.config.quiet {
            let pb = indicatif::ProgressBar::new(fixtures.len() as u64);
            pb.set_style(indicatif::ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?);
            Some(pb)
        } else {
            None
        };

        let reports = self.scheduler.run(fixtures, worker, progress.as_ref()).await;

        if let Some(pb) = progress {
            pb.finish_with_message("Fixtures completed");
        }

        Ok(reports)
    }
}

/// Builder pattern for creating harnesses
pub struct HarnessBuilder {
    config: HarnessConfig,
}

impl HarnessBuilder {
    /// Start building a harness for the given executable and fixture directory
    pub fn new(executable: impl AsRef<Path>, fixtures: impl AsRef<Path>) -> Self {
        let config =
            HarnessConfig::new(executable.as_ref().to_path_buf(), fixtures.as_ref().to_path_buf());

        Self { config }
    }

    /// Set the number of workers (0 = auto-detect)
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    /// Set the detector sampling rate
    pub fn memcheck(mut self, rate: f64) -> Self {
        self.config.memcheck = rate;
        self
    }

    /// Set the detector command and its arguments
    pub fn detector(mut self, program: impl Into<String>, args: impl Into<String>) -> Self {
        self.config.detector = program.into();
        self.config.detector_args = args.into();
        self
    }

    /// Fix the sampling seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set the per-child timeout
    pub fn timeout(mut self, timeout_secs: u64) -> Self {
        self.config.timeout = timeout_secs;
        self
    }

    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn results(mut self, path: impl AsRef<Path>) -> Self {
        self.config.results = path.as_ref().to_path_buf();
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// Enable quiet mode
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    /// Build the harness
    pub fn build(self) -> Result<FixtureHarness, HarnessError> {
        FixtureHarness::new(self.config)
    }
}
