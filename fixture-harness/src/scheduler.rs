//! Work partitioning and parallel dispatch of fixture slices

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use std::ops::Range;
use std::sync::Arc;

use crate::discovery::Fixture;
use crate::reporting::{FixtureOutcome, WorkerReport};

/// A unit of isolated work: owns one slice and returns one report
pub trait SliceRunner: Send + Sync + 'static {
    fn run_slice(self: Arc<Self>, worker_id: usize, fixtures: Vec<Fixture>) -> BoxFuture<'static, WorkerReport>;
}

/// Split `len` items into `workers` contiguous ranges.
///
/// The first `len % workers` ranges hold one extra item; trailing ranges are
/// empty when there are more workers than items.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let base = len / workers;
    let extra = len % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }

    ranges
}

/// Fixed-size pool of independent slice workers
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    workers: usize,
}

impl Scheduler {
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1) }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every slice on its own task and wait for all of them.
    ///
    /// Reports come back in worker order. A task that aborts is replaced by a
    /// report that fails every fixture of its slice.
    pub async fn run<R: SliceRunner>(
        &self,
        fixtures: &[Fixture],
        runner: Arc<R>,
        progress: Option<&ProgressBar>,
    ) -> Vec<WorkerReport> {
        let slices: Vec<Vec<Fixture>> =
            partition(fixtures.len(), self.workers).into_iter().map(|r| fixtures[r].to_vec()).collect();

        let mut pending: FuturesUnordered<_> = slices
            .iter()
            .cloned()
            .enumerate()
            .map(|(worker_id, slice)| {
                let handle = tokio::spawn(Arc::clone(&runner).run_slice(worker_id, slice));
                async move { (worker_id, handle.await) }
            })
            .collect();

        let mut reports = Vec::with_capacity(slices.len());
        while let Some((worker_id, joined)) = pending.next().await {
            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Worker {} aborted: {}", worker_id, e);
                    aborted_report(worker_id, &slices[worker_id], &e.to_string())
                }
            };

            if let Some(pb) = progress {
                pb.inc((report.processed + report.skipped) as u64);
            }
            reports.push(report);
        }

        reports.sort_by_key(|r| r.worker_id);
        reports
    }
}

fn aborted_report(worker_id: usize, slice: &[Fixture], reason: &str) -> WorkerReport {
    let mut report = WorkerReport::new(worker_id);
    for fixture in slice {
        report.record(FixtureOutcome::aborted(
            &fixture.name,
            "",
            "",
            format!("Worker {} aborted: {}", worker_id, reason),
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn fixtures(n: usize) -> Vec<Fixture> {
        (0..n)
            .map(|i| Fixture {
                name: format!("case{:03}", i),
                input_path: PathBuf::from(format!("case{:03}.in", i)),
                reference_path: PathBuf::from(format!("case{:03}.out", i)),
            })
            .collect()
    }

    /// Records each fixture in order; fixtures named in `fail` fail
    struct EchoRunner {
        fail: Vec<String>,
    }

    impl SliceRunner for EchoRunner {
        fn run_slice(self: Arc<Self>, worker_id: usize, fixtures: Vec<Fixture>) -> BoxFuture<'static, WorkerReport> {
            async move {
                let mut report = WorkerReport::new(worker_id);
                for fixture in fixtures {
                    if self.fail.contains(&fixture.name) {
                        report.record(FixtureOutcome::aborted(&fixture.name, "", "", "bad".to_string()));
                    } else {
                        report.processed += 1;
                        report.correct += 1;
                    }
                }
                report
            }
            .boxed()
        }
    }

    /// Panics for one worker id
    struct CrashingRunner;

    impl SliceRunner for CrashingRunner {
        fn run_slice(self: Arc<Self>, worker_id: usize, fixtures: Vec<Fixture>) -> BoxFuture<'static, WorkerReport> {
            async move {
                if worker_id == 1 {
                    panic!("worker blew up");
                }
                let mut report = WorkerReport::new(worker_id);
                report.processed = fixtures.len();
                report.correct = fixtures.len();
                report
            }
            .boxed()
        }
    }

    #[test]
    fn test_partition_ten_over_four() {
        let sizes: Vec<_> = partition(10, 4).iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(partition(10, 4)[2], 6..8);
    }

    #[test]
    fn test_partition_more_workers_than_items() {
        let ranges = partition(2, 5);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges.iter().filter(|r| r.is_empty()).count(), 3);
    }

    #[test]
    fn test_partition_zero_workers_treated_as_one() {
        assert_eq!(partition(4, 0), vec![0..4]);
    }

    proptest! {
        #[test]
        fn prop_partition_covers_in_order(len in 0usize..500, workers in 1usize..64) {
            let ranges = partition(len, workers);
            prop_assert_eq!(ranges.len(), workers);

            let flattened: Vec<usize> = ranges.iter().flat_map(|r| r.clone()).collect();
            prop_assert_eq!(flattened, (0..len).collect::<Vec<_>>());

            let max = ranges.iter().map(|r| r.len()).max().unwrap_or(0);
            let min = ranges.iter().map(|r| r.len()).min().unwrap_or(0);
            prop_assert!(max - min <= 1);
        }
    }

    #[tokio::test]
    async fn test_reports_in_worker_order() {
        let scheduler = Scheduler::new(4);
        let all = fixtures(10);
        let runner = Arc::new(EchoRunner { fail: vec!["case001".to_string(), "case008".to_string()] });

        let reports = scheduler.run(&all, runner, None).await;

        let ids: Vec<_> = reports.iter().map(|r| r.worker_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(reports.iter().map(|r| r.processed).sum::<usize>(), 10);
        assert_eq!(reports[0].failures[0].fixture, "case001");
        assert_eq!(reports[3].failures[0].fixture, "case008");
    }

    #[tokio::test]
    async fn test_empty_slices_still_report() {
        let scheduler = Scheduler::new(8);
        let reports = scheduler.run(&fixtures(3), Arc::new(EchoRunner { fail: vec![] }), None).await;

        assert_eq!(reports.len(), 8);
        assert_eq!(reports.iter().filter(|r| r.processed == 0).count(), 5);
    }

    #[tokio::test]
    async fn test_aborted_worker_fails_its_slice_only() {
        let scheduler = Scheduler::new(3);
        let all = fixtures(9);

        let reports = scheduler.run(&all, Arc::new(CrashingRunner), None).await;

        assert_eq!(reports[0].correct, 3);
        assert_eq!(reports[2].correct, 3);
        assert_eq!(reports[1].processed, 3);
        assert_eq!(reports[1].correct, 0);
        let names: Vec<_> = reports[1].failures.iter().map(|f| f.fixture.as_str()).collect();
        assert_eq!(names, vec!["case003", "case004", "case005"]);
    }
}
