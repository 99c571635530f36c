//! End-to-end harness runs against stand-in programs
//!
//! `/bin/cat` plays the program under test (it echoes each fixture input) and
//! `/bin/sh -c` plays the memory detector.

#![cfg(unix)]

use fixture_harness::{DetectorReport, ExecutionFailure, HarnessBuilder, HarnessError, RunSummary};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CLEAN_DETECTOR: &str = r#"-c 'exec "$@"' detector"#;
const LEAKY_DETECTOR: &str = r#"-c '"$@"; echo "==1== definitely lost: 16 bytes" >&2; exit 1' detector"#;

fn write_fixture(dir: &Path, name: &str, input: &str, reference: &str) {
    fs::write(dir.join(format!("{}.in", name)), input).unwrap();
    fs::write(dir.join(format!("{}.out", name)), reference).unwrap();
}

fn builder(root: &TempDir) -> HarnessBuilder {
    HarnessBuilder::new("/bin/cat", root.path().join("fixtures"))
        .output_dir(root.path().join("output"))
        .results(root.path().join("test_results.json"))
        .seed(42)
        .quiet(true)
}

fn setup() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("fixtures")).unwrap();
    root
}

fn read_summary(root: &TempDir) -> RunSummary {
    let json = fs::read_to_string(root.path().join("test_results.json")).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[tokio::test]
async fn test_reordered_tokens_pass() {
    let root = setup();
    write_fixture(&root.path().join("fixtures"), "case1", "_a_b_\n", "_b_a_\n");

    let summary = builder(&root).jobs(2).build().unwrap().run().await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.correct, 1);
    assert!(summary.failures.is_empty());
    assert!(root.path().join("output").is_dir());
}

#[tokio::test]
async fn test_wrong_output_is_reported() {
    let root = setup();
    let fixtures = root.path().join("fixtures");
    write_fixture(&fixtures, "case1", "_a_b_\n", "_b_a_\n");
    write_fixture(&fixtures, "case2", "43\n", "42\n");

    let summary = builder(&root).jobs(4).build().unwrap().run().await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.success_rate(), Some(50.0));

    let failure = &summary.failures[0];
    assert_eq!(failure.fixture, "case2");
    assert!(!failure.output_correct);
    assert!(failure.memory_safe);

    let diagnostics = failure.diagnostics.as_ref().unwrap();
    assert_eq!(diagnostics.input, "43\n");
    assert_eq!(diagnostics.reference, "42\n");
    assert_eq!(diagnostics.current, "43\n");
    assert_eq!(diagnostics.detector, DetectorReport::NotRun);

    let persisted = read_summary(&root);
    assert_eq!(persisted.total, 2);
    assert_eq!(persisted.failures.len(), 1);
}

#[tokio::test]
async fn test_missing_reference_aborts_before_running() {
    let root = setup();
    let fixtures = root.path().join("fixtures");
    write_fixture(&fixtures, "case1", "1\n", "1\n");
    fs::write(fixtures.join("case3.in"), "3\n").unwrap();

    let result = builder(&root).build().unwrap().run().await;

    match result {
        Err(HarnessError::MissingReferences(missing)) => {
            assert_eq!(missing, vec![fixtures.join("case3.out")]);
        }
        other => panic!("expected missing references, got {:?}", other.map(|s| s.total)),
    }
    assert!(!root.path().join("test_results.json").exists());
    assert!(!root.path().join("output").exists());
}

#[tokio::test]
async fn test_detector_failure_with_matching_output() {
    let root = setup();
    write_fixture(&root.path().join("fixtures"), "case4", "exact\n", "exact\n");

    let summary = builder(&root)
        .memcheck(1.0)
        .detector("/bin/sh", LEAKY_DETECTOR)
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.correct, 0);
    let failure = &summary.failures[0];
    assert!(failure.output_correct);
    assert!(!failure.memory_safe);

    match &failure.diagnostics.as_ref().unwrap().detector {
        DetectorReport::Ran { exit_code, output } => {
            assert_eq!(*exit_code, 1);
            assert!(output.contains("definitely lost"));
        }
        DetectorReport::NotRun => panic!("detector should have run"),
    }
    assert_eq!(read_summary(&root).detector_rate, 1.0);
}

#[tokio::test]
async fn test_clean_detector_passes_everything() {
    let root = setup();
    let fixtures = root.path().join("fixtures");
    for i in 0..10 {
        write_fixture(&fixtures, &format!("case{:02}", i), &format!("_{}_x_\n", i), &format!("_x_{}_\n", i));
    }

    let summary = builder(&root)
        .jobs(4)
        .memcheck(1.0)
        .detector("/bin/sh", CLEAN_DETECTOR)
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.total, 10);
    assert_eq!(summary.correct, 10);
    assert_eq!(summary.workers, 4);
    assert!(summary.all_passed());
}

#[tokio::test]
async fn test_failures_ordered_by_worker_then_slice() {
    let root = setup();
    let fixtures = root.path().join("fixtures");
    for i in 0..10 {
        write_fixture(&fixtures, &format!("case{:02}", i), "got\n", "want\n");
    }

    let summary = builder(&root).jobs(4).build().unwrap().run().await.unwrap();

    let names: Vec<_> = summary.failures.iter().map(|f| f.fixture.clone()).collect();
    let expected: Vec<_> = (0..10).map(|i| format!("case{:02}", i)).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_more_workers_than_fixtures() {
    let root = setup();
    write_fixture(&root.path().join("fixtures"), "only", "1\n", "1\n");

    let summary = builder(&root).jobs(16).build().unwrap().run().await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.workers, 16);
}

#[tokio::test]
async fn test_unreadable_fixtures_still_write_summary() {
    let root = setup();
    let fixtures = root.path().join("fixtures");
    fs::write(fixtures.join("broken.in"), "1\n").unwrap();
    // A directory satisfies the existence check but cannot be read as text.
    fs::create_dir(fixtures.join("broken.out")).unwrap();

    let summary = builder(&root).build().unwrap().run().await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.success_rate(), None);

    let persisted = read_summary(&root);
    assert_eq!(persisted.total, 0);
    assert_eq!(persisted.skipped, 1);
}

#[tokio::test]
async fn test_hung_program_times_out_per_fixture() {
    let root = setup();
    let fixtures = root.path().join("fixtures");
    write_fixture(&fixtures, "slow", "", "never\n");

    let summary = builder(&root)
        .timeout(1)
        .memcheck(1.0)
        .detector("/bin/sh", "-c 'sleep 30' detector")
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.total, 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.execution_failure, Some(ExecutionFailure::TimedOut));
    assert!(summary.duration.as_secs() < 20);
}

#[tokio::test]
async fn test_same_seed_same_detector_selection() {
    let root = setup();
    let fixtures = root.path().join("fixtures");
    for i in 0..20 {
        write_fixture(&fixtures, &format!("case{:02}", i), "x\n", "x\n");
    }

    let run = |jobs: usize| {
        builder(&root)
            .jobs(jobs)
            .memcheck(0.5)
            .detector("/bin/sh", LEAKY_DETECTOR)
            .build()
            .unwrap()
    };

    let first = run(1).run().await.unwrap();
    let second = run(5).run().await.unwrap();

    let unsafe_names = |summary: &RunSummary| {
        summary.failures.iter().map(|f| f.fixture.clone()).collect::<Vec<_>>()
    };
    assert_eq!(unsafe_names(&first), unsafe_names(&second));
    assert_eq!(first.seed, 42);
}

#[test]
fn test_missing_executable_rejected_at_build() {
    let root = setup();
    let result = HarnessBuilder::new(root.path().join("a.out"), root.path().join("fixtures")).build();

    assert!(matches!(result, Err(HarnessError::Config(_))));
}
