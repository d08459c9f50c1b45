// tests/discovery.rs

use std::path::PathBuf;
use std::sync::Arc;

use jobhost::engine::{JobSignal, UlidNameGenerator};
use jobhost::fs::mock::MockFileSystem;
use jobhost::job::{DiscoveryError, JobLoader, PrepareError};
use jobhost::script::Value;
use jobhost::validator::ScriptValidator;
use jobhost_test_utils::builders::test_settings;
use jobhost_test_utils::{TestEngine, init_tracing, with_timeout};

fn loader(fs: &MockFileSystem, suffixes: &[&str]) -> JobLoader {
    let suffixes: Vec<String> = suffixes.iter().map(|s| s.to_string()).collect();
    JobLoader::new(Arc::new(fs.clone()), "jobs", &suffixes, "__init__").expect("valid loader")
}

#[test]
fn file_name_convention() {
    let fs = MockFileSystem::new();
    let loader = loader(&fs, &["job"]);

    assert!(loader.is_job_file("report.job"));
    assert!(loader.is_job_file("Nightly_2.job"));
    assert!(!loader.is_job_file("__init__.job"));
    assert!(!loader.is_job_file("_private.job"));
    assert!(!loader.is_job_file("9lives.job"));
    assert!(!loader.is_job_file("notes.txt"));
    assert!(!loader.is_job_file("report.job.bak"));
    assert!(!loader.is_job_file("has-dash.job"));
}

#[test]
fn scan_filters_and_sorts() {
    let fs = MockFileSystem::new();
    fs.add_file("jobs/zeta.job", "result = 1");
    fs.add_file("jobs/alpha.job", "result = 2");
    fs.add_file("jobs/__init__.job", "result = 3");
    fs.add_file("jobs/readme.md", "# docs");
    fs.add_file("jobs/nested/inner.job", "result = 4");

    let found = loader(&fs, &["job"]).scan();
    assert_eq!(
        found,
        vec![PathBuf::from("jobs/alpha.job"), PathBuf::from("jobs/zeta.job")]
    );
}

#[test]
fn missing_directory_yields_nothing() {
    init_tracing();
    let fs = MockFileSystem::new();
    let loader = loader(&fs, &["job"]);
    assert!(loader.scan().is_empty());
    assert!(loader.load_all(&ScriptValidator::default()).is_empty());
}

#[test]
fn rescan_tracks_directory_contents() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir("jobs");
    let loader = loader(&fs, &["job"]);
    assert!(loader.scan().is_empty());

    fs.add_file("jobs/first.job", "result = 1");
    fs.add_file("jobs/second.job", "result = 2");
    assert_eq!(loader.scan().len(), 2);

    fs.remove("jobs/first.job");
    assert_eq!(loader.scan(), vec![PathBuf::from("jobs/second.job")]);
    let jobs = loader.load_all(&ScriptValidator::default());
    assert_eq!(jobs.keys().cloned().collect::<Vec<_>>(), vec!["second".to_string()]);
}

#[test]
fn broken_files_are_skipped() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("jobs/good.job", "result = 1");
    fs.add_file("jobs/syntax.job", "result = (1 +");
    fs.add_file("jobs/denied.job", "import os");
    fs.add_file("jobs/badtarget.job", "len(x) = 3");
    fs.add_file("jobs/binary.job", vec![0xffu8, 0xfe, 0x00]);

    let loader = loader(&fs, &["job"]);
    let jobs = loader.load_all(&ScriptValidator::default());
    assert_eq!(jobs.keys().cloned().collect::<Vec<_>>(), vec!["good".to_string()]);

    let reports = loader.check(&ScriptValidator::default());
    assert_eq!(reports.len(), 5);
    for report in &reports {
        let stem = report.path.file_stem().unwrap().to_str().unwrap();
        match (stem, &report.outcome) {
            ("good", Ok(name)) => assert_eq!(name, "good"),
            ("syntax", Err(DiscoveryError::Rejected { source: PrepareError::Syntax(_), .. })) => {}
            ("denied", Err(DiscoveryError::Rejected { source: PrepareError::Validation(_), .. })) => {}
            ("badtarget", Err(DiscoveryError::Rejected { source: PrepareError::Compile(_), .. })) => {}
            ("binary", Err(DiscoveryError::Unreadable { .. })) => {}
            (stem, outcome) => panic!("unexpected outcome for {stem}: {outcome:?}"),
        }
    }
}

#[test]
fn later_suffix_wins_on_name_collision() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("jobs/dup.job", "result = 1");
    fs.add_file("jobs/dup.task", "result = 2");

    let loader = loader(&fs, &["job", "task"]);
    let jobs = loader.load_all(&ScriptValidator::default());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs["dup"].source(), "result = 2");
}

#[tokio::test]
async fn start_runs_discovered_jobs_without_bus_events_for_failures() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("jobs/one.job", "result = 1");
    fs.add_file("jobs/two.job", "result = 'two'");
    fs.add_file("jobs/broken.job", "import sys");

    let settings = test_settings("jobs").with_exit_when_idle(true);
    let mut harness = TestEngine::with_backends(
        settings,
        Arc::new(fs),
        Arc::new(UlidNameGenerator::default()),
    );

    with_timeout(harness.engine.start())
        .await
        .expect("start succeeds");

    let mut results = Vec::new();
    for _ in 0..2 {
        match harness.next_signal().await {
            JobSignal::Finished { scope } => {
                results.push((scope.name().to_string(), scope.result()));
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        results,
        vec![
            ("one".to_string(), Some(Value::Int(1))),
            ("two".to_string(), Some(Value::Str("two".into()))),
        ]
    );

    // The broken file produced nothing on the bus.
    assert!(harness.drain_signals().is_empty());
    assert_eq!(harness.engine.active_count(), 0);
}

#[tokio::test]
async fn discovery_from_a_real_directory() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("hello.job"), "result = 'hi from ' + job.name").unwrap();
    std::fs::write(dir.path().join("__init__.job"), "raise 'never loaded'").unwrap();

    let settings = test_settings(dir.path()).with_exit_when_idle(true);
    let mut harness = TestEngine::new(settings);

    with_timeout(harness.engine.start()).await.unwrap();

    match harness.next_signal().await {
        JobSignal::Finished { scope } => {
            assert_eq!(scope.name(), "hello");
            assert_eq!(scope.result(), Some(Value::Str("hi from hello".into())));
        }
        other => panic!("unexpected signal {other:?}"),
    }
    assert!(harness.drain_signals().is_empty());
}

#[tokio::test]
async fn check_mode_runs_nothing() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("jobs/a.job", "result = 1");
    fs.add_file("jobs/b.job", "exec");

    let mut harness = TestEngine::with_backends(
        test_settings("jobs"),
        Arc::new(fs),
        Arc::new(UlidNameGenerator::default()),
    );

    let reports = harness.engine.check();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].outcome.is_ok());
    assert!(reports[1].outcome.is_err());
    assert_eq!(harness.engine.active_count(), 0);
    assert!(harness.drain_signals().is_empty());
}
