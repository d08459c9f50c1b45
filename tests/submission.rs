// tests/submission.rs

use std::sync::{Arc, Mutex, OnceLock};

use jobhost::engine::{
    EventSink, JobEngine, JobSignal, MAX_NAME_ATTEMPTS, SignalKind, UlidNameGenerator,
};
use jobhost::errors::JobhostError;
use jobhost::fs::mock::MockFileSystem;
use jobhost::job::{JobEnvironment, PrepareError};
use jobhost::types::JobPayload;
use jobhost_test_utils::builders::test_settings;
use jobhost_test_utils::fakes::{FixedNameGenerator, RecordingNotifier, SequenceNameGenerator};
use jobhost_test_utils::{TestEngine, init_tracing, with_timeout};

use tokio::time::{Duration, sleep};

fn harness() -> TestEngine {
    TestEngine::new(test_settings("does-not-exist"))
}

#[tokio::test]
async fn accepted_job_is_registered_then_removed() {
    init_tracing();
    let mut h = harness();

    let name = h
        .engine
        .submit_job(JobPayload::new("job.sleep(0.2)\nresult = 1"))
        .expect("accepted");

    assert!(name.starts_with('J'), "{name}");
    assert_eq!(name.len(), 9, "{name}");
    assert!(name[1..].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

    assert!(h.engine.presence(&name).is_active());
    assert_eq!(h.engine.active_jobs(), vec![name.clone()]);

    match h.next_signal().await {
        JobSignal::Accepted { job_name } => assert_eq!(job_name, name),
        other => panic!("expected JOB_ACCEPTED, got {other:?}"),
    }

    let done = h.wait_done(&name).await;
    assert_eq!(done.kind(), SignalKind::Finished);
    assert!(h.engine.presence(&name).is_absent());
    assert_eq!(h.engine.active_count(), 0);
}

#[tokio::test]
async fn accepted_precedes_terminal_signal_even_for_instant_jobs() {
    init_tracing();
    let mut h = harness();

    for _ in 0..20 {
        let name = h.engine.submit_job(JobPayload::new("result = 1")).unwrap();
        let signals = h.signals_until_done(&name).await;
        let kinds: Vec<SignalKind> = signals
            .iter()
            .filter(|s| s.job_name() == Some(name.as_str()))
            .map(JobSignal::kind)
            .collect();
        assert_eq!(kinds, vec![SignalKind::Accepted, SignalKind::Finished]);
    }
}

#[tokio::test]
async fn rejected_submission_emits_exactly_one_signal() {
    init_tracing();
    let mut h = harness();

    let err = h
        .engine
        .submit_job(JobPayload::new("import os"))
        .expect_err("rejected");
    assert!(matches!(
        err,
        JobhostError::Rejected(PrepareError::Validation(_))
    ));

    match h.next_signal().await {
        JobSignal::Rejected { reason } => {
            assert_eq!(reason, "line 1: import of module 'os' is not allowed");
        }
        other => panic!("expected JOB_REJECTED, got {other:?}"),
    }

    sleep(Duration::from_millis(50)).await;
    assert!(h.drain_signals().is_empty());
    assert_eq!(h.engine.active_count(), 0);
}

#[tokio::test]
async fn syntax_and_compile_errors_are_rejected_with_a_reason() {
    init_tracing();
    let mut h = harness();

    let cases: [(&str, fn(&PrepareError) -> bool); 3] = [
        ("result = (1 +", |e| matches!(e, PrepareError::Syntax(_))),
        ("break", |e| matches!(e, PrepareError::Compile(_))),
        ("len(x) = 1", |e| matches!(e, PrepareError::Compile(_))),
    ];

    for (src, expected) in cases {
        match h.engine.submit_job(JobPayload::new(src)) {
            Err(JobhostError::Rejected(inner)) => assert!(expected(&inner), "{src}: {inner}"),
            other => panic!("{src}: expected rejection, got {other:?}"),
        }
        match h.next_signal().await {
            JobSignal::Rejected { reason } => assert!(!reason.is_empty()),
            other => panic!("expected JOB_REJECTED, got {other:?}"),
        }
    }
    assert_eq!(h.engine.active_count(), 0);
}

#[tokio::test]
async fn runaway_nesting_is_rejected_instead_of_overflowing() {
    init_tracing();
    let mut h = harness();

    let chain = vec!["1"; 20_000].join(" + ");
    let cases = [
        format!("result = {}1{}", "(".repeat(20_000), ")".repeat(20_000)),
        format!("result = {}1", "-".repeat(20_000)),
        format!("result = {}true", "not ".repeat(20_000)),
        format!("result = {chain}"),
        format!("result = {}1{}", "[".repeat(20_000), "]".repeat(20_000)),
        format!("{}pass{}", "if true {\n".repeat(5_000), "\n}".repeat(5_000)),
    ];

    for src in cases {
        let head: String = src.chars().take(24).collect();
        match h.engine.submit_job(JobPayload::new(src)) {
            Err(JobhostError::Rejected(PrepareError::Syntax(err))) => {
                assert!(err.message.contains("limit"), "{head}: {err}");
            }
            other => panic!("{head}: expected a syntax rejection, got {other:?}"),
        }
        match h.next_signal().await {
            JobSignal::Rejected { reason } => assert!(reason.contains("nested"), "{reason}"),
            other => panic!("expected JOB_REJECTED, got {other:?}"),
        }
    }
    assert_eq!(h.engine.active_count(), 0);

    let moderate = format!("result = {}1{}", "(".repeat(30), ")".repeat(30));
    let name = h.engine.submit_job(JobPayload::new(moderate)).expect("accepted");
    assert_eq!(h.wait_done(&name).await.kind(), SignalKind::Finished);
}

/// Sink that calls back into the engine from inside `send`.
struct ReentrantSink {
    engine: Arc<OnceLock<JobEngine>>,
    finish_on_accept: bool,
    seen: Mutex<Vec<(SignalKind, bool)>>,
}

impl ReentrantSink {
    fn new(engine: Arc<OnceLock<JobEngine>>, finish_on_accept: bool) -> Self {
        Self {
            engine,
            finish_on_accept,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<(SignalKind, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

impl EventSink for ReentrantSink {
    fn send(&self, signal: JobSignal) {
        let Some(engine) = self.engine.get() else {
            return;
        };
        let active = signal
            .job_name()
            .is_some_and(|name| engine.presence(name).is_active());
        let _ = engine.active_jobs();

        if let JobSignal::Accepted { job_name } = &signal {
            if self.finish_on_accept {
                let scope = engine.scope(job_name).expect("accepted job has a scope");
                engine.job_done(scope);
            }
        }
        self.seen.lock().unwrap().push((signal.kind(), active));
    }
}

fn reentrant_engine(finish_on_accept: bool) -> (JobEngine, Arc<ReentrantSink>) {
    let slot = Arc::new(OnceLock::new());
    let sink = Arc::new(ReentrantSink::new(slot.clone(), finish_on_accept));
    let env = JobEnvironment::new(Arc::new(RecordingNotifier::default()), sink.clone());
    let engine = JobEngine::with_backends(
        test_settings("jobs"),
        env,
        Arc::new(MockFileSystem::new()),
        Arc::new(UlidNameGenerator::new("J")),
    )
    .expect("engine");
    assert!(slot.set(engine.clone()).is_ok());
    (engine, sink)
}

async fn wait_for_signals(sink: &ReentrantSink, count: usize) -> Vec<(SignalKind, bool)> {
    with_timeout(async {
        loop {
            let seen = sink.seen();
            if seen.len() >= count {
                return seen;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sink_may_query_the_engine_while_handling_signals() {
    init_tracing();
    let (engine, sink) = reentrant_engine(false);

    for round in 1..=10 {
        let submitter = engine.clone();
        with_timeout(tokio::task::spawn_blocking(move || {
            submitter.submit_job(JobPayload::new("result = 1"))
        }))
        .await
        .expect("submit task")
        .expect("accepted");

        wait_for_signals(&sink, 2 * round).await;
    }

    let seen = sink.seen();
    assert_eq!(seen.len(), 20);
    for pair in seen.chunks(2) {
        assert_eq!(pair[0], (SignalKind::Accepted, true));
        assert_eq!(pair[1], (SignalKind::Finished, false));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn job_done_from_inside_accepted_is_deferred_until_after_it() {
    init_tracing();
    let (engine, sink) = reentrant_engine(true);

    let submitter = engine.clone();
    let name = with_timeout(tokio::task::spawn_blocking(move || {
        submitter.submit_job(JobPayload::new("job.sleep(0.2)\nresult = 1"))
    }))
    .await
    .expect("submit task")
    .expect("accepted");

    let seen = wait_for_signals(&sink, 2).await;
    assert_eq!(
        seen,
        vec![(SignalKind::Accepted, true), (SignalKind::Finished, false)]
    );
    assert!(engine.presence(&name).is_absent());

    // the runner's own report arrives later and is ignored
    sleep(Duration::from_millis(400)).await;
    assert_eq!(sink.seen().len(), 2);
}

#[tokio::test]
async fn colliding_candidate_names_are_regenerated() {
    init_tracing();
    let names = Arc::new(SequenceNameGenerator::new(["Jtaken", "Jtaken", "Jfresh"]));
    let mut h = TestEngine::with_backends(
        test_settings("jobs"),
        Arc::new(MockFileSystem::new()),
        names.clone(),
    );

    let first = h
        .engine
        .submit_job(JobPayload::new("job.sleep(0.3)"))
        .unwrap();
    let second = h.engine.submit_job(JobPayload::new("result = 2")).unwrap();

    assert_eq!(first, "Jtaken");
    assert_eq!(second, "Jfresh");
    assert_eq!(names.remaining(), 0);

    h.wait_all_done(&[first, second]).await;
}

#[tokio::test]
async fn exhausted_name_generator_rejects_submission() {
    init_tracing();
    let mut h = TestEngine::with_backends(
        test_settings("jobs"),
        Arc::new(MockFileSystem::new()),
        Arc::new(FixedNameGenerator("Jsame".to_string())),
    );

    let first = h
        .engine
        .submit_job(JobPayload::new("job.sleep(0.3)"))
        .unwrap();
    assert_eq!(first, "Jsame");
    assert!(matches!(h.next_signal().await, JobSignal::Accepted { .. }));

    let err = h
        .engine
        .submit_job(JobPayload::new("result = 1"))
        .expect_err("no free name");
    assert!(matches!(err, JobhostError::NameExhausted(n) if n == MAX_NAME_ATTEMPTS));

    match h.next_signal().await {
        JobSignal::Rejected { reason } => {
            assert!(reason.starts_with("could not allocate a unique job name"), "{reason}");
        }
        other => panic!("expected JOB_REJECTED, got {other:?}"),
    }

    h.wait_done("Jsame").await;
}

#[tokio::test]
async fn submit_files_reads_through_the_filesystem_seam() {
    init_tracing();
    let mut h = harness();
    let fs = MockFileSystem::new();
    fs.add_file("incoming/good.job", "result = 'from file'");
    fs.add_file("incoming/denied.job", "import os");

    let paths = vec![
        "incoming/good.job".to_string(),
        "incoming/denied.job".to_string(),
    ];
    let accepted = jobhost::submit_files(&h.engine, &fs, &paths).expect("files readable");
    assert_eq!(accepted.len(), 1);

    match h.wait_done(&accepted[0]).await {
        JobSignal::Finished { scope } => {
            assert_eq!(scope.result(), Some(jobhost::script::Value::Str("from file".into())));
        }
        other => panic!("expected JOB_FINISHED, got {other:?}"),
    }

    let missing = vec!["incoming/absent.job".to_string()];
    let err = jobhost::submit_files(&h.engine, &fs, &missing).expect_err("unreadable");
    assert!(format!("{err:#}").contains("--submit"), "{err:#}");
}

#[test]
fn payload_ignores_unknown_fields() {
    let payload: JobPayload =
        toml::from_str("script = \"result = 1\"\npriority = 5\n").expect("payload parses");
    assert_eq!(payload, JobPayload::new("result = 1"));

    assert!(toml::from_str::<JobPayload>("priority = 5").is_err());
}
