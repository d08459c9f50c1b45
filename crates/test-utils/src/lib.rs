pub mod builders;
pub mod fakes;

use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

use jobhost::engine::{
    ChannelEventSink, EngineSettings, JobEngine, JobSignal, NameGenerator, UlidNameGenerator,
};
use jobhost::fs::{FileSystem, RealFileSystem};
use jobhost::job::{JOB_HANDLE_BINDING, JobEnvironment, compile_source};
use jobhost::script::{Bindings, CompiledUnit, ExecutionFault, Value, execute};
use jobhost::validator::ScriptValidator;

use crate::fakes::{RecordingHost, RecordingNotifier};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Compile `source` under the default policy, panicking on rejection.
pub fn compile_script(source: &str) -> CompiledUnit {
    compile_source(source, &ScriptValidator::default())
        .unwrap_or_else(|err| panic!("script rejected: {err}\n{source}"))
}

/// Run `source` in a fresh namespace against a recording host.
pub async fn run_script_with(
    source: &str,
    host: &RecordingHost,
) -> (Bindings, Result<(), ExecutionFault>) {
    let unit = compile_script(source);
    let mut locals = Bindings::new();
    locals.insert(JOB_HANDLE_BINDING.to_string(), Value::Job);
    let globals = Bindings::new();
    let outcome = with_timeout(execute(&unit, &mut locals, &globals, host)).await;
    (locals, outcome)
}

pub async fn run_script(source: &str) -> (Bindings, Result<(), ExecutionFault>) {
    run_script_with(source, &RecordingHost::named("test")).await
}

/// An engine wired to a channel sink and a recording notifier.
pub struct TestEngine {
    pub engine: JobEngine,
    pub signals: mpsc::UnboundedReceiver<JobSignal>,
    pub notifier: RecordingNotifier,
}

impl TestEngine {
    /// Engine over the real filesystem with ULID names.
    pub fn new(settings: EngineSettings) -> Self {
        let names = Arc::new(UlidNameGenerator::new(settings.name_prefix.clone()));
        Self::with_backends(settings, Arc::new(RealFileSystem), names)
    }

    pub fn with_backends(
        settings: EngineSettings,
        fs: Arc<dyn FileSystem>,
        names: Arc<dyn NameGenerator>,
    ) -> Self {
        let (sink, signals) = ChannelEventSink::new();
        let notifier = RecordingNotifier::default();
        let env = JobEnvironment::new(Arc::new(notifier.clone()), Arc::new(sink));
        let engine = JobEngine::with_backends(settings, env, fs, names)
            .expect("failed to build test engine");

        Self {
            engine,
            signals,
            notifier,
        }
    }

    /// Next signal, failing the test after 5 seconds.
    pub async fn next_signal(&mut self) -> JobSignal {
        with_timeout(self.signals.recv())
            .await
            .expect("signal channel closed")
    }

    /// Signals until the terminal one (`JOB_FINISHED` / `JOB_FAILED`) for
    /// `name`, inclusive.
    pub async fn signals_until_done(&mut self, name: &str) -> Vec<JobSignal> {
        let mut seen = Vec::new();
        loop {
            let signal = self.next_signal().await;
            let done = signal.scope().is_some() && signal.job_name() == Some(name);
            seen.push(signal);
            if done {
                return seen;
            }
        }
    }

    /// Terminal signal for `name`, skipping everything before it.
    pub async fn wait_done(&mut self, name: &str) -> JobSignal {
        self.signals_until_done(name)
            .await
            .pop()
            .expect("at least one signal")
    }

    /// Terminal signals for every name in `names`, in whatever order the
    /// jobs finish.
    pub async fn wait_all_done(&mut self, names: &[String]) -> HashMap<String, JobSignal> {
        let mut done = HashMap::new();
        while done.len() < names.len() {
            let signal = self.next_signal().await;
            if signal.scope().is_none() {
                continue;
            }
            let Some(name) = signal.job_name().map(str::to_string) else {
                continue;
            };
            if names.contains(&name) {
                done.insert(name, signal);
            }
        }
        done
    }

    /// Whatever signals are already queued.
    pub fn drain_signals(&mut self) -> Vec<JobSignal> {
        let mut out = Vec::new();
        while let Ok(signal) = self.signals.try_recv() {
            out.push(signal);
        }
        out
    }
}
