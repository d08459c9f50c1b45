// src/job/runner.rs

//! Background execution of one job.
//!
//! A runner executes its descriptor's compiled unit in its own task. A
//! supervising task joins it and reports the scope on the completion channel
//! exactly once. A runner that panics or is cancelled still reports, with an
//! `aborted` fault recorded in the scope.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::script::{Bindings, ExecutionFault, execute};

use super::descriptor::JobDescriptor;
use super::scope::JobScope;

/// Channel a runner reports its finished scope on.
pub type CompletionSender = mpsc::UnboundedSender<Arc<JobScope>>;

const PANICKED: &str = "job runner panicked";
const CANCELLED: &str = "job runner was cancelled before completion";

/// Registry-side handle of a spawned runner.
#[derive(Debug)]
pub struct RunnerHandle {
    supervisor: JoinHandle<()>,
    runner: AbortHandle,
}

impl RunnerHandle {
    /// True once the scope has been reported.
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Cancel the runner. It still reports its scope, with an `aborted`
    /// fault recorded.
    pub fn abort(&self) {
        self.runner.abort();
    }
}

#[derive(Debug)]
pub struct JobRunner {
    descriptor: Arc<JobDescriptor>,
    scope: Arc<JobScope>,
}

impl JobRunner {
    pub fn new(descriptor: Arc<JobDescriptor>, scope: Arc<JobScope>) -> Self {
        Self { descriptor, scope }
    }

    /// Start the runner on the tokio runtime.
    pub fn spawn(self, completions: CompletionSender) -> RunnerHandle {
        let guard = CompletionGuard {
            scope: Some(Arc::clone(&self.scope)),
            completions,
        };

        let task = tokio::spawn(async move { self.run().await });
        let runner = task.abort_handle();

        let supervisor = tokio::spawn(async move {
            let guard = guard;
            match task.await {
                Ok(()) => guard.report(None),
                Err(err) if err.is_panic() => guard.report(Some(PANICKED)),
                Err(_) => guard.report(Some(CANCELLED)),
            }
        });

        RunnerHandle { supervisor, runner }
    }

    /// Execute the job to completion. Faults are captured in the scope,
    /// never propagated.
    pub async fn run(&self) {
        let name = self.descriptor.name();
        info!(job = %name, "running job");

        let mut locals = self.scope.take_bindings();
        let globals = Bindings::new();
        let outcome = execute(
            self.descriptor.unit(),
            &mut locals,
            &globals,
            self.scope.as_ref(),
        )
        .await;

        if let Err(fault) = &outcome {
            error!(job = %name, error = %fault, "error in running job");
        }
        self.scope.finish(locals, outcome);
    }
}

/// Sends the scope exactly once. Dropped without reporting (the supervisor
/// itself was cancelled), it reports a cancellation.
struct CompletionGuard {
    scope: Option<Arc<JobScope>>,
    completions: CompletionSender,
}

impl CompletionGuard {
    fn report(mut self, aborted: Option<&'static str>) {
        if let Some(scope) = self.scope.take() {
            self.send(scope, aborted);
        }
    }

    fn send(&self, scope: Arc<JobScope>, aborted: Option<&'static str>) {
        if let Some(reason) = aborted {
            warn!(job = %scope.name(), reason, "job did not run to completion");
            scope.record_abort(ExecutionFault::aborted(reason));
        }

        if self.completions.send(scope).is_err() {
            debug!("completion channel closed; engine is gone");
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            self.send(scope, Some(CANCELLED));
        }
    }
}
