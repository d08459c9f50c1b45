// src/job/scope.rs

//! Per-job execution scope.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::script::{Bindings, ExecutionFault, ScriptHost, ScriptLogLevel, Value};
use crate::types::JobName;

use super::services::HostServices;

/// Binding pre-seeded with the environment handle.
pub const JOB_HANDLE_BINDING: &str = "job";

/// Conventional binding copied into [`JobScope::result`] after a normal run.
pub const RESULT_BINDING: &str = "result";

#[derive(Debug, Default)]
struct ScopeState {
    bindings: Bindings,
    result: Option<Value>,
    exception: Option<ExecutionFault>,
}

/// Isolated namespace of one job plus its result and exception slots.
///
/// Only the job's own runner mutates a scope. While the job runs its
/// bindings are checked out by the interpreter, so [`JobScope::bindings`]
/// reflects the state before or after the run, never a half-finished one.
pub struct JobScope {
    name: JobName,
    services: Arc<dyn HostServices>,
    state: Mutex<ScopeState>,
}

impl fmt::Debug for JobScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("JobScope")
            .field("name", &self.name)
            .field("result", &state.result)
            .field("exception", &state.exception)
            .finish_non_exhaustive()
    }
}

impl JobScope {
    pub fn new(name: impl Into<JobName>, services: Arc<dyn HostServices>) -> Self {
        let mut bindings = Bindings::new();
        bindings.insert(JOB_HANDLE_BINDING.to_string(), Value::Job);

        Self {
            name: name.into(),
            services,
            state: Mutex::new(ScopeState {
                bindings,
                ..ScopeState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScopeState> {
        // A panicking runner must still be able to report through its scope.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the `result` binding after a normal run.
    pub fn result(&self) -> Option<Value> {
        self.state().result.clone()
    }

    /// Fault that ended the run, if any.
    pub fn exception(&self) -> Option<ExecutionFault> {
        self.state().exception.clone()
    }

    pub fn is_failed(&self) -> bool {
        self.state().exception.is_some()
    }

    pub fn binding(&self, name: &str) -> Option<Value> {
        self.state().bindings.get(name).cloned()
    }

    pub fn bindings(&self) -> Bindings {
        self.state().bindings.clone()
    }

    pub(crate) fn take_bindings(&self) -> Bindings {
        std::mem::take(&mut self.state().bindings)
    }

    /// Return the bindings after a run and fill the result/exception slots.
    pub(crate) fn finish(&self, bindings: Bindings, outcome: Result<(), ExecutionFault>) {
        let mut state = self.state();
        match outcome {
            Ok(()) => {
                if let Some(result) = bindings.get(RESULT_BINDING) {
                    state.result = Some(result.clone());
                }
            }
            Err(fault) => state.exception = Some(fault),
        }
        state.bindings = bindings;
    }

    /// Record a fault for a run that never reached [`JobScope::finish`].
    pub(crate) fn record_abort(&self, fault: ExecutionFault) {
        let mut state = self.state();
        if state.exception.is_none() {
            state.exception = Some(fault);
        }
    }
}

impl ScriptHost for JobScope {
    fn job_name(&self) -> &str {
        &self.name
    }

    fn notify(&self, message: &str, title: &str) {
        self.services.notify_user(message, title);
    }

    fn log(&self, level: ScriptLogLevel, message: &str) {
        let job = self.name.as_str();
        match level {
            ScriptLogLevel::Debug => debug!(target: "jobhost::job", job, "{message}"),
            ScriptLogLevel::Info => info!(target: "jobhost::job", job, "{message}"),
            ScriptLogLevel::Warning => warn!(target: "jobhost::job", job, "{message}"),
            ScriptLogLevel::Error => error!(target: "jobhost::job", job, "{message}"),
        }
    }
}
