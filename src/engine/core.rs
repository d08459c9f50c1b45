// src/engine/core.rs

//! Registry bookkeeping and signal emission.
//!
//! Everything here is synchronous: the registry is a `std::sync::Mutex` and
//! no method awaits while holding it. Signals are sent only after the lock
//! is released, so a sink may call straight back into the engine. The async shell in
//! [`super::runtime`] drives discovery, the completion channel and the idle
//! loop around this core.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::errors::{JobhostError, Result};
use crate::fs::FileSystem;
use crate::job::{
    CheckReport, CompletionSender, JobDescriptor, JobEnvironment, JobLoader, JobRunner, JobScope,
    compile_source,
};
use crate::types::{JobName, JobPayload};
use crate::validator::ScriptValidator;

use super::EngineSettings;
use super::naming::{MAX_NAME_ATTEMPTS, NameGenerator};
use super::registry::{Presence, Registry};
use super::signals::JobSignal;

pub(crate) struct EngineCore {
    settings: EngineSettings,
    env: JobEnvironment,
    validator: ScriptValidator,
    loader: JobLoader,
    names: Arc<dyn NameGenerator>,
    registry: Mutex<Registry>,
    completions: CompletionSender,
    started: AtomicBool,
    stopping: AtomicBool,
}

impl EngineCore {
    pub(crate) fn new(
        settings: EngineSettings,
        env: JobEnvironment,
        fs: Arc<dyn FileSystem>,
        names: Arc<dyn NameGenerator>,
        completions: CompletionSender,
    ) -> Result<Self> {
        let loader = JobLoader::new(
            fs,
            settings.jobs_dir.clone(),
            &settings.suffixes,
            settings.init_stem.clone(),
        )?;
        let validator = ScriptValidator::new(settings.policy.clone());

        Ok(Self {
            settings,
            env,
            validator,
            loader,
            names,
            registry: Mutex::new(Registry::new()),
            completions,
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        })
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Flip the started flag; `Err` if it was already set.
    pub(crate) fn mark_started(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(JobhostError::AlreadyStarted);
        }
        Ok(())
    }

    pub(crate) fn request_stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // Discovery
    // ---------------------------------------------------------------------

    /// Load every job file and dispatch the survivors under one registry
    /// lock acquisition. Returns the number of jobs started.
    pub(crate) fn discover_and_dispatch(&self) -> usize {
        let jobs = self.loader.load_all(&self.validator);
        debug!(count = jobs.len(), dir = ?self.loader.dir(), "discovered jobs");
        self.dispatch_discovered(jobs)
    }

    fn dispatch_discovered(&self, jobs: BTreeMap<JobName, JobDescriptor>) -> usize {
        let mut registry = self.registry();
        let mut started = 0;

        for (name, descriptor) in jobs {
            if registry.contains(&name) {
                warn!(job = %name, "a job with this name is already active; skipping discovered job");
                continue;
            }
            self.launch(&mut registry, Arc::new(descriptor));
            started += 1;
        }

        info!(count = started, "dispatched discovered jobs");
        started
    }

    pub(crate) fn check(&self) -> Vec<CheckReport> {
        self.loader.check(&self.validator)
    }

    // ---------------------------------------------------------------------
    // Submission
    // ---------------------------------------------------------------------

    pub(crate) fn submit_job(&self, payload: JobPayload) -> Result<JobName> {
        let candidate = {
            let registry = self.registry();
            self.unique_name(&registry)
        };
        let candidate = candidate.map_err(|err| self.reject(err))?;
        debug!(job = %candidate, "submitting job");

        let unit = match compile_source(&payload.script, &self.validator) {
            Ok(unit) => unit,
            Err(err) => {
                error!(job = %candidate, error = %err, "failed to accept job");
                return Err(self.reject(err.into()));
            }
        };

        let mut registry = self.registry();
        let name = if registry.contains(&candidate) {
            debug!(job = %candidate, "candidate name taken meanwhile; regenerating");
            match self.unique_name(&registry) {
                Ok(name) => name,
                Err(err) => {
                    drop(registry);
                    return Err(self.reject(err));
                }
            }
        } else {
            candidate
        };

        // Completions are held back until JOB_ACCEPTED is out, so the
        // terminal signal can never overtake it.
        registry.hold(&name);
        let descriptor = Arc::new(JobDescriptor::new(name.clone(), payload.script, unit));
        self.launch(&mut registry, descriptor);
        drop(registry);

        self.env.sink.send(JobSignal::Accepted {
            job_name: name.clone(),
        });
        info!(job = %name, "job accepted");

        let parked = self.registry().release(&name);
        if let Some(scope) = parked {
            self.job_done(scope);
        }
        Ok(name)
    }

    fn unique_name(&self, registry: &Registry) -> Result<JobName> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let candidate = self.names.candidate();
            if !registry.contains(&candidate) {
                return Ok(candidate);
            }
            debug!(%candidate, "job name collision; retrying");
        }
        Err(JobhostError::NameExhausted(MAX_NAME_ATTEMPTS))
    }

    /// Emit `JOB_REJECTED` for `err` and hand it back.
    fn reject(&self, err: JobhostError) -> JobhostError {
        let reason = match &err {
            JobhostError::Rejected(inner) => inner.to_string(),
            other => other.to_string(),
        };
        self.env.sink.send(JobSignal::Rejected { reason });
        err
    }

    /// Create a fresh scope, spawn the runner and register all three
    /// entries. The caller holds the registry lock.
    fn launch(&self, registry: &mut Registry, descriptor: Arc<JobDescriptor>) {
        let scope = Arc::new(JobScope::new(
            descriptor.name(),
            Arc::clone(&self.env.services),
        ));
        let runner = JobRunner::new(Arc::clone(&descriptor), Arc::clone(&scope))
            .spawn(self.completions.clone());
        registry.insert(descriptor, scope, runner);
    }

    // ---------------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------------

    pub(crate) fn job_done(&self, scope: Arc<JobScope>) {
        let removed = {
            let mut registry = self.registry();
            if registry.defer_completion(&scope) {
                debug!(job = %scope.name(), "completion arrived before JOB_ACCEPTED was sent; deferring");
                return;
            }
            registry.remove(scope.name())
        };
        if !removed {
            warn!(job = %scope.name(), "completion for a job that is not registered; ignoring");
            return;
        }

        match scope.exception() {
            Some(fault) => {
                info!(job = %scope.name(), error = %fault, "job failed");
                self.env.sink.send(JobSignal::Failed { scope });
            }
            None => {
                info!(job = %scope.name(), "job finished");
                self.env.sink.send(JobSignal::Finished { scope });
            }
        }
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub(crate) fn presence(&self, name: &str) -> Presence {
        self.registry().presence(name)
    }

    pub(crate) fn active_jobs(&self) -> Vec<JobName> {
        self.registry().names()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.registry().len()
    }

    pub(crate) fn scope(&self, name: &str) -> Option<Arc<JobScope>> {
        self.registry().scope(name)
    }
}
