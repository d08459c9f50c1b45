// src/engine/runtime.rs

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::job::{CheckReport, JobEnvironment, JobScope};
use crate::types::{JobName, JobPayload};

use super::EngineSettings;
use super::core::EngineCore;
use super::naming::{NameGenerator, UlidNameGenerator};
use super::registry::Presence;

/// Handle to a running job engine.
///
/// Cheap to clone; every clone drives the same registries. Must be created
/// inside a Tokio runtime because construction spawns the completion loop.
#[derive(Clone)]
pub struct JobEngine {
    core: Arc<EngineCore>,
}

impl fmt::Debug for JobEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobEngine")
            .field("settings", self.core.settings())
            .field("active", &self.core.active_count())
            .finish_non_exhaustive()
    }
}

impl JobEngine {
    /// Engine backed by the real filesystem and ULID-based names.
    pub fn new(settings: EngineSettings, env: JobEnvironment) -> Result<Self> {
        let names = Arc::new(UlidNameGenerator::new(settings.name_prefix.clone()));
        Self::with_backends(settings, env, Arc::new(RealFileSystem), names)
    }

    pub fn with_backends(
        settings: EngineSettings,
        env: JobEnvironment,
        fs: Arc<dyn FileSystem>,
        names: Arc<dyn NameGenerator>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Arc::new(EngineCore::new(settings, env, fs, names, tx)?);
        tokio::spawn(completion_loop(Arc::downgrade(&core), rx));
        Ok(Self { core })
    }

    pub fn settings(&self) -> &EngineSettings {
        self.core.settings()
    }

    /// Discover and dispatch the jobs directory, then idle until [`stop`]
    /// is called (or, with `exit_when_idle`, until no job is active).
    ///
    /// Fails with `AlreadyStarted` on a second call.
    ///
    /// [`stop`]: JobEngine::stop
    pub async fn start(&self) -> Result<()> {
        self.core.mark_started()?;

        debug!("starting job engine...");
        self.core.discover_and_dispatch();
        debug!("job engine started");

        self.idle().await;
        info!("job engine stopped");
        Ok(())
    }

    async fn idle(&self) {
        let settings = self.core.settings();
        loop {
            if self.core.is_stopping() {
                info!("stop requested; leaving idle loop");
                break;
            }
            if settings.exit_when_idle && self.core.active_count() == 0 {
                info!("no active jobs; exiting (exit_when_idle = true)");
                break;
            }
            tokio::time::sleep(settings.idle_poll).await;
        }
    }

    /// Submit a script for immediate execution. Returns the generated job
    /// name, or the rejection (which has also been emitted as
    /// `JOB_REJECTED`).
    pub fn submit_job(&self, payload: JobPayload) -> Result<JobName> {
        self.core.submit_job(payload)
    }

    /// Deregister a finished job and emit its terminal signal.
    ///
    /// Runners report here through the completion channel; calling it for
    /// a name that is no longer registered does nothing.
    pub fn job_done(&self, scope: Arc<JobScope>) {
        self.core.job_done(scope);
    }

    /// Ask [`start`](JobEngine::start) to return. Running jobs are left to
    /// finish and still report.
    pub fn stop(&self) {
        info!("stopping job engine");
        self.core.request_stop();
    }

    pub fn is_stopping(&self) -> bool {
        self.core.is_stopping()
    }

    pub fn presence(&self, name: &str) -> Presence {
        self.core.presence(name)
    }

    pub fn active_jobs(&self) -> Vec<JobName> {
        self.core.active_jobs()
    }

    pub fn active_count(&self) -> usize {
        self.core.active_count()
    }

    /// Scope of an active job.
    pub fn scope(&self, name: &str) -> Option<Arc<JobScope>> {
        self.core.scope(name)
    }

    /// Run the discovery pipeline over the jobs directory without
    /// registering or running anything.
    pub fn check(&self) -> Vec<CheckReport> {
        self.core.check()
    }
}

async fn completion_loop(core: Weak<EngineCore>, mut rx: mpsc::UnboundedReceiver<Arc<JobScope>>) {
    while let Some(scope) = rx.recv().await {
        let Some(core) = core.upgrade() else {
            debug!(job = %scope.name(), "engine dropped; discarding completion");
            break;
        };
        core.job_done(scope);
    }
    debug!("completion loop finished");
}
