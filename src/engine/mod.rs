// src/engine/mod.rs

//! The job engine.
//!
//! The engine owns three name-keyed registries (descriptors, scopes,
//! runners) and keeps them consistent: a job is registered in all three or
//! in none, as observed from outside the registry lock. It
//! - discovers and dispatches job files at start-up,
//! - admits runtime submissions,
//! - deregisters jobs when their runners report completion,
//! - emits the four lifecycle signals through an [`EventSink`].
//!
//! The synchronous bookkeeping lives in [`core`]; the async shell
//! (completion loop, idle loop) in [`runtime`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::ConfigFile;
use crate::validator::ValidationPolicy;

pub mod core;
pub mod naming;
pub mod registry;
pub mod runtime;
pub mod signals;

pub use naming::{MAX_NAME_ATTEMPTS, NameGenerator, UlidNameGenerator};
pub use registry::{Presence, Registry};
pub use runtime::JobEngine;
pub use signals::{ChannelEventSink, EventSink, JobSignal, LogEventSink, SignalKind};

/// Engine settings, usually derived from `Jobhost.toml`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub jobs_dir: PathBuf,
    pub suffixes: Vec<String>,
    pub init_stem: String,
    pub name_prefix: String,
    /// How often the idle loop checks the stop flag.
    pub idle_poll: Duration,
    /// Return from `start` once no job is active (used for `--once`).
    pub exit_when_idle: bool,
    pub policy: ValidationPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&ConfigFile::default(), Path::new(""))
    }
}

impl EngineSettings {
    /// Settings from a validated config; a relative `jobs_dir` is resolved
    /// against `base_dir`.
    pub fn from_config(cfg: &ConfigFile, base_dir: &Path) -> Self {
        let engine = &cfg.engine;
        let jobs_dir = if engine.jobs_dir.is_absolute() {
            engine.jobs_dir.clone()
        } else {
            base_dir.join(&engine.jobs_dir)
        };

        Self {
            jobs_dir,
            suffixes: engine.suffixes.clone(),
            init_stem: engine.init_stem.clone(),
            name_prefix: engine.name_prefix.clone(),
            idle_poll: Duration::from_millis(engine.idle_poll_ms),
            exit_when_idle: false,
            policy: cfg.policy.to_policy(),
        }
    }

    pub fn with_jobs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.jobs_dir = dir.into();
        self
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn with_exit_when_idle(mut self, exit_when_idle: bool) -> Self {
        self.exit_when_idle = exit_when_idle;
        self
    }
}
