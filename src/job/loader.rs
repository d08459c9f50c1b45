// src/job/loader.rs

//! Discovery of job scripts in the jobs directory.
//!
//! Discovery is best-effort: a missing directory or a broken file is logged
//! and skipped, never surfaced to the caller and never reported on the bus.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::errors::{JobhostError, Result};
use crate::fs::FileSystem;
use crate::types::JobName;
use crate::validator::ScriptValidator;

use super::descriptor::JobDescriptor;
use super::prepare::{PrepareError, prepare};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read {path:?}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("{path:?}: {source}")]
    Rejected {
        path: PathBuf,
        #[source]
        source: PrepareError,
    },
}

impl DiscoveryError {
    pub fn path(&self) -> &Path {
        match self {
            DiscoveryError::Unreadable { path, .. } | DiscoveryError::Rejected { path, .. } => {
                path
            }
        }
    }
}

/// Outcome of checking one candidate file without registering it.
#[derive(Debug)]
pub struct CheckReport {
    pub path: PathBuf,
    pub outcome: std::result::Result<JobName, DiscoveryError>,
}

#[derive(Debug, Clone)]
pub struct JobLoader {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    pattern: Regex,
    init_stem: String,
}

impl JobLoader {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        dir: impl Into<PathBuf>,
        suffixes: &[String],
        init_stem: impl Into<String>,
    ) -> Result<Self> {
        let alternatives = suffixes
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"^[A-Za-z][A-Za-z0-9_]*\.(?:{alternatives})$"))
            .map_err(|e| JobhostError::ConfigError(format!("invalid job file suffixes: {e}")))?;

        Ok(Self {
            fs,
            dir: dir.into(),
            pattern,
            init_stem: init_stem.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `file_name` (no directory part) names a job script.
    pub fn is_job_file(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
            && Path::new(file_name)
                .file_stem()
                .is_some_and(|stem| stem != self.init_stem.as_str())
    }

    /// Candidate job files in sorted path order.
    pub fn scan(&self) -> Vec<PathBuf> {
        if !self.fs.is_dir(&self.dir) {
            warn!(dir = ?self.dir, "jobs directory does not exist; no jobs discovered");
            return Vec::new();
        }

        match self.fs.files_in(&self.dir) {
            Ok(files) => files
                .into_iter()
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| self.is_job_file(name))
                })
                .collect(),
            Err(err) => {
                warn!(dir = ?self.dir, error = %format!("{err:#}"), "cannot list jobs directory");
                Vec::new()
            }
        }
    }

    /// Read and prepare a single job file.
    pub fn load(
        &self,
        path: &Path,
        validator: &ScriptValidator,
    ) -> std::result::Result<JobDescriptor, DiscoveryError> {
        let name = job_name_for(path).ok_or_else(|| DiscoveryError::Unreadable {
            path: path.to_path_buf(),
            message: "file name is not valid UTF-8".to_string(),
        })?;

        let source =
            self.fs
                .read_to_string(path)
                .map_err(|err| DiscoveryError::Unreadable {
                    path: path.to_path_buf(),
                    message: format!("{err:#}"),
                })?;

        prepare(&name, source, validator).map_err(|source| DiscoveryError::Rejected {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load every candidate, keyed by job name. Failures are logged and
    /// skipped; on a name collision the later candidate wins.
    pub fn load_all(&self, validator: &ScriptValidator) -> BTreeMap<JobName, JobDescriptor> {
        let mut jobs = BTreeMap::new();

        for path in self.scan() {
            match self.load(&path, validator) {
                Ok(descriptor) => {
                    debug!(job = %descriptor.name(), path = ?path, "loaded job");
                    let name = descriptor.name().to_string();
                    if jobs.insert(name.clone(), descriptor).is_some() {
                        warn!(job = %name, path = ?path, "duplicate job name; later file wins");
                    }
                }
                Err(err) => error!(error = %err, "failed to load job"),
            }
        }

        jobs
    }

    /// Run the discovery pipeline without keeping anything.
    pub fn check(&self, validator: &ScriptValidator) -> Vec<CheckReport> {
        self.scan()
            .into_iter()
            .map(|path| {
                let outcome = self
                    .load(&path, validator)
                    .map(|descriptor| descriptor.name().to_string());
                CheckReport { path, outcome }
            })
            .collect()
    }
}

/// Job name for a discovered file: its stem.
pub fn job_name_for(path: &Path) -> Option<JobName> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
