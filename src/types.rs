// src/types.rs

use serde::Deserialize;

/// Canonical job name type used throughout the engine.
pub type JobName = String;

/// Runtime submission payload.
///
/// Only `script` is required; any other fields a host sends along are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobPayload {
    /// Source text of the job script.
    pub script: String,
}

impl JobPayload {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}
