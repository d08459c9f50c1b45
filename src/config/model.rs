// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::naming::DEFAULT_NAME_PREFIX;
use crate::validator::{ConstructKind, ValidationPolicy, Verdict};

pub const DEFAULT_JOBS_DIR: &str = "jobs";
pub const DEFAULT_SUFFIX: &str = "job";
pub const DEFAULT_INIT_STEM: &str = "__init__";
pub const DEFAULT_IDLE_POLL_MS: u64 = 1000;

/// Configuration as read from `Jobhost.toml`, before validation.
///
/// ```toml
/// [engine]
/// jobs_dir = "jobs"
/// suffixes = ["job"]
/// name_prefix = "J"
///
/// [policy]
/// extra_denied_names = ["fetch"]
///
/// [policy.rules]
/// while_loop = "deny"
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub policy: PolicySection,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub policy: PolicySection,
}

impl ConfigFile {
    /// Assemble without validation; `TryFrom<RawConfigFile>` is the checked
    /// path.
    pub fn new_unchecked(engine: EngineSection, policy: PolicySection) -> Self {
        Self { engine, policy }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Directory scanned at start-up, relative to the config file.
    pub jobs_dir: PathBuf,

    /// File extensions (without the dot) recognised as job scripts.
    pub suffixes: Vec<String>,

    /// Stem of the package-init file, which is never loaded as a job.
    pub init_stem: String,

    /// Prefix of generated names for submitted jobs.
    pub name_prefix: String,

    pub idle_poll_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from(DEFAULT_JOBS_DIR),
            suffixes: vec![DEFAULT_SUFFIX.to_string()],
            init_stem: DEFAULT_INIT_STEM.to_string(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            idle_poll_ms: DEFAULT_IDLE_POLL_MS,
        }
    }
}

/// `[policy]` section: overrides on top of the default validation policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// `kind = "allow" | "deny"` per construct kind.
    pub rules: BTreeMap<ConstructKind, Verdict>,

    /// Identifiers denied in addition to the built-in list.
    pub extra_denied_names: Vec<String>,
}

impl PolicySection {
    pub fn to_policy(&self) -> ValidationPolicy {
        let policy = self
            .rules
            .iter()
            .fold(ValidationPolicy::default(), |policy, (kind, verdict)| {
                policy.with_rule(*kind, *verdict)
            });
        self.extra_denied_names
            .iter()
            .fold(policy, |policy, name| policy.deny_name(name.clone()))
    }
}
