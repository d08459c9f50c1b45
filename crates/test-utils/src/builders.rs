use std::path::{Path, PathBuf};
use std::time::Duration;

use jobhost::config::{ConfigFile, RawConfigFile};
use jobhost::engine::EngineSettings;
use jobhost::errors::Result;
use jobhost::validator::{ConstructKind, Verdict};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_jobs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.engine.jobs_dir = dir.into();
        self
    }

    pub fn with_suffixes(mut self, suffixes: &[&str]) -> Self {
        self.config.engine.suffixes = suffixes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_name_prefix(mut self, prefix: &str) -> Self {
        self.config.engine.name_prefix = prefix.to_string();
        self
    }

    pub fn with_idle_poll_ms(mut self, ms: u64) -> Self {
        self.config.engine.idle_poll_ms = ms;
        self
    }

    pub fn with_rule(mut self, kind: ConstructKind, verdict: Verdict) -> Self {
        self.config.policy.rules.insert(kind, verdict);
        self
    }

    pub fn with_denied_name(mut self, name: &str) -> Self {
        self.config.policy.extra_denied_names.push(name.to_string());
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for engine tests: fast idle polling, everything else default.
pub fn test_settings(jobs_dir: impl AsRef<Path>) -> EngineSettings {
    EngineSettings::default()
        .with_jobs_dir(jobs_dir.as_ref())
        .with_idle_poll(Duration::from_millis(10))
}
