// src/config/validate.rs

use crate::config::model::{ConfigFile, EngineSection, PolicySection, RawConfigFile};
use crate::errors::{JobhostError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JobhostError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.policy))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_suffixes(&cfg.engine)?;
    validate_name_prefix(&cfg.engine)?;
    validate_idle_poll(&cfg.engine)?;
    validate_policy(&cfg.policy)?;
    Ok(())
}

fn validate_suffixes(engine: &EngineSection) -> Result<()> {
    if engine.suffixes.is_empty() {
        return Err(JobhostError::ConfigError(
            "[engine].suffixes must list at least one suffix".to_string(),
        ));
    }

    for suffix in engine.suffixes.iter() {
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(JobhostError::ConfigError(format!(
                "[engine].suffixes entry '{}' must be non-empty and alphanumeric (no leading dot)",
                suffix
            )));
        }
    }
    Ok(())
}

fn validate_name_prefix(engine: &EngineSection) -> Result<()> {
    if !is_identifier(&engine.name_prefix) {
        return Err(JobhostError::ConfigError(format!(
            "[engine].name_prefix '{}' must start with a letter and contain only letters, digits or '_'",
            engine.name_prefix
        )));
    }
    Ok(())
}

fn validate_idle_poll(engine: &EngineSection) -> Result<()> {
    if engine.idle_poll_ms == 0 {
        return Err(JobhostError::ConfigError(
            "[engine].idle_poll_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_policy(policy: &PolicySection) -> Result<()> {
    for name in policy.extra_denied_names.iter() {
        if name.trim().is_empty() {
            return Err(JobhostError::ConfigError(
                "[policy].extra_denied_names must not contain empty names".to_string(),
            ));
        }
    }
    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
