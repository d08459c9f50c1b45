// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated model.
///
/// Only TOML deserialization happens here; use [`load_and_validate`] for
/// the checked configuration.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file, apply defaults and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Jobhost.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Jobhost.toml")
}

/// Resolve the configuration to use.
///
/// An explicit path must exist. Without one, the default path is used when
/// present and built-in defaults otherwise. Also returns the directory that
/// relative paths in the config are resolved against.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(ConfigFile, PathBuf)> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(), false),
    };

    if !required && !path.is_file() {
        return Ok((ConfigFile::default(), config_root_dir(&path)));
    }

    let cfg = load_and_validate(&path)?;
    Ok((cfg, config_root_dir(&path)))
}

/// Directory containing `config_path`, or the working directory for a bare
/// file name.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
