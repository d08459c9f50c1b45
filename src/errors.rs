// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::job::PrepareError;

#[derive(Error, Debug)]
pub enum JobhostError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A submitted script failed to parse, validate or compile.
    #[error("Job rejected: {0}")]
    Rejected(#[from] PrepareError),

    #[error("could not allocate a unique job name after {0} attempts")]
    NameExhausted(usize),

    #[error("job engine already started")]
    AlreadyStarted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobhostError>;
