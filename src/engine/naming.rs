// src/engine/naming.rs

//! Names for runtime-submitted jobs.

use std::fmt;

use ulid::Ulid;

use crate::types::JobName;

/// Consecutive colliding candidates tolerated before a submission is
/// rejected.
pub const MAX_NAME_ATTEMPTS: usize = 1024;

/// Default prefix of generated names.
pub const DEFAULT_NAME_PREFIX: &str = "J";

/// Length of the random part of a generated name.
pub const NAME_RANDOM_LEN: usize = 8;

/// Source of candidate job names. Uniqueness against the registry is the
/// engine's concern; a generator only proposes.
pub trait NameGenerator: Send + Sync + fmt::Debug {
    fn candidate(&self) -> JobName;
}

/// `<prefix><8 lower-case chars>`, the random part taken from the tail of a
/// fresh ULID.
#[derive(Debug, Clone)]
pub struct UlidNameGenerator {
    prefix: String,
}

impl UlidNameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UlidNameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_PREFIX)
    }
}

impl NameGenerator for UlidNameGenerator {
    fn candidate(&self) -> JobName {
        // The leading characters encode the timestamp; the tail is random.
        let ulid = Ulid::new().to_string();
        let tail = &ulid[ulid.len() - NAME_RANDOM_LEN..];
        format!("{}{}", self.prefix, tail.to_lowercase())
    }
}
