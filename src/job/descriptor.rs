// src/job/descriptor.rs

use crate::script::CompiledUnit;
use crate::types::JobName;

/// Immutable record of an admitted job: its name, source text and compiled
/// unit.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    name: JobName,
    source: String,
    unit: CompiledUnit,
}

impl JobDescriptor {
    pub fn new(name: impl Into<JobName>, source: impl Into<String>, unit: CompiledUnit) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            unit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }
}
