// src/job/prepare.rs

//! Source text → compiled unit pipeline shared by discovery and submission.

use thiserror::Error;

use crate::script::{CompileError, CompiledUnit, SyntaxError, compile, parse};
use crate::validator::{ScriptValidator, ValidationError};

use super::descriptor::JobDescriptor;

/// Why a script could not be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Parse, validate and compile `source`.
///
/// Validation always runs before compilation.
pub fn compile_source(
    source: &str,
    validator: &ScriptValidator,
) -> Result<CompiledUnit, PrepareError> {
    let program = parse(source)?;
    validator.validate(&program)?;
    Ok(compile(&program)?)
}

/// Build a descriptor for `name` from `source`.
pub fn prepare(
    name: &str,
    source: String,
    validator: &ScriptValidator,
) -> Result<JobDescriptor, PrepareError> {
    let unit = compile_source(&source, validator)?;
    Ok(JobDescriptor::new(name, source, unit))
}
