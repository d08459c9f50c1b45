// src/script/mod.rs

//! The job script language.
//!
//! Jobs are written in a small, Python-flavoured language that the host
//! parses, validates, compiles and interprets itself, so author code never
//! reaches a dynamic-execution primitive of the host.
//!
//! - [`lexer`] and [`parser`] turn source text into the [`ast`].
//! - [`compiler`] lowers the AST into a flat [`CompiledUnit`].
//! - [`vm`] runs a compiled unit asynchronously against a namespace.
//! - [`builtins`] holds operators and builtin functions.

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod fault;
pub mod lexer;
pub mod parser;
pub mod value;
pub mod vm;

use thiserror::Error;

pub use ast::Program;
pub use compiler::{CompileError, CompiledUnit, compile};
pub use fault::{ExecutionFault, FaultKind};
pub use parser::{MAX_EXPR_DEPTH, MAX_NESTING, parse};
pub use builtins::MAX_SEQUENCE_LEN;
pub use value::{Bindings, Builtin, MAX_LIST_DEPTH, Value};
pub use vm::{DEFAULT_NOTIFY_TITLE, ScriptHost, ScriptLogLevel, execute};

/// Lexing or parsing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}
