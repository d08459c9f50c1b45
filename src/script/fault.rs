// src/script/fault.rs

use std::fmt;

use thiserror::Error;

/// Category of a runtime fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Raised explicitly by the script with `raise`.
    Raised,
    /// Reference to an unbound name.
    Name,
    /// Operation applied to a value of the wrong type.
    Type,
    /// Right type, unacceptable value.
    Value,
    ZeroDivision,
    Index,
    Overflow,
    /// The runner stopped before the script completed (panic or abort).
    Aborted,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::Raised => "raised",
            FaultKind::Name => "name",
            FaultKind::Type => "type",
            FaultKind::Value => "value",
            FaultKind::ZeroDivision => "zero_division",
            FaultKind::Index => "index",
            FaultKind::Overflow => "overflow",
            FaultKind::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// An uncaught failure during a job's run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} fault at line {line}: {message}")]
pub struct ExecutionFault {
    pub kind: FaultKind,
    pub message: String,
    /// Source line of the failing instruction; 0 when not tied to a line.
    pub line: u32,
}

impl ExecutionFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: 0,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Aborted, message)
    }
}
