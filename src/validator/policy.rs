// src/validator/policy.rs

//! Allow/deny table consulted by the validator.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;

/// Syntactic construct kinds the validator can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    /// `import x` / `from x import y`.
    Import,
    /// A name on the denied-name list (dynamic execution, reflection,
    /// filesystem or process escapes).
    DeniedName,
    /// An identifier starting with `__`.
    PrivateName,
    /// An attribute starting with `_`.
    PrivateAttribute,
    Attribute,
    Subscript,
    Call,
    WhileLoop,
    ForLoop,
    Raise,
}

impl ConstructKind {
    pub const ALL: [ConstructKind; 10] = [
        ConstructKind::Import,
        ConstructKind::DeniedName,
        ConstructKind::PrivateName,
        ConstructKind::PrivateAttribute,
        ConstructKind::Attribute,
        ConstructKind::Subscript,
        ConstructKind::Call,
        ConstructKind::WhileLoop,
        ConstructKind::ForLoop,
        ConstructKind::Raise,
    ];
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstructKind::Import => "import",
            ConstructKind::DeniedName => "denied_name",
            ConstructKind::PrivateName => "private_name",
            ConstructKind::PrivateAttribute => "private_attribute",
            ConstructKind::Attribute => "attribute",
            ConstructKind::Subscript => "subscript",
            ConstructKind::Call => "call",
            ConstructKind::WhileLoop => "while_loop",
            ConstructKind::ForLoop => "for_loop",
            ConstructKind::Raise => "raise",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

/// Names that would let a script escape the job environment.
pub const DEFAULT_DENIED_NAMES: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "open",
    "__import__",
    "globals",
    "locals",
    "vars",
    "getattr",
    "setattr",
    "delattr",
    "dir",
    "input",
    "breakpoint",
    "exit",
    "quit",
    "system",
    "spawn",
    "popen",
    "subprocess",
    "os",
    "sys",
];

/// Construct kinds denied unless a policy says otherwise.
const DEFAULT_DENIED_KINDS: &[ConstructKind] = &[
    ConstructKind::Import,
    ConstructKind::DeniedName,
    ConstructKind::PrivateName,
    ConstructKind::PrivateAttribute,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    rules: BTreeMap<ConstructKind, Verdict>,
    denied_names: BTreeSet<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        let rules = ConstructKind::ALL
            .iter()
            .map(|kind| {
                let verdict = if DEFAULT_DENIED_KINDS.contains(kind) {
                    Verdict::Deny
                } else {
                    Verdict::Allow
                };
                (*kind, verdict)
            })
            .collect();

        Self {
            rules,
            denied_names: DEFAULT_DENIED_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ValidationPolicy {
    pub fn verdict(&self, kind: ConstructKind) -> Verdict {
        self.rules.get(&kind).copied().unwrap_or(Verdict::Allow)
    }

    pub fn is_denied(&self, kind: ConstructKind) -> bool {
        self.verdict(kind) == Verdict::Deny
    }

    pub fn is_denied_name(&self, name: &str) -> bool {
        self.denied_names.contains(name)
    }

    pub fn denied_names(&self) -> impl Iterator<Item = &str> {
        self.denied_names.iter().map(String::as_str)
    }

    pub fn with_rule(mut self, kind: ConstructKind, verdict: Verdict) -> Self {
        self.rules.insert(kind, verdict);
        self
    }

    pub fn allow(self, kind: ConstructKind) -> Self {
        self.with_rule(kind, Verdict::Allow)
    }

    pub fn deny(self, kind: ConstructKind) -> Self {
        self.with_rule(kind, Verdict::Deny)
    }

    pub fn deny_name(mut self, name: impl Into<String>) -> Self {
        self.denied_names.insert(name.into());
        self
    }
}
