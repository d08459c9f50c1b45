// src/script/value.rs

//! Runtime values of the job script language.

use std::collections::BTreeMap;
use std::fmt;

/// Deepest list nesting a value may reach. Dropping, cloning and printing
/// a list recurse once per level.
pub const MAX_LIST_DEPTH: usize = 100;

/// Variable bindings of one namespace.
pub type Bindings = BTreeMap<String, Value>;

/// A script value.
///
/// Values are fully owned: assigning a list copies it, so two scopes can never
/// observe each other's mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Handle to the running job's environment (`job` binding).
    Job,
    /// Handle returned by `job.logger`.
    Logger,
    Builtin(Builtin),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Job => "job",
            Value::Logger => "logger",
            Value::Builtin(_) => "builtin",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Job | Value::Logger | Value::Builtin(_) => true,
        }
    }

    /// Numeric view used for mixed int/float arithmetic and comparison.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Levels of list nesting: 0 for scalars, 1 for a flat list.
    ///
    /// Every live value stays within [`MAX_LIST_DEPTH`], so the recursion
    /// here is bounded.
    pub fn list_depth(&self) -> usize {
        match self {
            Value::List(items) => 1 + items.iter().map(Value::list_depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Size used to bound what a script may allocate: one unit per scalar,
    /// one per character of a string, summed through nested lists.
    pub fn footprint(&self) -> usize {
        match self {
            Value::Str(s) => s.chars().count().max(1),
            Value::List(items) => footprint_of(items).max(1),
            _ => 1,
        }
    }

    /// Quoted rendering used for strings nested inside lists.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

/// Combined [`Value::footprint`] of `items`.
pub fn footprint_of(items: &[Value]) -> usize {
    items
        .iter()
        .map(Value::footprint)
        .fold(0, usize::saturating_add)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("none"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::Job => f.write_str("<job>"),
            Value::Logger => f.write_str("<logger>"),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Functions available to every script without a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Range,
    Abs,
    Min,
    Max,
    Type,
    Print,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        let b = match name {
            "len" => Builtin::Len,
            "str" => Builtin::Str,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "range" => Builtin::Range,
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "type" => Builtin::Type,
            "print" => Builtin::Print,
            _ => return None,
        };
        Some(b)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Range => "range",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Type => "type",
            Builtin::Print => "print",
        }
    }
}
