// src/script/ast.rs

//! Syntax tree produced by the parser and consumed by the validator and the
//! compiler.

use std::fmt;

/// A parsed job script.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
    },
    /// `target op= value`
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Pass,
    Raise(Expr),
    /// `import a.b`
    Import {
        module: String,
    },
    /// `from a.b import x, y`
    FromImport {
        module: String,
        names: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
    depth: u32,
}

impl Expr {
    pub fn new(kind: ExprKind, line: u32) -> Self {
        let depth = kind.child_depth().saturating_add(1);
        Self { kind, line, depth }
    }

    /// Height of this subtree; 1 for a leaf.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    Name(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Attribute {
        object: Box<Expr>,
        name: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

impl ExprKind {
    /// Depth of the deepest direct child, 0 for leaves. Reads the cached
    /// depth of each child, so this never recurses.
    fn child_depth(&self) -> u32 {
        match self {
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::None
            | ExprKind::Name(_) => 0,
            ExprKind::List(items) => items.iter().map(Expr::depth).max().unwrap_or(0),
            ExprKind::Unary { operand, .. } => operand.depth(),
            ExprKind::Attribute { object, .. } => object.depth(),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                left.depth().max(right.depth())
            }
            ExprKind::Index { object, index } => object.depth().max(index.depth()),
            ExprKind::Call { callee, args } => args
                .iter()
                .map(Expr::depth)
                .fold(callee.depth(), u32::max),
        }
    }

    /// Short human-readable description, used in compile errors.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => "literal",
            ExprKind::Bool(_) | ExprKind::None => "literal",
            ExprKind::Name(_) => "name",
            ExprKind::List(_) => "list display",
            ExprKind::Unary { .. } | ExprKind::Binary { .. } => "operator expression",
            ExprKind::Logical { .. } => "boolean expression",
            ExprKind::Call { .. } => "function call",
            ExprKind::Attribute { .. } => "attribute",
            ExprKind::Index { .. } => "subscript",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}
