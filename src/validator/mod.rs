// src/validator/mod.rs

//! Static admission gate for job scripts.
//!
//! [`validate`] walks a parsed [`Program`] and rejects the first construct
//! that the [`ValidationPolicy`] denies. It never compiles or runs anything.

pub mod policy;

use thiserror::Error;

use crate::script::ast::{Expr, ExprKind, Program, Stmt, StmtKind};

pub use policy::{ConstructKind, DEFAULT_DENIED_NAMES, ValidationPolicy, Verdict};

/// A disallowed construct found before execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ValidationError {
    pub kind: ConstructKind,
    pub line: u32,
    pub reason: String,
}

/// Validate `program` against `policy`.
pub fn validate(program: &Program, policy: &ValidationPolicy) -> Result<(), ValidationError> {
    let walker = Walker { policy };
    walker.block(&program.body)
}

/// A validator bound to one policy.
#[derive(Debug, Clone, Default)]
pub struct ScriptValidator {
    policy: ValidationPolicy,
}

impl ScriptValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn validate(&self, program: &Program) -> Result<(), ValidationError> {
        validate(program, &self.policy)
    }
}

struct Walker<'a> {
    policy: &'a ValidationPolicy,
}

impl Walker<'_> {
    fn check(
        &self,
        kind: ConstructKind,
        line: u32,
        reason: impl FnOnce() -> String,
    ) -> Result<(), ValidationError> {
        if self.policy.is_denied(kind) {
            return Err(ValidationError {
                kind,
                line,
                reason: reason(),
            });
        }
        Ok(())
    }

    fn name(&self, name: &str, line: u32) -> Result<(), ValidationError> {
        if self.policy.is_denied_name(name) {
            self.check(ConstructKind::DeniedName, line, || {
                format!("use of '{name}' is not allowed")
            })?;
        }
        if name.starts_with("__") {
            self.check(ConstructKind::PrivateName, line, || {
                format!("access to private name '{name}' is not allowed")
            })?;
        }
        Ok(())
    }

    fn block(&self, body: &[Stmt]) -> Result<(), ValidationError> {
        body.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn stmt(&self, stmt: &Stmt) -> Result<(), ValidationError> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Assign { target, value } | StmtKind::AugAssign { target, value, .. } => {
                self.expr(target)?;
                self.expr(value)
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(cond)?;
                self.block(then_body)?;
                self.block(else_body)
            }
            StmtKind::While { cond, body } => {
                self.check(ConstructKind::WhileLoop, line, || {
                    "while loops are not allowed".to_string()
                })?;
                self.expr(cond)?;
                self.block(body)
            }
            StmtKind::For { var, iter, body } => {
                self.check(ConstructKind::ForLoop, line, || {
                    "for loops are not allowed".to_string()
                })?;
                self.name(var, line)?;
                self.expr(iter)?;
                self.block(body)
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Pass => Ok(()),
            StmtKind::Raise(value) => {
                self.check(ConstructKind::Raise, line, || {
                    "raise statements are not allowed".to_string()
                })?;
                self.expr(value)
            }
            StmtKind::Import { module } => {
                self.check(ConstructKind::Import, line, || {
                    format!("import of module '{module}' is not allowed")
                })?;
                self.module(module, line)
            }
            StmtKind::FromImport { module, names } => {
                self.check(ConstructKind::Import, line, || {
                    format!("import from module '{module}' is not allowed")
                })?;
                self.module(module, line)?;
                names.iter().try_for_each(|name| self.name(name, line))
            }
        }
    }

    fn module(&self, module: &str, line: u32) -> Result<(), ValidationError> {
        module.split('.').try_for_each(|part| self.name(part, line))
    }

    fn expr(&self, expr: &Expr) -> Result<(), ValidationError> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::None => Ok(()),
            ExprKind::Name(name) => self.name(name, line),
            ExprKind::List(items) => items.iter().try_for_each(|item| self.expr(item)),
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::Call { callee, args } => {
                self.check(ConstructKind::Call, line, || {
                    "function calls are not allowed".to_string()
                })?;
                self.expr(callee)?;
                args.iter().try_for_each(|arg| self.expr(arg))
            }
            ExprKind::Attribute { object, name } => {
                self.check(ConstructKind::Attribute, line, || {
                    format!("attribute access '.{name}' is not allowed")
                })?;
                if name.starts_with('_') {
                    self.check(ConstructKind::PrivateAttribute, line, || {
                        format!("access to private attribute '{name}' is not allowed")
                    })?;
                }
                self.expr(object)
            }
            ExprKind::Index { object, index } => {
                self.check(ConstructKind::Subscript, line, || {
                    "subscripts are not allowed".to_string()
                })?;
                self.expr(object)?;
                self.expr(index)
            }
        }
    }
}
