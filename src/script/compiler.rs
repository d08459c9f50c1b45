// src/script/compiler.rs

//! Lowers a validated [`Program`] into a flat instruction list.
//!
//! The interpreter in [`super::vm`] runs these instructions in a single loop,
//! which is what lets it `.await` in the middle of a script (e.g. for
//! `job.sleep`) without recursion.

use thiserror::Error;

use super::ast::{BinOp, Expr, ExprKind, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
use super::value::Value;

/// A script that failed to compile after passing validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compile error at line {line}: {message}")]
pub struct CompileError {
    pub line: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Const(Value),
    Load(String),
    Store(String),
    GetAttr(String),
    /// `[container, index] -> [item]`
    GetIndex,
    /// `[container, index, value] -> [updated container]`
    SetIndex,
    /// Duplicate the two topmost values.
    Dup2,
    BuildList(usize),
    Unary(UnaryOp),
    Binary(BinOp),
    /// `[callee, args...] -> [result]`
    Call(usize),
    /// `[receiver, args...] -> [result]`
    CallMethod(String, usize),
    Jump(usize),
    /// Pops the condition.
    JumpIfFalse(usize),
    /// Short-circuit `and`: jump keeping the value if falsy, else pop it.
    JumpIfFalseOrPop(usize),
    /// Short-circuit `or`: jump keeping the value if truthy, else pop it.
    JumpIfTrueOrPop(usize),
    Pop,
    Raise,
    /// Pops an iterable and pushes an iterator onto the iterator stack.
    IterStart,
    /// Pushes the next item, or drops the iterator and jumps when exhausted.
    IterNext(usize),
    /// Drops the innermost iterator (used by `break` inside `for`).
    IterDrop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    pub line: u32,
}

/// Executable form of a job script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledUnit {
    pub code: Vec<Instr>,
}

impl CompiledUnit {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// Compile a parsed program.
pub fn compile(program: &Program) -> Result<CompiledUnit, CompileError> {
    let mut compiler = Compiler::default();
    compiler.block(&program.body)?;
    Ok(CompiledUnit {
        code: compiler.code,
    })
}

struct LoopCtx {
    continue_target: usize,
    break_jumps: Vec<usize>,
    is_for: bool,
}

#[derive(Default)]
struct Compiler {
    code: Vec<Instr>,
    loops: Vec<LoopCtx>,
}

fn error(line: u32, message: impl Into<String>) -> CompileError {
    CompileError {
        line,
        message: message.into(),
    }
}

impl Compiler {
    fn emit(&mut self, op: Op, line: u32) -> usize {
        self.code.push(Instr { op, line });
        self.code.len() - 1
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.code[at].op {
            Op::Jump(t)
            | Op::JumpIfFalse(t)
            | Op::JumpIfFalseOrPop(t)
            | Op::JumpIfTrueOrPop(t)
            | Op::IterNext(t) => *t = target,
            _ => {}
        }
    }

    fn block(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        for stmt in body {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.expr(expr)?;
                self.emit(Op::Pop, line);
            }
            StmtKind::Assign { target, value } => self.assign(target, value, line)?,
            StmtKind::AugAssign { target, op, value } => {
                self.aug_assign(target, *op, value, line)?
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(cond)?;
                let to_else = self.emit(Op::JumpIfFalse(0), line);
                self.block(then_body)?;
                if else_body.is_empty() {
                    let end = self.here();
                    self.patch(to_else, end);
                } else {
                    let to_end = self.emit(Op::Jump(0), line);
                    let else_start = self.here();
                    self.patch(to_else, else_start);
                    self.block(else_body)?;
                    let end = self.here();
                    self.patch(to_end, end);
                }
            }
            StmtKind::While { cond, body } => {
                let start = self.here();
                self.expr(cond)?;
                let exit = self.emit(Op::JumpIfFalse(0), line);
                self.loops.push(LoopCtx {
                    continue_target: start,
                    break_jumps: Vec::new(),
                    is_for: false,
                });
                self.block(body)?;
                self.emit(Op::Jump(start), line);
                self.finish_loop(exit);
            }
            StmtKind::For { var, iter, body } => {
                self.expr(iter)?;
                self.emit(Op::IterStart, line);
                let top = self.emit(Op::IterNext(0), line);
                self.emit(Op::Store(var.clone()), line);
                self.loops.push(LoopCtx {
                    continue_target: top,
                    break_jumps: Vec::new(),
                    is_for: true,
                });
                self.block(body)?;
                self.emit(Op::Jump(top), line);
                self.finish_loop(top);
            }
            StmtKind::Break => {
                let is_for = match self.loops.last() {
                    Some(ctx) => ctx.is_for,
                    None => return Err(error(line, "'break' outside loop")),
                };
                if is_for {
                    self.emit(Op::IterDrop, line);
                }
                let jump = self.emit(Op::Jump(0), line);
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.break_jumps.push(jump);
                }
            }
            StmtKind::Continue => {
                let target = match self.loops.last() {
                    Some(ctx) => ctx.continue_target,
                    None => return Err(error(line, "'continue' not properly in loop")),
                };
                self.emit(Op::Jump(target), line);
            }
            StmtKind::Pass => {}
            StmtKind::Raise(value) => {
                self.expr(value)?;
                self.emit(Op::Raise, line);
            }
            StmtKind::Import { module } | StmtKind::FromImport { module, .. } => {
                return Err(error(
                    line,
                    format!("cannot import '{module}': scripts have no module system"),
                ));
            }
        }
        Ok(())
    }

    /// Pop the innermost loop and point its exit and `break` jumps past it.
    fn finish_loop(&mut self, exit_jump: usize) {
        let end = self.here();
        self.patch(exit_jump, end);
        if let Some(ctx) = self.loops.pop() {
            for jump in ctx.break_jumps {
                self.patch(jump, end);
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, line: u32) -> Result<(), CompileError> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.expr(value)?;
                self.emit(Op::Store(name.clone()), line);
            }
            ExprKind::Index { object, index } => {
                let name = indexed_name(object, line)?;
                self.emit(Op::Load(name.clone()), line);
                self.expr(index)?;
                self.expr(value)?;
                self.emit(Op::SetIndex, line);
                self.emit(Op::Store(name), line);
            }
            other => return Err(invalid_target(other, line)),
        }
        Ok(())
    }

    fn aug_assign(
        &mut self,
        target: &Expr,
        op: BinOp,
        value: &Expr,
        line: u32,
    ) -> Result<(), CompileError> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.emit(Op::Load(name.clone()), line);
                self.expr(value)?;
                self.emit(Op::Binary(op), line);
                self.emit(Op::Store(name.clone()), line);
            }
            ExprKind::Index { object, index } => {
                let name = indexed_name(object, line)?;
                self.emit(Op::Load(name.clone()), line);
                self.expr(index)?;
                self.emit(Op::Dup2, line);
                self.emit(Op::GetIndex, line);
                self.expr(value)?;
                self.emit(Op::Binary(op), line);
                self.emit(Op::SetIndex, line);
                self.emit(Op::Store(name), line);
            }
            other => return Err(invalid_target(other, line)),
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Int(v) => {
                self.emit(Op::Const(Value::Int(*v)), line);
            }
            ExprKind::Float(v) => {
                self.emit(Op::Const(Value::Float(*v)), line);
            }
            ExprKind::Str(s) => {
                self.emit(Op::Const(Value::Str(s.clone())), line);
            }
            ExprKind::Bool(b) => {
                self.emit(Op::Const(Value::Bool(*b)), line);
            }
            ExprKind::None => {
                self.emit(Op::Const(Value::None), line);
            }
            ExprKind::Name(name) => {
                self.emit(Op::Load(name.clone()), line);
            }
            ExprKind::List(items) => {
                for item in items {
                    self.expr(item)?;
                }
                self.emit(Op::BuildList(items.len()), line);
            }
            ExprKind::Unary { op, operand } => {
                self.expr(operand)?;
                self.emit(Op::Unary(*op), line);
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Op::Binary(*op), line);
            }
            ExprKind::Logical { op, left, right } => {
                self.expr(left)?;
                let jump = match op {
                    LogicalOp::And => self.emit(Op::JumpIfFalseOrPop(0), line),
                    LogicalOp::Or => self.emit(Op::JumpIfTrueOrPop(0), line),
                };
                self.expr(right)?;
                let end = self.here();
                self.patch(jump, end);
            }
            ExprKind::Call { callee, args } => {
                if let ExprKind::Attribute { object, name } = &callee.kind {
                    self.expr(object)?;
                    for arg in args {
                        self.expr(arg)?;
                    }
                    self.emit(Op::CallMethod(name.clone(), args.len()), line);
                } else {
                    self.expr(callee)?;
                    for arg in args {
                        self.expr(arg)?;
                    }
                    self.emit(Op::Call(args.len()), line);
                }
            }
            ExprKind::Attribute { object, name } => {
                self.expr(object)?;
                self.emit(Op::GetAttr(name.clone()), line);
            }
            ExprKind::Index { object, index } => {
                self.expr(object)?;
                self.expr(index)?;
                self.emit(Op::GetIndex, line);
            }
        }
        Ok(())
    }
}

fn indexed_name(object: &Expr, line: u32) -> Result<String, CompileError> {
    match &object.kind {
        ExprKind::Name(name) => Ok(name.clone()),
        other => Err(error(
            line,
            format!(
                "cannot assign into a subscript of a {}; only `name[index] = value` is supported",
                other.describe()
            ),
        )),
    }
}

fn invalid_target(kind: &ExprKind, line: u32) -> CompileError {
    match kind {
        ExprKind::Attribute { name, .. } => {
            error(line, format!("cannot assign to attribute '{name}'"))
        }
        other => error(line, format!("cannot assign to {}", other.describe())),
    }
}
