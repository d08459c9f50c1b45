// src/script/vm.rs

//! Async interpreter for [`CompiledUnit`]s.
//!
//! The interpreter never blocks a worker thread: `job.sleep` awaits a Tokio
//! timer, and long loops periodically yield back to the scheduler.

use std::time::Duration;

use super::builtins;
use super::compiler::{CompiledUnit, Op};
use super::fault::{ExecutionFault, FaultKind};
use super::value::{Bindings, Builtin, Value};

/// Default title used by `job.notify(message)`.
pub const DEFAULT_NOTIFY_TITLE: &str = "Job Message";

/// Instructions executed between two cooperative yields.
const YIELD_EVERY: u64 = 256;

/// Log levels reachable through `job.logger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Capabilities the host exposes to a running script.
pub trait ScriptHost: Send + Sync {
    fn job_name(&self) -> &str;
    fn notify(&self, message: &str, title: &str);
    fn log(&self, level: ScriptLogLevel, message: &str);
}

/// Execute `unit` with `locals` as the mutable namespace.
///
/// Reads fall back to `globals` and then to builtins; writes always go to
/// `locals`.
pub async fn execute(
    unit: &CompiledUnit,
    locals: &mut Bindings,
    globals: &Bindings,
    host: &dyn ScriptHost,
) -> Result<(), ExecutionFault> {
    let mut machine = Machine {
        unit,
        locals,
        globals,
        host,
        stack: Vec::new(),
        iters: Vec::new(),
        pc: 0,
    };
    machine.run().await
}

struct Machine<'a> {
    unit: &'a CompiledUnit,
    locals: &'a mut Bindings,
    globals: &'a Bindings,
    host: &'a dyn ScriptHost,
    stack: Vec<Value>,
    iters: Vec<std::vec::IntoIter<Value>>,
    pc: usize,
}

fn underflow() -> ExecutionFault {
    ExecutionFault::aborted("internal error: value stack underflow")
}

fn type_error(message: impl Into<String>) -> ExecutionFault {
    ExecutionFault::new(FaultKind::Type, message)
}

impl Machine<'_> {
    async fn run(&mut self) -> Result<(), ExecutionFault> {
        let unit = self.unit;
        let mut executed: u64 = 0;

        while self.pc < unit.code.len() {
            let instr = &unit.code[self.pc];
            self.pc += 1;

            executed += 1;
            if executed % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }

            if let Err(fault) = self.step(&instr.op).await {
                return Err(fault.at_line(instr.line));
            }
        }

        Ok(())
    }

    fn pop(&mut self) -> Result<Value, ExecutionFault> {
        self.stack.pop().ok_or_else(underflow)
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, ExecutionFault> {
        let at = self.stack.len().checked_sub(n).ok_or_else(underflow)?;
        Ok(self.stack.split_off(at))
    }

    fn peek(&self) -> Result<&Value, ExecutionFault> {
        self.stack.last().ok_or_else(underflow)
    }

    fn lookup(&self, name: &str) -> Result<Value, ExecutionFault> {
        if let Some(value) = self.locals.get(name).or_else(|| self.globals.get(name)) {
            return Ok(value.clone());
        }
        Builtin::lookup(name).map(Value::Builtin).ok_or_else(|| {
            ExecutionFault::new(FaultKind::Name, format!("name '{name}' is not defined"))
        })
    }

    async fn step(&mut self, op: &Op) -> Result<(), ExecutionFault> {
        match op {
            Op::Const(value) => self.stack.push(value.clone()),
            Op::Load(name) => {
                let value = self.lookup(name)?;
                self.stack.push(value);
            }
            Op::Store(name) => {
                let value = self.pop()?;
                self.locals.insert(name.clone(), value);
            }
            Op::GetAttr(name) => {
                let object = self.pop()?;
                let value = self.get_attr(&object, name)?;
                self.stack.push(value);
            }
            Op::GetIndex => {
                let index = self.pop()?;
                let container = self.pop()?;
                self.stack.push(builtins::get_index(container, index)?);
            }
            Op::SetIndex => {
                let value = self.pop()?;
                let index = self.pop()?;
                let container = self.pop()?;
                self.stack.push(builtins::set_index(container, index, value)?);
            }
            Op::Dup2 => {
                let top = self.pop_n(2)?;
                self.stack.extend(top.iter().cloned());
                self.stack.extend(top);
            }
            Op::BuildList(n) => {
                let items = self.pop_n(*n)?;
                self.stack.push(builtins::build_list(items)?);
            }
            Op::Unary(op) => {
                let operand = self.pop()?;
                self.stack.push(builtins::unary(*op, operand)?);
            }
            Op::Binary(op) => {
                let right = self.pop()?;
                let left = self.pop()?;
                self.stack.push(builtins::binary(*op, left, right)?);
            }
            Op::Call(argc) => {
                let args = self.pop_n(*argc)?;
                let callee = self.pop()?;
                let result = self.call(callee, args)?;
                self.stack.push(result);
            }
            Op::CallMethod(name, argc) => {
                let args = self.pop_n(*argc)?;
                let receiver = self.pop()?;
                let result = self.call_method(receiver, name, args).await?;
                self.stack.push(result);
            }
            Op::Jump(target) => self.pc = *target,
            Op::JumpIfFalse(target) => {
                if !self.pop()?.is_truthy() {
                    self.pc = *target;
                }
            }
            Op::JumpIfFalseOrPop(target) => {
                if self.peek()?.is_truthy() {
                    self.pop()?;
                } else {
                    self.pc = *target;
                }
            }
            Op::JumpIfTrueOrPop(target) => {
                if self.peek()?.is_truthy() {
                    self.pc = *target;
                } else {
                    self.pop()?;
                }
            }
            Op::Pop => {
                self.pop()?;
            }
            Op::Raise => {
                let value = self.pop()?;
                return Err(ExecutionFault::new(FaultKind::Raised, value.to_string()));
            }
            Op::IterStart => {
                let iterable = self.pop()?;
                let items = builtins::iterate(iterable)?;
                self.iters.push(items.into_iter());
            }
            Op::IterNext(exit) => match self.iters.last_mut().and_then(Iterator::next) {
                Some(item) => self.stack.push(item),
                None => {
                    self.iters.pop();
                    self.pc = *exit;
                }
            },
            Op::IterDrop => {
                self.iters.pop();
            }
        }
        Ok(())
    }

    fn get_attr(&self, object: &Value, name: &str) -> Result<Value, ExecutionFault> {
        match (object, name) {
            (Value::Job, "name") => Ok(Value::Str(self.host.job_name().to_string())),
            (Value::Job, "logger") => Ok(Value::Logger),
            (Value::Job, "notify" | "sleep") => Err(type_error(format!(
                "method '{name}' of 'job' must be called"
            ))),
            (other, _) => Err(type_error(format!(
                "'{}' object has no attribute '{name}'",
                other.type_name()
            ))),
        }
    }

    fn call(&self, callee: Value, args: Vec<Value>) -> Result<Value, ExecutionFault> {
        match callee {
            Value::Builtin(Builtin::Print) => {
                let line = args
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.host.log(ScriptLogLevel::Info, &line);
                Ok(Value::None)
            }
            Value::Builtin(builtin) => builtins::call_builtin(builtin, args),
            other => Err(type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    async fn call_method(
        &self,
        receiver: Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ExecutionFault> {
        match receiver {
            Value::Job => self.job_method(method, args).await,
            Value::Logger => self.logger_method(method, args),
            Value::Str(s) => builtins::str_method(&s, method, args),
            Value::List(items) => builtins::list_method(&items, method, args),
            other => Err(type_error(format!(
                "'{}' object has no method '{method}'",
                other.type_name()
            ))),
        }
    }

    async fn job_method(&self, method: &str, args: Vec<Value>) -> Result<Value, ExecutionFault> {
        match method {
            "notify" => {
                let (message, title) = match args.as_slice() {
                    [message] => (message.to_string(), DEFAULT_NOTIFY_TITLE.to_string()),
                    [message, title] => (message.to_string(), title.to_string()),
                    _ => {
                        return Err(type_error(format!(
                            "notify() takes 1 or 2 arguments ({} given)",
                            args.len()
                        )));
                    }
                };
                self.host.notify(&message, &title);
                Ok(Value::None)
            }
            "sleep" => {
                let secs = match args.as_slice() {
                    [secs] => secs.as_f64().ok_or_else(|| {
                        type_error(format!(
                            "sleep() expects a number, not '{}'",
                            secs.type_name()
                        ))
                    })?,
                    _ => {
                        return Err(type_error(format!(
                            "sleep() takes 1 argument ({} given)",
                            args.len()
                        )));
                    }
                };
                let duration = Duration::try_from_secs_f64(secs).map_err(|_| {
                    ExecutionFault::new(
                        FaultKind::Value,
                        format!("sleep length must be a non-negative finite number, got {secs}"),
                    )
                })?;
                tokio::time::sleep(duration).await;
                Ok(Value::None)
            }
            other => Err(type_error(format!("'job' object has no method '{other}'"))),
        }
    }

    fn logger_method(&self, method: &str, args: Vec<Value>) -> Result<Value, ExecutionFault> {
        let level = match method {
            "debug" => ScriptLogLevel::Debug,
            "info" => ScriptLogLevel::Info,
            "warning" | "warn" => ScriptLogLevel::Warning,
            "error" => ScriptLogLevel::Error,
            other => {
                return Err(type_error(format!(
                    "'logger' object has no method '{other}'"
                )));
            }
        };
        let message = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.host.log(level, &message);
        Ok(Value::None)
    }
}
