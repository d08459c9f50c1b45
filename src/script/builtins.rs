// src/script/builtins.rs

//! Operators, builtin functions and the value methods that need no host
//! access.

use std::cmp::Ordering;

use super::ast::{BinOp, UnaryOp};
use super::fault::{ExecutionFault, FaultKind};
use super::value::{Builtin, MAX_LIST_DEPTH, Value, footprint_of};

/// Upper bound for the [`Value::footprint`] of any list or string a script
/// builds.
pub const MAX_SEQUENCE_LEN: usize = 1_000_000;

fn type_error(message: impl Into<String>) -> ExecutionFault {
    ExecutionFault::new(FaultKind::Type, message)
}

fn value_error(message: impl Into<String>) -> ExecutionFault {
    ExecutionFault::new(FaultKind::Value, message)
}

fn check_len(len: usize) -> Result<(), ExecutionFault> {
    if len > MAX_SEQUENCE_LEN {
        return Err(value_error(format!(
            "result would hold {len} items, more than the limit of {MAX_SEQUENCE_LEN}"
        )));
    }
    Ok(())
}

fn too_deep() -> ExecutionFault {
    value_error(format!("lists cannot be nested more than {MAX_LIST_DEPTH} levels deep"))
}

/// Wrap `items` in a list, refusing to nest beyond [`MAX_LIST_DEPTH`] or
/// to grow beyond [`MAX_SEQUENCE_LEN`].
pub fn build_list(items: Vec<Value>) -> Result<Value, ExecutionFault> {
    let inner = items.iter().map(Value::list_depth).max().unwrap_or(0);
    if inner >= MAX_LIST_DEPTH {
        return Err(too_deep());
    }
    check_len(footprint_of(&items))?;
    Ok(Value::List(items))
}

fn overflow() -> ExecutionFault {
    ExecutionFault::new(FaultKind::Overflow, "integer overflow")
}

fn unsupported(op: BinOp, l: &Value, r: &Value) -> ExecutionFault {
    type_error(format!(
        "unsupported operand types for {op}: '{}' and '{}'",
        l.type_name(),
        r.type_name()
    ))
}

pub fn unary(op: UnaryOp, operand: Value) -> Result<Value, ExecutionFault> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(type_error(format!(
            "bad operand type for unary -: '{}'",
            other.type_name()
        ))),
    }
}

pub fn binary(op: BinOp, l: Value, r: Value) -> Result<Value, ExecutionFault> {
    match op {
        BinOp::Add => add(l, r),
        BinOp::Sub => arith(op, l, r, i64::checked_sub, |a, b| a - b),
        BinOp::Mul => mul(l, r),
        BinOp::Div => div(l, r),
        BinOp::Mod => modulo(l, r),
        BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(&l, &r).ok_or_else(|| {
                type_error(format!(
                    "'{op}' not supported between '{}' and '{}'",
                    l.type_name(),
                    r.type_name()
                ))
            })?;
            let result = match (op, ordering) {
                // NaN compares false with everything.
                (_, None) => false,
                (BinOp::Lt, Some(o)) => o == Ordering::Less,
                (BinOp::Le, Some(o)) => o != Ordering::Greater,
                (BinOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinOp::In => contains(&r, &l).map(Value::Bool),
    }
}

fn arith(
    op: BinOp,
    l: Value,
    r: Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, ExecutionFault> {
    match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b).map(Value::Int).ok_or_else(overflow),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(unsupported(op, &l, &r)),
        },
    }
}

fn add(l: Value, r: Value) -> Result<Value, ExecutionFault> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => {
            check_len(a.chars().count() + b.chars().count())?;
            Ok(Value::Str(a + &b))
        }
        (Value::List(mut a), Value::List(b)) => {
            check_len(footprint_of(&a).saturating_add(footprint_of(&b)))?;
            a.extend(b);
            Ok(Value::List(a))
        }
        (l, r) => arith(BinOp::Add, l, r, i64::checked_add, |a, b| a + b),
    }
}

fn repeat_count(n: i64, unit_size: usize) -> Result<usize, ExecutionFault> {
    let n = usize::try_from(n.max(0)).map_err(|_| overflow())?;
    check_len(n.saturating_mul(unit_size))?;
    Ok(n)
}

fn mul(l: Value, r: Value) -> Result<Value, ExecutionFault> {
    match (l, r) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let n = repeat_count(n, s.chars().count())?;
            Ok(Value::Str(s.repeat(n)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let n = repeat_count(n, footprint_of(&items))?;
            let mut out = Vec::with_capacity(items.len() * n);
            for _ in 0..n {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        (l, r) => arith(BinOp::Mul, l, r, i64::checked_mul, |a, b| a * b),
    }
}

fn div(l: Value, r: Value) -> Result<Value, ExecutionFault> {
    match (l.as_f64(), r.as_f64()) {
        (Some(_), Some(b)) if b == 0.0 => Err(ExecutionFault::new(
            FaultKind::ZeroDivision,
            "division by zero",
        )),
        (Some(a), Some(b)) => Ok(Value::Float(a / b)),
        _ => Err(unsupported(BinOp::Div, &l, &r)),
    }
}

fn modulo(l: Value, r: Value) -> Result<Value, ExecutionFault> {
    match (&l, &r) {
        (Value::Int(_), Value::Int(0)) => Err(ExecutionFault::new(
            FaultKind::ZeroDivision,
            "integer modulo by zero",
        )),
        (Value::Int(a), Value::Int(b)) => {
            let rem = a.checked_rem(*b).ok_or_else(overflow)?;
            // Result takes the sign of the divisor.
            if rem != 0 && (rem < 0) != (*b < 0) {
                Ok(Value::Int(rem + b))
            } else {
                Ok(Value::Int(rem))
            }
        }
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => Err(ExecutionFault::new(
                FaultKind::ZeroDivision,
                "float modulo by zero",
            )),
            (Some(a), Some(b)) => {
                let rem = a % b;
                if rem != 0.0 && (rem < 0.0) != (b < 0.0) {
                    Ok(Value::Float(rem + b))
                } else {
                    Ok(Value::Float(rem))
                }
            }
            _ => Err(unsupported(BinOp::Mod, &l, &r)),
        },
    }
}

/// Equality with numeric coercion between ints and floats.
pub fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            l.as_f64() == r.as_f64()
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => l == r,
    }
}

/// Ordering of comparable values.
///
/// Outer `None`: the types are not comparable. Inner `None`: a NaN was involved.
fn compare(l: &Value, r: &Value) -> Option<Option<Ordering>> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(Some(a.cmp(b))),
        (Value::Str(a), Value::Str(b)) => Some(Some(a.cmp(b))),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Some(a.partial_cmp(&b)),
            _ => None,
        },
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, ExecutionFault> {
    match (container, item) {
        (Value::List(items), item) => Ok(items.iter().any(|v| values_equal(v, item))),
        (Value::Str(s), Value::Str(sub)) => Ok(s.contains(sub.as_str())),
        (Value::Str(_), other) => Err(type_error(format!(
            "'in <str>' requires a str as left operand, not '{}'",
            other.type_name()
        ))),
        (other, _) => Err(type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: &Value, len: usize, what: &str) -> Result<usize, ExecutionFault> {
    let i = match index {
        Value::Int(i) => *i,
        other => {
            return Err(type_error(format!(
                "{what} indices must be integers, not '{}'",
                other.type_name()
            )));
        }
    };
    let len = i64::try_from(len).map_err(|_| overflow())?;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(ExecutionFault::new(
            FaultKind::Index,
            format!("{what} index out of range"),
        ));
    }
    usize::try_from(resolved).map_err(|_| overflow())
}

pub fn get_index(container: Value, index: Value) -> Result<Value, ExecutionFault> {
    match container {
        Value::List(mut items) => {
            let i = normalize_index(&index, items.len(), "list")?;
            Ok(items.swap_remove(i))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(&index, chars.len(), "string")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn set_index(container: Value, index: Value, value: Value) -> Result<Value, ExecutionFault> {
    match container {
        Value::List(mut items) => {
            let i = normalize_index(&index, items.len(), "list")?;
            // The other items already respect the depth limit.
            if value.list_depth() >= MAX_LIST_DEPTH {
                return Err(too_deep());
            }
            let size = (footprint_of(&items) - items[i].footprint()).saturating_add(value.footprint());
            check_len(size)?;
            items[i] = value;
            Ok(Value::List(items))
        }
        other => Err(type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// Items produced by `for x in value`.
pub fn iterate(value: Value) -> Result<Vec<Value>, ExecutionFault> {
    match value {
        Value::List(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ExecutionFault> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(type_error(format!(
            "{name}() takes {expected} argument(s) ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, value: &Value) -> Result<i64, ExecutionFault> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(type_error(format!(
            "{name}() expects an int, not '{}'",
            other.type_name()
        ))),
    }
}

/// Call a host-independent builtin. `print` is handled by the interpreter.
pub fn call_builtin(builtin: Builtin, args: Vec<Value>) -> Result<Value, ExecutionFault> {
    let name = builtin.name();
    match builtin {
        Builtin::Len => {
            check_arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                other => {
                    return Err(type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )));
                }
            };
            i64::try_from(len).map(Value::Int).map_err(|_| overflow())
        }
        Builtin::Str => {
            check_arity(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(Value::to_string).unwrap_or_default()))
        }
        Builtin::Int => {
            check_arity(name, &args, 1, 1)?;
            to_int(&args[0])
        }
        Builtin::Float => {
            check_arity(name, &args, 1, 1)?;
            to_float(&args[0])
        }
        Builtin::Range => {
            check_arity(name, &args, 1, 3)?;
            let (start, stop, step) = match args.len() {
                1 => (0, int_arg(name, &args[0])?, 1),
                2 => (int_arg(name, &args[0])?, int_arg(name, &args[1])?, 1),
                _ => (
                    int_arg(name, &args[0])?,
                    int_arg(name, &args[1])?,
                    int_arg(name, &args[2])?,
                ),
            };
            range(start, stop, step)
        }
        Builtin::Abs => {
            check_arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(overflow),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }
        Builtin::Min | Builtin::Max => {
            let items = match args.as_slice() {
                [Value::List(items)] => items.clone(),
                _ => args,
            };
            extreme(name, items, builtin == Builtin::Max)
        }
        Builtin::Type => {
            check_arity(name, &args, 1, 1)?;
            Ok(Value::Str(args[0].type_name().to_string()))
        }
        Builtin::Print => Ok(Value::None),
    }
}

fn to_int(value: &Value) -> Result<Value, ExecutionFault> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if !f.is_finite() || *f >= i64::MAX as f64 || *f < i64::MIN as f64 {
                return Err(value_error(format!("cannot convert float {f} to int")));
            }
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| value_error(format!("invalid literal for int(): {s:?}"))),
        other => Err(type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> Result<Value, ExecutionFault> {
    match value {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| value_error(format!("could not convert string to float: {s:?}"))),
        other => Err(type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn range(start: i64, stop: i64, step: i64) -> Result<Value, ExecutionFault> {
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero"));
    }

    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let step_abs = i128::from(step).abs();
    let count = if span <= 0 {
        0
    } else {
        (span + step_abs - 1) / step_abs
    };

    if count > MAX_SEQUENCE_LEN as i128 {
        return Err(value_error(format!(
            "range() would produce more than {MAX_SEQUENCE_LEN} items"
        )));
    }

    let mut items = Vec::with_capacity(count as usize);
    let mut current = i128::from(start);
    for _ in 0..count {
        // Every produced value lies between start and stop, so it fits in i64.
        items.push(Value::Int(current as i64));
        current += i128::from(step);
    }
    Ok(Value::List(items))
}

fn extreme(name: &str, items: Vec<Value>, want_max: bool) -> Result<Value, ExecutionFault> {
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| value_error(format!("{name}() arg is an empty sequence")))?;

    for item in iter {
        let ordering = compare(&item, &best).ok_or_else(|| {
            type_error(format!(
                "'{}' and '{}' cannot be compared",
                item.type_name(),
                best.type_name()
            ))
        })?;
        let better = match ordering {
            Some(Ordering::Greater) => want_max,
            Some(Ordering::Less) => !want_max,
            _ => false,
        };
        if better {
            best = item;
        }
    }
    Ok(best)
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Result<&'a str, ExecutionFault> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_error(format!(
            "{method}() argument must be str, not '{}'",
            other.type_name()
        ))),
    }
}

/// Methods on `str` values.
pub fn str_method(s: &str, method: &str, args: Vec<Value>) -> Result<Value, ExecutionFault> {
    match method {
        "upper" => {
            check_arity(method, &args, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        "lower" => {
            check_arity(method, &args, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        "strip" => {
            check_arity(method, &args, 0, 0)?;
            Ok(Value::Str(s.trim().to_string()))
        }
        "split" => {
            check_arity(method, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg(method, sep)?;
                    if sep.is_empty() {
                        return Err(value_error("empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "startswith" => {
            check_arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(method, &args[0])?)))
        }
        "endswith" => {
            check_arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(method, &args[0])?)))
        }
        "replace" => {
            check_arity(method, &args, 2, 2)?;
            let from = str_arg(method, &args[0])?;
            let to = str_arg(method, &args[1])?;
            let hits = s.matches(from).count();
            let len = (s.chars().count() - hits * from.chars().count())
                .saturating_add(hits.saturating_mul(to.chars().count()));
            check_len(len)?;
            Ok(Value::Str(s.replace(from, to)))
        }
        "join" => {
            check_arity(method, &args, 1, 1)?;
            let items = match &args[0] {
                Value::List(items) => items,
                other => {
                    return Err(type_error(format!(
                        "join() expects a list, not '{}'",
                        other.type_name()
                    )));
                }
            };
            let parts = items
                .iter()
                .map(|item| str_arg(method, item).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            let len = parts
                .iter()
                .map(|p| p.chars().count())
                .fold(0usize, usize::saturating_add)
                .saturating_add(parts.len().saturating_sub(1).saturating_mul(s.chars().count()));
            check_len(len)?;
            Ok(Value::Str(parts.join(s)))
        }
        other => Err(type_error(format!("'str' object has no method '{other}'"))),
    }
}

/// Methods on `list` values. Lists are values, so there are no mutating
/// methods; build a new list with `+` instead.
pub fn list_method(items: &[Value], method: &str, args: Vec<Value>) -> Result<Value, ExecutionFault> {
    match method {
        "index" => {
            check_arity(method, &args, 1, 1)?;
            items
                .iter()
                .position(|v| values_equal(v, &args[0]))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| value_error(format!("{} is not in list", args[0].repr())))
        }
        "count" => {
            check_arity(method, &args, 1, 1)?;
            let n = items.iter().filter(|v| values_equal(v, &args[0])).count();
            Ok(Value::Int(n as i64))
        }
        "append" | "extend" | "insert" | "pop" | "remove" => Err(type_error(format!(
            "lists cannot be modified in place; use `xs = xs + [item]` instead of xs.{method}()"
        ))),
        other => Err(type_error(format!("'list' object has no method '{other}'"))),
    }
}
