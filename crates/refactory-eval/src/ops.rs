//! Operators: arithmetic with Python's numeric tower, comparisons,
//! membership, indexing and slicing.
//!
//! Integers are 64-bit; results that would leave that range raise
//! `OverflowError` instead of promoting to a big integer.

use std::cmp::Ordering;
use std::rc::Rc;

use refactory_ast::{BinaryOperator, CompareOperator, UnaryOperator};

use crate::exception::ExceptionKind;
use crate::interpreter::{Eval, Machine, raise};
use crate::value::{Number, Range, Value, ValueIter, is_same, py_cmp, py_eq};

fn overflow<T>() -> Eval<T> {
    raise(ExceptionKind::OverflowError, "integer overflow")
}

fn unsupported<T>(op: &str, left: &Value, right: &Value) -> Eval<T> {
    raise(
        ExceptionKind::TypeError,
        format!(
            "unsupported operand type(s) for {op}: '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ),
    )
}

pub fn binary(machine: &mut Machine, op: BinaryOperator, left: &Value, right: &Value) -> Eval<Value> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
            match op {
                BinaryOperator::BitAnd => return Ok(Value::Bool(a & b)),
                BinaryOperator::BitOr => return Ok(Value::Bool(a | b)),
                BinaryOperator::BitXor => return Ok(Value::Bool(a ^ b)),
                _ => {}
            }
        }
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => int_op(op, a, b),
            (a, b) => float_op(op, a.as_f64(), b.as_f64(), left, right),
        };
    }

    match (op, left, right) {
        (BinaryOperator::Add, Value::Str(a), Value::Str(b)) => {
            machine.check_len(a.chars().count() + b.chars().count())?;
            Ok(Value::Str(Rc::from(format!("{a}{b}"))))
        }
        (BinaryOperator::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            machine.check_len(items.len())?;
            machine.tick(items.len() as u64)?;
            Ok(Value::list(items))
        }
        (BinaryOperator::Add, Value::Tuple(a), Value::Tuple(b)) => {
            let items: Vec<Value> = a.iter().chain(b.iter()).cloned().collect();
            machine.check_len(items.len())?;
            Ok(Value::tuple(items))
        }
        (BinaryOperator::Multiply, seq, count) | (BinaryOperator::Multiply, count, seq)
            if count.as_index().is_some()
                && matches!(seq, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            let times = usize::try_from(count.as_index().unwrap_or(0)).unwrap_or(0);
            repeat(machine, seq, times)
        }
        _ => unsupported(op.symbol(), left, right),
    }
}

fn repeat(machine: &mut Machine, seq: &Value, times: usize) -> Eval<Value> {
    let len = match seq {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        _ => 0,
    };
    let Some(total) = len.checked_mul(times) else {
        return overflow();
    };
    machine.check_len(total)?;
    machine.tick(total as u64)?;
    Ok(match seq {
        Value::Str(s) => Value::Str(Rc::from(s.repeat(times))),
        Value::List(items) => {
            let items = items.borrow();
            Value::list(items.iter().cloned().cycle().take(total).collect())
        }
        Value::Tuple(items) => Value::tuple(items.iter().cloned().cycle().take(total).collect()),
        other => other.clone(),
    })
}

fn int_op(op: BinaryOperator, a: i64, b: i64) -> Eval<Value> {
    let checked = |result: Option<i64>| result.map(Value::Int).map_or_else(overflow, Ok);
    match op {
        BinaryOperator::Add => checked(a.checked_add(b)),
        BinaryOperator::Subtract => checked(a.checked_sub(b)),
        BinaryOperator::Multiply => checked(a.checked_mul(b)),
        BinaryOperator::Divide => {
            if b == 0 {
                return raise(ExceptionKind::ZeroDivisionError, "division by zero");
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinaryOperator::FloorDivide => {
            if b == 0 {
                return raise(
                    ExceptionKind::ZeroDivisionError,
                    "integer division or modulo by zero",
                );
            }
            let (Some(q), Some(r)) = (a.checked_div(b), a.checked_rem(b)) else {
                return overflow();
            };
            Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q }))
        }
        BinaryOperator::Modulo => {
            if b == 0 {
                return raise(ExceptionKind::ZeroDivisionError, "integer modulo by zero");
            }
            let r = a.checked_rem(b).unwrap_or(0);
            Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
        }
        BinaryOperator::Power => {
            if b < 0 {
                if a == 0 {
                    return raise(
                        ExceptionKind::ZeroDivisionError,
                        "0.0 cannot be raised to a negative power",
                    );
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            match (a, u32::try_from(b)) {
                (0 | 1, _) => Ok(Value::Int(if b == 0 { 1 } else { a })),
                (-1, _) => Ok(Value::Int(if b % 2 == 0 { 1 } else { -1 })),
                (_, Ok(exp)) => checked(a.checked_pow(exp)),
                (_, Err(_)) => overflow(),
            }
        }
        BinaryOperator::BitAnd => Ok(Value::Int(a & b)),
        BinaryOperator::BitOr => Ok(Value::Int(a | b)),
        BinaryOperator::BitXor => Ok(Value::Int(a ^ b)),
        BinaryOperator::LeftShift => {
            if b < 0 {
                return raise(ExceptionKind::ValueError, "negative shift count");
            }
            if a == 0 {
                return Ok(Value::Int(0));
            }
            if b >= 63 {
                return overflow();
            }
            let shifted = a << b;
            if shifted >> b != a {
                return overflow();
            }
            Ok(Value::Int(shifted))
        }
        BinaryOperator::RightShift => {
            if b < 0 {
                return raise(ExceptionKind::ValueError, "negative shift count");
            }
            Ok(Value::Int(if b >= 64 { if a < 0 { -1 } else { 0 } } else { a >> b }))
        }
    }
}

fn float_op(op: BinaryOperator, a: f64, b: f64, left: &Value, right: &Value) -> Eval<Value> {
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => {
            if b == 0.0 {
                return raise(ExceptionKind::ZeroDivisionError, "float division by zero");
            }
            a / b
        }
        BinaryOperator::FloorDivide => {
            if b == 0.0 {
                return raise(ExceptionKind::ZeroDivisionError, "float floor division by zero");
            }
            (a / b).floor()
        }
        BinaryOperator::Modulo => {
            if b == 0.0 {
                return raise(ExceptionKind::ZeroDivisionError, "float modulo");
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
        }
        BinaryOperator::Power => {
            if a == 0.0 && b < 0.0 {
                return raise(
                    ExceptionKind::ZeroDivisionError,
                    "0.0 cannot be raised to a negative power",
                );
            }
            if a < 0.0 && b.fract() != 0.0 {
                return raise(ExceptionKind::ValueError, "complex results are not supported");
            }
            let result = a.powf(b);
            if result.is_infinite() && a.is_finite() && b.is_finite() {
                return raise(ExceptionKind::OverflowError, "numerical result out of range");
            }
            result
        }
        _ => return unsupported(op.symbol(), left, right),
    };
    Ok(Value::Float(result))
}

pub fn unary(op: UnaryOperator, operand: &Value) -> Eval<Value> {
    if op == UnaryOperator::Not {
        return Ok(Value::Bool(!operand.truthy()));
    }
    let symbol = match op {
        UnaryOperator::Negate => "-",
        UnaryOperator::Plus => "+",
        _ => "~",
    };
    match (op, operand.as_number()) {
        (UnaryOperator::Negate, Some(Number::Int(n))) => {
            n.checked_neg().map(Value::Int).map_or_else(overflow, Ok)
        }
        (UnaryOperator::Negate, Some(Number::Float(x))) => Ok(Value::Float(-x)),
        (UnaryOperator::Plus, Some(Number::Int(n))) => Ok(Value::Int(n)),
        (UnaryOperator::Plus, Some(Number::Float(x))) => Ok(Value::Float(x)),
        (UnaryOperator::Invert, Some(Number::Int(n))) => Ok(Value::Int(!n)),
        _ => raise(
            ExceptionKind::TypeError,
            format!("bad operand type for unary {symbol}: '{}'", operand.type_name()),
        ),
    }
}

pub fn compare(machine: &mut Machine, op: CompareOperator, left: &Value, right: &Value) -> Eval<bool> {
    let ordered = |wanted: fn(Ordering) -> bool| -> Eval<bool> {
        Ok(py_cmp(left, right, op.symbol())?.is_some_and(wanted))
    };
    match op {
        CompareOperator::Eq => Ok(py_eq(left, right)?),
        CompareOperator::NotEq => Ok(!py_eq(left, right)?),
        CompareOperator::Lt => ordered(Ordering::is_lt),
        CompareOperator::LtE => ordered(Ordering::is_le),
        CompareOperator::Gt => ordered(Ordering::is_gt),
        CompareOperator::GtE => ordered(Ordering::is_ge),
        CompareOperator::In => contains(machine, right, left),
        CompareOperator::NotIn => Ok(!contains(machine, right, left)?),
        CompareOperator::Is => Ok(is_same(left, right)),
        CompareOperator::IsNot => Ok(!is_same(left, right)),
    }
}

/// Python's `item in container`.
pub fn contains(machine: &mut Machine, container: &Value, item: &Value) -> Eval<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(&**needle)),
            other => raise(
                ExceptionKind::TypeError,
                format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ),
            ),
        },
        Value::Range(range) => Ok(match item.as_number() {
            Some(Number::Int(n)) => range_contains(range, n),
            Some(Number::Float(x)) if x.fract() == 0.0 && x.abs() < 9.0e18 => {
                range_contains(range, x as i64)
            }
            _ => false,
        }),
        Value::List(_) | Value::Tuple(_) => {
            for candidate in ValueIter::new(container)? {
                machine.tick(1)?;
                if is_same(&candidate, item) || py_eq(&candidate, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => raise(
            ExceptionKind::TypeError,
            format!("argument of type '{}' is not iterable", other.type_name()),
        ),
    }
}

fn range_contains(range: &Range, n: i64) -> bool {
    let (start, stop, step) = (range.start, range.stop, range.step);
    let inside = if step > 0 {
        start <= n && n < stop
    } else {
        stop < n && n <= start
    };
    inside && (i128::from(n) - i128::from(start)) % i128::from(step) == 0
}

fn sequence_len(value: &Value) -> Option<usize> {
    Some(match value {
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        Value::Range(range) => range.len(),
        _ => return None,
    })
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn index_of(container: &Value, index: &Value, len: usize) -> Eval<Option<usize>> {
    match index.as_index() {
        Some(i) => Ok(resolve_index(i, len)),
        None => raise(
            ExceptionKind::TypeError,
            format!(
                "{} indices must be integers or slices, not {}",
                container.type_name(),
                index.type_name()
            ),
        ),
    }
}

/// Python's `container[index]` for a non-slice index.
pub fn get_item(container: &Value, index: &Value) -> Eval<Value> {
    let Some(len) = sequence_len(container) else {
        return raise(
            ExceptionKind::TypeError,
            format!("'{}' object is not subscriptable", container.type_name()),
        );
    };
    let Some(i) = index_of(container, index, len)? else {
        let what = match container {
            Value::Str(_) => "string",
            Value::Range(_) => "range object",
            other => other.type_name(),
        };
        return raise(ExceptionKind::IndexError, format!("{what} index out of range"));
    };
    Ok(match container {
        Value::List(items) => items.borrow()[i].clone(),
        Value::Tuple(items) => items[i].clone(),
        Value::Str(s) => s
            .chars()
            .nth(i)
            .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
            .unwrap_or(Value::None),
        Value::Range(range) => Value::Int(range.get(i)),
        _ => Value::None,
    })
}

/// Python's `container[index] = value`. Only lists are mutable.
pub fn set_item(container: &Value, index: &Value, value: Value) -> Eval<()> {
    let Value::List(items) = container else {
        return raise(
            ExceptionKind::TypeError,
            format!(
                "'{}' object does not support item assignment",
                container.type_name()
            ),
        );
    };
    let len = items.borrow().len();
    match index_of(container, index, len)? {
        Some(i) => {
            items.borrow_mut()[i] = value;
            Ok(())
        }
        None => raise(ExceptionKind::IndexError, "list assignment index out of range"),
    }
}

/// Start, step and item count selected by `[lower:upper:step]` over a
/// sequence of `len` items.
fn slice_bounds(
    len: usize,
    lower: Option<Value>,
    upper: Option<Value>,
    step: Option<Value>,
) -> Eval<(i64, i64, usize)> {
    let as_bound = |value: Option<Value>| -> Eval<Option<i64>> {
        match value {
            None | Some(Value::None) => Ok(None),
            Some(value) => match value.as_index() {
                Some(i) => Ok(Some(i)),
                None => raise(
                    ExceptionKind::TypeError,
                    "slice indices must be integers or None",
                ),
            },
        }
    };
    let step = as_bound(step)?.unwrap_or(1);
    if step == 0 {
        return raise(ExceptionKind::ValueError, "slice step cannot be zero");
    }
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let (low, high) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let clamp = |bound: Option<i64>, default: i64| match bound {
        None => default,
        Some(i) if i < 0 => (i.saturating_add(len)).max(low),
        Some(i) => i.min(high),
    };
    let start = clamp(as_bound(lower)?, if step > 0 { low } else { high });
    let stop = clamp(as_bound(upper)?, if step > 0 { high } else { low });

    let (start_w, stop_w, step_w) = (i128::from(start), i128::from(stop), i128::from(step));
    let count = if step > 0 && start < stop {
        (stop_w - start_w - 1) / step_w + 1
    } else if step < 0 && start > stop {
        (start_w - stop_w - 1) / -step_w + 1
    } else {
        0
    };
    Ok((start, step, usize::try_from(count).unwrap_or(0)))
}

/// Python's `container[lower:upper:step]`.
pub fn slice(
    machine: &mut Machine,
    container: &Value,
    lower: Option<Value>,
    upper: Option<Value>,
    step: Option<Value>,
) -> Eval<Value> {
    let Some(len) = sequence_len(container) else {
        return raise(
            ExceptionKind::TypeError,
            format!("'{}' object is not subscriptable", container.type_name()),
        );
    };
    let (start, step, count) = slice_bounds(len, lower, upper, step)?;
    let positions = (0..count).map(|k| (start + k as i64 * step) as usize);

    if let Value::Range(range) = container {
        if count == 0 {
            return Ok(Value::Range(Range {
                start: 0,
                stop: 0,
                step: 1,
            }));
        }
        let new_step = range.step.checked_mul(step).map_or_else(overflow, Ok)?;
        let first = range.get(start as usize);
        let stop = i128::from(first) + count as i128 * i128::from(new_step);
        return Ok(Value::Range(Range {
            start: first,
            stop: i64::try_from(stop).unwrap_or(if new_step > 0 { i64::MAX } else { i64::MIN }),
            step: new_step,
        }));
    }

    machine.check_len(count)?;
    machine.tick(count as u64)?;
    Ok(match container {
        Value::List(items) => {
            let items = items.borrow();
            Value::list(positions.map(|i| items[i].clone()).collect())
        }
        Value::Tuple(items) => Value::tuple(positions.map(|i| items[i].clone()).collect()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Value::Str(Rc::from(positions.map(|i| chars[i]).collect::<String>()))
        }
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::ExecutionBudget;

    fn machine() -> Machine {
        Machine::new(ExecutionBudget::default())
    }

    fn ints(value: &Value) -> Vec<i64> {
        let Value::List(items) = value else {
            panic!("expected list, got {value:?}");
        };
        items.borrow().iter().map(|v| v.as_index().unwrap()).collect()
    }

    fn int_list(items: &[i64]) -> Value {
        Value::list(items.iter().map(|&n| Value::Int(n)).collect())
    }

    #[test]
    fn test_floor_division_and_modulo_follow_python() {
        let mut m = machine();
        let div = |m: &mut Machine, a, b| binary(m, BinaryOperator::FloorDivide, &Value::Int(a), &Value::Int(b));
        assert!(matches!(div(&mut m, -7, 2), Ok(Value::Int(-4))));
        assert!(matches!(
            binary(&mut m, BinaryOperator::Modulo, &Value::Int(-7), &Value::Int(3)),
            Ok(Value::Int(2))
        ));
        let Err(crate::interpreter::Unwind::Raise(err)) = div(&mut m, 1, 0) else {
            panic!("expected ZeroDivisionError");
        };
        assert_eq!(err.kind, ExceptionKind::ZeroDivisionError);
    }

    #[test]
    fn test_overflow_raises() {
        let mut m = machine();
        let Err(crate::interpreter::Unwind::Raise(err)) =
            binary(&mut m, BinaryOperator::Multiply, &Value::Int(i64::MAX), &Value::Int(2))
        else {
            panic!("expected OverflowError");
        };
        assert_eq!(err.kind, ExceptionKind::OverflowError);
    }

    #[test]
    fn test_sequence_operators() {
        let mut m = machine();
        let joined = binary(&mut m, BinaryOperator::Add, &int_list(&[1]), &int_list(&[2, 3])).unwrap();
        assert_eq!(ints(&joined), [1, 2, 3]);
        let repeated = binary(&mut m, BinaryOperator::Multiply, &Value::Int(2), &int_list(&[7])).unwrap();
        assert_eq!(ints(&repeated), [7, 7]);
        let greeting = binary(&mut m, BinaryOperator::Add, &Value::str("Hello "), &Value::str("Bob")).unwrap();
        assert_eq!(greeting.to_str(), "Hello Bob");
        assert!(binary(&mut m, BinaryOperator::Add, &Value::Int(1), &Value::str("a")).is_err());
    }

    #[test]
    fn test_indexing() {
        let list = int_list(&[1, 2, 3]);
        assert!(matches!(get_item(&list, &Value::Int(-1)), Ok(Value::Int(3))));
        let Err(crate::interpreter::Unwind::Raise(err)) = get_item(&int_list(&[]), &Value::Int(0)) else {
            panic!("expected IndexError");
        };
        assert_eq!(err.kind, ExceptionKind::IndexError);
    }

    #[test]
    fn test_slicing() {
        let mut m = machine();
        let list = int_list(&[0, 1, 2, 3, 4, 5]);
        let sliced = slice(&mut m, &list, Some(Value::Int(1)), Some(Value::Int(-1)), Some(Value::Int(2))).unwrap();
        assert_eq!(ints(&sliced), [1, 3]);
        let reversed = slice(&mut m, &list, None, None, Some(Value::Int(-1))).unwrap();
        assert_eq!(ints(&reversed), [5, 4, 3, 2, 1, 0]);
        let text = slice(&mut m, &Value::str("hello"), None, Some(Value::Int(3)), None).unwrap();
        assert_eq!(text.to_str(), "hel");
    }

    #[test]
    fn test_membership() {
        let mut m = machine();
        let range = Value::Range(Range {
            start: 0,
            stop: 10,
            step: 3,
        });
        assert!(contains(&mut m, &range, &Value::Int(9)).unwrap());
        assert!(!contains(&mut m, &range, &Value::Int(4)).unwrap());
        assert!(contains(&mut m, &int_list(&[1, 2]), &Value::Float(2.0)).unwrap());
        assert!(contains(&mut m, &Value::str("hello"), &Value::str("ell")).unwrap());
    }
}
