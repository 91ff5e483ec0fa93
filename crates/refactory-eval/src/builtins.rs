//! Built-in functions and methods available to the interpreted function.
//!
//! All builtins share one signature: they take the run's [`Machine`] (for
//! output capture and budget accounting) and the evaluated positional
//! arguments, and return the result or a Python exception.

use std::cmp::Ordering;
use std::rc::Rc;

use refactory_ast::BinaryOperator;

use crate::exception::ExceptionKind;
use crate::interpreter::{Eval, Machine, raise};
use crate::ops;
use crate::value::{Number, Range, Value, ValueIter, py_cmp};

pub type BuiltinFn = fn(&mut Machine, Vec<Value>) -> Eval<Value>;

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Eval<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {min}")
    } else if args.len() < min {
        format!("at least {min}")
    } else {
        format!("at most {max}")
    };
    raise(
        ExceptionKind::TypeError,
        format!(
            "{name}() takes {expected} argument{} ({} given)",
            if min == max && min == 1 { "" } else { "s" },
            args.len()
        ),
    )
}

fn only(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::None)
}

/// `print(*values)`: writes `str()` of each value, space separated, to the
/// run's captured output.
fn print(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    let mut line = args.iter().map(Value::to_str).collect::<Vec<_>>().join(" ");
    line.push('\n');
    machine.write_output(&line)?;
    Ok(Value::None)
}

/// `len(sequence)`.
fn len(_: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("len", &args, 1, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Range(range) => range.len(),
        other => {
            return raise(
                ExceptionKind::TypeError,
                format!("object of type '{}' has no len()", other.type_name()),
            );
        }
    };
    match i64::try_from(len) {
        Ok(len) => Ok(Value::Int(len)),
        Err(_) => raise(ExceptionKind::OverflowError, "length does not fit in an int"),
    }
}

/// `sum(iterable, start=0)`: left fold with `+`.
fn sum(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("sum", &args, 1, 2)?;
    let mut args = args.into_iter();
    let iterable = args.next().unwrap_or(Value::None);
    let mut total = args.next().unwrap_or(Value::Int(0));
    if let Value::Str(_) = total {
        return raise(
            ExceptionKind::TypeError,
            "sum() can't sum strings [use ''.join(seq) instead]",
        );
    }
    for item in ValueIter::new(&iterable)? {
        machine.tick(1)?;
        total = ops::binary(machine, BinaryOperator::Add, &total, &item)?;
    }
    Ok(total)
}

/// Shared body of `max` and `min`: keeps the first item no other item
/// beats under `wanted`.
fn extreme(machine: &mut Machine, name: &str, args: Vec<Value>, wanted: Ordering) -> Eval<Value> {
    let items = match args.len() {
        0 => {
            return raise(
                ExceptionKind::TypeError,
                format!("{name} expected at least 1 argument, got 0"),
            );
        }
        1 => machine.collect(&args[0])?,
        _ => args,
    };
    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        return raise(
            ExceptionKind::ValueError,
            format!("{name}() iterable argument is empty"),
        );
    };
    let op = if wanted == Ordering::Greater { ">" } else { "<" };
    for item in items {
        machine.tick(1)?;
        if py_cmp(&item, &best, op)? == Some(wanted) {
            best = item;
        }
    }
    Ok(best)
}

/// `max(iterable)` or `max(a, b, ...)`.
fn max(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    extreme(machine, "max", args, Ordering::Greater)
}

/// `min(iterable)` or `min(a, b, ...)`.
fn min(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    extreme(machine, "min", args, Ordering::Less)
}

/// `abs(number)`.
fn abs(_: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("abs", &args, 1, 1)?;
    match args[0].as_number() {
        Some(Number::Int(n)) => match n.checked_abs() {
            Some(n) => Ok(Value::Int(n)),
            None => raise(ExceptionKind::OverflowError, "integer overflow"),
        },
        Some(Number::Float(x)) => Ok(Value::Float(x.abs())),
        None => raise(
            ExceptionKind::TypeError,
            format!("bad operand type for abs(): '{}'", args[0].type_name()),
        ),
    }
}

/// `range(stop)`, `range(start, stop[, step])`; lazy.
fn range(_: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("range", &args, 1, 3)?;
    let mut bounds = Vec::with_capacity(3);
    for arg in &args {
        match arg.as_index() {
            Some(n) => bounds.push(n),
            None => {
                return raise(
                    ExceptionKind::TypeError,
                    format!(
                        "'{}' object cannot be interpreted as an integer",
                        arg.type_name()
                    ),
                );
            }
        }
    }
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step, ..] => (*start, *stop, *step),
        [] => (0, 0, 1),
    };
    if step == 0 {
        return raise(ExceptionKind::ValueError, "range() arg 3 must not be zero");
    }
    Ok(Value::Range(Range { start, stop, step }))
}

/// Stable merge sort with a fallible `<`, as `list.sort` never assumes a
/// total order.
fn merge_sort(machine: &mut Machine, items: Vec<Value>) -> Eval<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(machine, left)?;
    let right = merge_sort(machine, right)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        // Take from the right only when strictly smaller, keeping stability.
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => py_cmp(r, l, "<")? == Some(Ordering::Less),
            _ => break,
        };
        machine.tick(1)?;
        if take_right {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

/// `sorted(iterable)`.
fn sorted(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("sorted", &args, 1, 1)?;
    let items = machine.collect(&args[0])?;
    Ok(Value::list(merge_sort(machine, items)?))
}

/// `list(iterable=())`: a new list with the iterable's items.
fn list(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("list", &args, 0, 1)?;
    match args.first() {
        Some(iterable) => Ok(Value::list(machine.collect(iterable)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

/// `str(value='')`.
fn str(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("str", &args, 0, 1)?;
    let text = args.first().map(Value::to_str).unwrap_or_default();
    machine.check_len(text.len())?;
    Ok(Value::Str(Rc::from(text)))
}

/// `int(value=0)` from numbers and decimal strings.
fn int(_: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("int", &args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Str(s)) => match s.trim().replace('_', "").parse::<i64>() {
            Ok(n) => Ok(Value::Int(n)),
            Err(err) if matches!(
                err.kind(),
                std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow
            ) =>
            {
                raise(ExceptionKind::OverflowError, "integer overflow")
            }
            Err(_) => raise(
                ExceptionKind::ValueError,
                format!("invalid literal for int() with base 10: {}", Value::Str(s.clone()).repr()),
            ),
        },
        Some(value) => match value.as_number() {
            Some(Number::Int(n)) => Ok(Value::Int(n)),
            Some(Number::Float(x)) if x.is_nan() => raise(
                ExceptionKind::ValueError,
                "cannot convert float NaN to integer",
            ),
            Some(Number::Float(x)) if x.is_infinite() => raise(
                ExceptionKind::OverflowError,
                "cannot convert float infinity to integer",
            ),
            Some(Number::Float(x)) => {
                let truncated = x.trunc();
                if truncated < -9.223_372_036_854_776e18 || truncated >= 9.223_372_036_854_776e18 {
                    return raise(ExceptionKind::OverflowError, "integer overflow");
                }
                Ok(Value::Int(truncated as i64))
            }
            None => raise(
                ExceptionKind::TypeError,
                format!(
                    "int() argument must be a string or a real number, not '{}'",
                    value.type_name()
                ),
            ),
        },
    }
}

/// `float(value=0.0)` from numbers and strings such as `"1.5"` or `"inf"`.
fn float(_: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("float", &args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => match s.trim().parse::<f64>() {
            Ok(x) => Ok(Value::Float(x)),
            Err(_) => raise(
                ExceptionKind::ValueError,
                format!(
                    "could not convert string to float: {}",
                    Value::Str(s.clone()).repr()
                ),
            ),
        },
        Some(value) => match value.as_number() {
            Some(n) => Ok(Value::Float(n.as_f64())),
            None => raise(
                ExceptionKind::TypeError,
                format!(
                    "float() argument must be a string or a real number, not '{}'",
                    value.type_name()
                ),
            ),
        },
    }
}

/// `bool(value=False)`.
fn bool(_: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("bool", &args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
}

/// `any(iterable)`.
fn any(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("any", &args, 1, 1)?;
    for item in ValueIter::new(&args[0])? {
        machine.tick(1)?;
        if item.truthy() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// `all(iterable)`.
fn all(machine: &mut Machine, args: Vec<Value>) -> Eval<Value> {
    arity("all", &args, 1, 1)?;
    for item in ValueIter::new(&args[0])? {
        machine.tick(1)?;
        if !item.truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// Builtin functions by name.
pub const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("print", print),
    ("len", len),
    ("sum", sum),
    ("max", max),
    ("min", min),
    ("abs", abs),
    ("range", range),
    ("sorted", sorted),
    ("list", list),
    ("str", str),
    ("int", int),
    ("float", float),
    ("bool", bool),
    ("any", any),
    ("all", all),
];

pub fn lookup(name: &str) -> Option<Value> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|&(name, f)| Value::BuiltinFn(name, f))
}

/// Methods reachable through attribute access on lists and strings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Append,
    Pop,
    Upper,
    Lower,
    Strip,
    Split,
    Join,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Append => "append",
            Method::Pop => "pop",
            Method::Upper => "upper",
            Method::Lower => "lower",
            Method::Strip => "strip",
            Method::Split => "split",
            Method::Join => "join",
        }
    }

    pub fn lookup(receiver: &Value, attr: &str) -> Option<Self> {
        match (receiver, attr) {
            (Value::List(_), "append") => Some(Method::Append),
            (Value::List(_), "pop") => Some(Method::Pop),
            (Value::Str(_), "upper") => Some(Method::Upper),
            (Value::Str(_), "lower") => Some(Method::Lower),
            (Value::Str(_), "strip") => Some(Method::Strip),
            (Value::Str(_), "split") => Some(Method::Split),
            (Value::Str(_), "join") => Some(Method::Join),
            _ => None,
        }
    }
}

pub fn call_method(
    machine: &mut Machine,
    receiver: &Value,
    method: Method,
    args: Vec<Value>,
) -> Eval<Value> {
    let name = method.name();
    match (receiver, method) {
        (Value::List(items), Method::Append) => {
            arity(name, &args, 1, 1)?;
            let len = items.borrow().len() + 1;
            machine.check_len(len)?;
            items.borrow_mut().push(only(args));
            Ok(Value::None)
        }
        (Value::List(items), Method::Pop) => {
            arity(name, &args, 0, 1)?;
            let len = items.borrow().len();
            if len == 0 {
                return raise(ExceptionKind::IndexError, "pop from empty list");
            }
            let index = match args.first() {
                None => len - 1,
                Some(index) => match index.as_index() {
                    Some(i) => {
                        let resolved = if i < 0 { i + len as i64 } else { i };
                        if resolved < 0 || resolved >= len as i64 {
                            return raise(ExceptionKind::IndexError, "pop index out of range");
                        }
                        resolved as usize
                    }
                    None => {
                        return raise(
                            ExceptionKind::TypeError,
                            format!(
                                "'{}' object cannot be interpreted as an integer",
                                index.type_name()
                            ),
                        );
                    }
                },
            };
            Ok(items.borrow_mut().remove(index))
        }
        (Value::Str(s), Method::Upper) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Str(Rc::from(s.to_uppercase())))
        }
        (Value::Str(s), Method::Lower) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Str(Rc::from(s.to_lowercase())))
        }
        (Value::Str(s), Method::Strip) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::str(s.trim()))
        }
        (Value::Str(s), Method::Split) => {
            arity(name, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(Value::Str(sep)) if sep.is_empty() => {
                    return raise(ExceptionKind::ValueError, "empty separator");
                }
                Some(Value::Str(sep)) => s.split(&**sep).map(Value::str).collect(),
                Some(other) => {
                    return raise(
                        ExceptionKind::TypeError,
                        format!("must be str or None, not {}", other.type_name()),
                    );
                }
            };
            machine.tick(parts.len() as u64)?;
            machine.check_len(parts.len())?;
            Ok(Value::list(parts))
        }
        (Value::Str(sep), Method::Join) => {
            arity(name, &args, 1, 1)?;
            let mut pieces = Vec::new();
            for (i, item) in machine.collect(&args[0])?.into_iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece),
                    other => {
                        return raise(
                            ExceptionKind::TypeError,
                            format!(
                                "sequence item {i}: expected str instance, {} found",
                                other.type_name()
                            ),
                        );
                    }
                }
            }
            let joined = pieces.iter().map(|p| &**p).collect::<Vec<&str>>().join(&**sep);
            machine.check_len(joined.len())?;
            Ok(Value::Str(Rc::from(joined)))
        }
        _ => raise(
            ExceptionKind::AttributeError,
            format!(
                "'{}' object has no attribute '{name}'",
                receiver.type_name()
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::ExecutionBudget;
    use crate::interpreter::Unwind;

    fn call(name: &str, args: Vec<Value>) -> Eval<Value> {
        let Some(Value::BuiltinFn(_, f)) = lookup(name) else {
            panic!("no builtin {name}");
        };
        f(&mut Machine::new(ExecutionBudget::default()), args)
    }

    fn raised(result: Eval<Value>) -> ExceptionKind {
        match result {
            Err(Unwind::Raise(exception)) => exception.kind,
            other => panic!("expected an exception, got {other:?}"),
        }
    }

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|&n| Value::Int(n)).collect())
    }

    #[test]
    fn test_sum_and_empty_max() {
        assert!(matches!(call("sum", vec![ints(&[1, 2, 3])]), Ok(Value::Int(6))));
        assert!(matches!(call("sum", vec![ints(&[])]), Ok(Value::Int(0))));
        assert!(matches!(call("max", vec![ints(&[3, 1, 2])]), Ok(Value::Int(3))));
        assert_eq!(raised(call("max", vec![ints(&[])])), ExceptionKind::ValueError);
        assert!(matches!(
            call("min", vec![Value::Int(4), Value::Int(-2)]),
            Ok(Value::Int(-2))
        ));
    }

    #[test]
    fn test_sorted_is_stable_and_fallible() {
        let sorted = call("sorted", vec![ints(&[3, 1, 2, 1])]).unwrap();
        assert_eq!(sorted.repr(), "[1, 1, 2, 3]");
        let mixed = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert_eq!(raised(call("sorted", vec![mixed])), ExceptionKind::TypeError);
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(call("int", vec![Value::str(" 42 ")]), Ok(Value::Int(42))));
        assert!(matches!(call("int", vec![Value::Float(-2.7)]), Ok(Value::Int(-2))));
        assert_eq!(raised(call("int", vec![Value::str("x")])), ExceptionKind::ValueError);
        assert_eq!(call("str", vec![Value::Float(1.5)]).unwrap().to_str(), "1.5");
        assert!(matches!(call("bool", vec![ints(&[])]), Ok(Value::Bool(false))));
    }

    #[test]
    fn test_range_materializes_through_list() {
        let range = call("range", vec![Value::Int(1), Value::Int(7), Value::Int(2)]).unwrap();
        assert_eq!(call("list", vec![range]).unwrap().repr(), "[1, 3, 5]");
        assert_eq!(
            raised(call("range", vec![Value::Int(0), Value::Int(1), Value::Int(0)])),
            ExceptionKind::ValueError
        );
    }

    #[test]
    fn test_print_is_captured() {
        let mut machine = Machine::new(ExecutionBudget::default());
        print(&mut machine, vec![Value::str("Hello"), Value::Int(1)]).unwrap();
        assert_eq!(machine.output(), "Hello 1\n");
    }

    #[test]
    fn test_methods() {
        let mut machine = Machine::new(ExecutionBudget::default());
        let list = ints(&[1]);
        call_method(&mut machine, &list, Method::Append, vec![Value::Int(2)]).unwrap();
        assert_eq!(list.repr(), "[1, 2]");
        let popped = call_method(&mut machine, &list, Method::Pop, vec![]).unwrap();
        assert!(matches!(popped, Value::Int(2)));

        let words = call_method(&mut machine, &Value::str(" a b "), Method::Split, vec![]).unwrap();
        assert_eq!(words.repr(), "['a', 'b']");
        let joined = call_method(&mut machine, &Value::str("-"), Method::Join, vec![words]).unwrap();
        assert_eq!(joined.to_str(), "a-b");
        assert_eq!(Method::lookup(&Value::Int(1), "append"), None);
    }
}
