//! Runtime values and the Python protocols over them: truthiness,
//! equality, ordering, `repr`/`str` and iteration.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use refactory_ast::printer::{float_repr, string_repr};

use crate::builtins::{BuiltinFn, Method};
use crate::exception::{Exception, ExceptionKind};

/// Nesting beyond this depth in `==`/ordering raises `RecursionError`.
const MAX_COMPARE_DEPTH: usize = 500;

#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Range(Range),
    BuiltinFn(&'static str, BuiltinFn),
    Method(Box<Value>, Method),
    /// The function under execution, for recursive calls.
    Function(Rc<str>),
    ExceptionClass(ExceptionKind),
    Exception(Rc<Exception>),
}

/// A lazy `range(start, stop, step)`; `step` is never zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn len(&self) -> usize {
        let (start, stop, step) = (
            i128::from(self.start),
            i128::from(self.stop),
            i128::from(self.step),
        );
        let len = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / -step
        } else {
            0
        };
        usize::try_from(len).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th element; callers bounds-check against [`Range::len`].
    pub fn get(&self, index: usize) -> i64 {
        (i128::from(self.start) + index as i128 * i128::from(self.step)) as i64
    }
}

/// Numeric view of `bool`, `int` and `float` values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::from(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Range(_) => "range",
            Value::BuiltinFn(..) | Value::Method(..) => "builtin_function_or_method",
            Value::Function(_) => "function",
            Value::ExceptionClass(_) => "type",
            Value::Exception(_) => "exception",
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(x) => Some(Number::Float(*x)),
            _ => None,
        }
    }

    /// Integer view used by indices, `range` and repetition counts.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    /// Python's `str(value)`.
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Exception(exception) => exception.message.clone(),
            _ => self.repr(),
        }
    }

    /// Python's `repr(value)`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    fn write_repr(&self, out: &mut String, seen: &mut Vec<*const RefCell<Vec<Value>>>) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(x) => out.push_str(&float_repr(*x)),
            Value::Str(s) => out.push_str(&string_repr(s)),
            Value::List(items) => {
                let ptr = Rc::as_ptr(items);
                if seen.contains(&ptr) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(ptr);
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, seen);
                }
                out.push(']');
                seen.pop();
            }
            Value::Tuple(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, seen);
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Range(Range { start, stop, step }) => {
                if *step == 1 {
                    out.push_str(&format!("range({start}, {stop})"));
                } else {
                    out.push_str(&format!("range({start}, {stop}, {step})"));
                }
            }
            Value::BuiltinFn(name, _) => out.push_str(&format!("<built-in function {name}>")),
            Value::Method(receiver, method) => out.push_str(&format!(
                "<built-in method {} of {} object>",
                method.name(),
                receiver.type_name()
            )),
            Value::Function(name) => out.push_str(&format!("<function {name}>")),
            Value::ExceptionClass(kind) => out.push_str(&format!("<class '{kind}'>")),
            Value::Exception(exception) => out.push_str(&format!(
                "{}({})",
                exception.kind,
                if exception.message.is_empty() {
                    String::new()
                } else {
                    string_repr(&exception.message)
                }
            )),
        }
    }
}

/// Python's `is`: identity for mutable and heap values, value identity for
/// the immutable scalars the interpreter interns.
pub fn is_same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
        (Value::BuiltinFn(a, _), Value::BuiltinFn(b, _)) => a == b,
        (Value::ExceptionClass(a), Value::ExceptionClass(b)) => a == b,
        _ => false,
    }
}

/// Python's `==`.
pub fn py_eq(left: &Value, right: &Value) -> Result<bool, Exception> {
    eq_at(left, right, 0)
}

fn too_deep() -> Exception {
    Exception::new(
        ExceptionKind::RecursionError,
        "maximum recursion depth exceeded in comparison",
    )
}

fn eq_at(left: &Value, right: &Value, depth: usize) -> Result<bool, Exception> {
    if depth > MAX_COMPARE_DEPTH {
        return Err(too_deep());
    }
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(match (a, b) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        });
    }
    let seq_eq = |a: &[Value], b: &[Value]| -> Result<bool, Exception> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(b) {
            if !(is_same(x, y) || eq_at(x, y, depth + 1)?) {
                return Ok(false);
            }
        }
        Ok(true)
    };
    match (left, right) {
        (Value::None, Value::None) => Ok(true),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::List(a), Value::List(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(true);
            }
            seq_eq(&a.borrow()[..], &b.borrow()[..])
        }
        (Value::Tuple(a), Value::Tuple(b)) => seq_eq(&a[..], &b[..]),
        (Value::Range(a), Value::Range(b)) => {
            let len = a.len();
            Ok(len == b.len() && (len == 0 || (a.start == b.start && (len == 1 || a.step == b.step))))
        }
        (Value::Method(a, m), Value::Method(b, n)) => Ok(m == n && is_same(a, b)),
        _ => Ok(is_same(left, right)),
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`. `Ok(None)` means unordered (NaN).
pub fn py_cmp(left: &Value, right: &Value, op: &str) -> Result<Option<Ordering>, Exception> {
    cmp_at(left, right, op, 0)
}

fn cmp_at(
    left: &Value,
    right: &Value,
    op: &str,
    depth: usize,
) -> Result<Option<Ordering>, Exception> {
    if depth > MAX_COMPARE_DEPTH {
        return Err(too_deep());
    }
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(match (a, b) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        });
    }
    let seq_cmp = |a: &[Value], b: &[Value]| -> Result<Option<Ordering>, Exception> {
        for (x, y) in a.iter().zip(b) {
            if !(is_same(x, y) || eq_at(x, y, depth + 1)?) {
                return cmp_at(x, y, op, depth + 1);
            }
        }
        Ok(Some(a.len().cmp(&b.len())))
    };
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => seq_cmp(&a.borrow()[..], &b.borrow()[..]),
        (Value::Tuple(a), Value::Tuple(b)) => seq_cmp(&a[..], &b[..]),
        _ => Err(Exception::new(
            ExceptionKind::TypeError,
            format!(
                "'{op}' not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ),
        )),
    }
}

/// Lazy iteration over an iterable value.
pub enum ValueIter {
    List(Rc<RefCell<Vec<Value>>>, usize),
    Tuple(Rc<[Value]>, usize),
    Chars(Vec<char>, usize),
    Range(Range, usize),
}

impl ValueIter {
    pub fn new(value: &Value) -> Result<Self, Exception> {
        Ok(match value {
            Value::List(items) => ValueIter::List(Rc::clone(items), 0),
            Value::Tuple(items) => ValueIter::Tuple(Rc::clone(items), 0),
            Value::Str(s) => ValueIter::Chars(s.chars().collect(), 0),
            Value::Range(range) => ValueIter::Range(*range, 0),
            other => {
                return Err(Exception::new(
                    ExceptionKind::TypeError,
                    format!("'{}' object is not iterable", other.type_name()),
                ));
            }
        })
    }

    /// Upper bound on the remaining items; lists may still grow.
    pub fn size_hint(&self) -> usize {
        match self {
            ValueIter::List(items, i) => items.borrow().len().saturating_sub(*i),
            ValueIter::Tuple(items, i) => items.len().saturating_sub(*i),
            ValueIter::Chars(chars, i) => chars.len().saturating_sub(*i),
            ValueIter::Range(range, i) => range.len().saturating_sub(*i),
        }
    }
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let item = match self {
            // Lists are read live, so appending while iterating extends the loop.
            ValueIter::List(items, i) => items.borrow().get(*i).cloned(),
            ValueIter::Tuple(items, i) => items.get(*i).cloned(),
            ValueIter::Chars(chars, i) => chars.get(*i).map(|c| Value::str(c.encode_utf8(&mut [0; 4]))),
            ValueIter::Range(range, i) => (*i < range.len()).then(|| Value::Int(range.get(*i))),
        };
        if item.is_some() {
            match self {
                ValueIter::List(_, i)
                | ValueIter::Tuple(_, i)
                | ValueIter::Chars(_, i)
                | ValueIter::Range(_, i) => *i += 1,
            }
        }
        item
    }
}
