//! Canonical Python source printer.
//!
//! Prints a [`SyntaxTree`] back to source with 4-space indentation and the
//! minimum parentheses required by Python's operator precedence, so that
//! parsing the output yields the same tree (modulo spans).
//!
//! # Example output
//!
//! ```text
//! def double_list(lst):
//!     return [x * 2 for x in lst]
//! ```

use std::fmt::Write;

use crate::ast::*;

/// Binding strength of expression forms, weakest first.
mod precedence {
    pub const TEST: u8 = 1;
    pub const OR: u8 = 2;
    pub const AND: u8 = 3;
    pub const NOT: u8 = 4;
    pub const COMPARE: u8 = 5;
    pub const BIT_OR: u8 = 6;
    pub const BIT_XOR: u8 = 7;
    pub const BIT_AND: u8 = 8;
    pub const SHIFT: u8 = 9;
    pub const ARITH: u8 = 10;
    pub const TERM: u8 = 11;
    pub const FACTOR: u8 = 12;
    pub const POWER: u8 = 13;
    pub const ATOM: u8 = 14;
}

fn binary_precedence(op: BinaryOperator) -> u8 {
    use precedence::*;
    match op {
        BinaryOperator::BitOr => BIT_OR,
        BinaryOperator::BitXor => BIT_XOR,
        BinaryOperator::BitAnd => BIT_AND,
        BinaryOperator::LeftShift | BinaryOperator::RightShift => SHIFT,
        BinaryOperator::Add | BinaryOperator::Subtract => ARITH,
        BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::FloorDivide
        | BinaryOperator::Modulo => TERM,
        BinaryOperator::Power => POWER,
    }
}

/// Printer state: output buffer and current indentation depth.
pub struct PrintState {
    pub output: String,
    pub indent: usize,
}

impl Default for PrintState {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintState {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    pub fn function(&mut self, function: &FunctionDef) {
        let params: Vec<&str> = function.params.iter().map(|p| p.name.as_str()).collect();
        self.line(&format!("def {}({}):", function.name, params.join(", ")));
        self.suite(&function.body);
    }

    fn suite(&mut self, body: &[Stmt]) {
        self.indent += 1;
        if body.is_empty() {
            self.line("pass");
        }
        for stmt in body {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    pub fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.line(&expr_to_string(expr)),
            StmtKind::Assign { target, value } => {
                self.line(&format!("{} = {}", expr_to_string(target), expr_to_string(value)));
            }
            StmtKind::AugAssign { target, op, value } => {
                self.line(&format!(
                    "{} {}= {}",
                    expr_to_string(target),
                    op.symbol(),
                    expr_to_string(value)
                ));
            }
            StmtKind::For { target, iter, body } => {
                self.line(&format!(
                    "for {} in {}:",
                    expr_to_string(target),
                    expr_to_string(iter)
                ));
                self.suite(body);
            }
            StmtKind::While { condition, body } => {
                self.line(&format!("while {}:", expr_to_string(condition)));
                self.suite(body);
            }
            StmtKind::If {
                condition,
                body,
                orelse,
            } => self.if_chain("if", condition, body, orelse),
            StmtKind::Return(None) => self.line("return"),
            StmtKind::Return(Some(value)) => {
                self.line(&format!("return {}", expr_to_string(value)));
            }
            StmtKind::Raise(None) => self.line("raise"),
            StmtKind::Raise(Some(value)) => {
                self.line(&format!("raise {}", expr_to_string(value)));
            }
            StmtKind::Pass => self.line("pass"),
            StmtKind::Break => self.line("break"),
            StmtKind::Continue => self.line("continue"),
        }
    }

    fn if_chain(&mut self, keyword: &str, condition: &Expr, body: &[Stmt], orelse: &[Stmt]) {
        self.line(&format!("{keyword} {}:", expr_to_string(condition)));
        self.suite(body);
        match orelse {
            [] => {}
            [
                Stmt {
                    kind:
                        StmtKind::If {
                            condition,
                            body,
                            orelse,
                        },
                    ..
                },
            ] => self.if_chain("elif", condition, body, orelse),
            _ => {
                self.line("else:");
                self.suite(orelse);
            }
        }
    }
}

impl SyntaxTree {
    /// Re-serializes the tree as Python source.
    pub fn unparse(&self) -> String {
        let mut state = PrintState::new();
        state.function(&self.function);
        state.finish()
    }

    /// Size signal: non-whitespace characters of the printed source.
    pub fn code_size(&self) -> usize {
        self.unparse().chars().filter(|c| !c.is_whitespace()).count()
    }
}

impl std::fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.unparse())
    }
}

pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, precedence::TEST);
    out
}

fn expr_precedence(expr: &Expr) -> u8 {
    use precedence::*;
    match &expr.kind {
        ExprKind::Constant(Constant::Int(n)) if *n < 0 => FACTOR,
        ExprKind::Constant(Constant::Float(x)) if x.is_sign_negative() => FACTOR,
        ExprKind::BinaryOp { op, .. } => binary_precedence(*op),
        ExprKind::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => NOT,
        ExprKind::UnaryOp { .. } => FACTOR,
        ExprKind::BoolOp {
            op: BoolOperator::And,
            ..
        } => AND,
        ExprKind::BoolOp {
            op: BoolOperator::Or,
            ..
        } => OR,
        ExprKind::Compare { .. } => COMPARE,
        ExprKind::IfExp { .. } => TEST,
        _ => ATOM,
    }
}

fn write_expr(out: &mut String, expr: &Expr, min: u8) {
    let own = expr_precedence(expr);
    let parenthesize = own < min;
    if parenthesize {
        out.push('(');
    }
    write_expr_inner(out, expr, own);
    if parenthesize {
        out.push(')');
    }
}

fn write_list(out: &mut String, items: &[Expr]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item, precedence::TEST);
    }
}

fn write_expr_inner(out: &mut String, expr: &Expr, own: u8) {
    use precedence::*;
    match &expr.kind {
        ExprKind::Name(name) => out.push_str(name),
        ExprKind::Constant(constant) => write_constant(out, constant),
        ExprKind::List(items) => {
            out.push('[');
            write_list(out, items);
            out.push(']');
        }
        ExprKind::Tuple(items) => {
            out.push('(');
            write_list(out, items);
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        ExprKind::BinaryOp { left, op, right } => {
            let (left_min, right_min) = if *op == BinaryOperator::Power {
                (own + 1, own)
            } else {
                (own, own + 1)
            };
            write_expr(out, left, left_min);
            let _ = write!(out, " {} ", op.symbol());
            write_expr(out, right, right_min);
        }
        ExprKind::UnaryOp { op, operand } => {
            out.push_str(match op {
                UnaryOperator::Negate => "-",
                UnaryOperator::Plus => "+",
                UnaryOperator::Invert => "~",
                UnaryOperator::Not => "not ",
            });
            write_expr(out, operand, own);
        }
        ExprKind::BoolOp { left, op, right } => {
            write_expr(out, left, own);
            out.push_str(match op {
                BoolOperator::And => " and ",
                BoolOperator::Or => " or ",
            });
            write_expr(out, right, own + 1);
        }
        ExprKind::Compare { left, comparisons } => {
            write_expr(out, left, own + 1);
            for (op, operand) in comparisons {
                let _ = write!(out, " {} ", op.symbol());
                write_expr(out, operand, own + 1);
            }
        }
        ExprKind::Call { func, args } => {
            write_expr(out, func, ATOM);
            out.push('(');
            write_list(out, args);
            out.push(')');
        }
        ExprKind::Attribute { value, attr } => {
            write_expr(out, value, ATOM);
            out.push('.');
            out.push_str(attr);
        }
        ExprKind::Subscript { value, index } => {
            write_expr(out, value, ATOM);
            out.push('[');
            match &index.kind {
                ExprKind::Tuple(items) if !items.is_empty() => write_list(out, items),
                _ => write_expr(out, index, TEST),
            }
            out.push(']');
        }
        ExprKind::Slice { lower, upper, step } => {
            if let Some(lower) = lower {
                write_expr(out, lower, TEST);
            }
            out.push(':');
            if let Some(upper) = upper {
                write_expr(out, upper, TEST);
            }
            if let Some(step) = step {
                out.push(':');
                write_expr(out, step, TEST);
            }
        }
        ExprKind::ListComp {
            element,
            target,
            iter,
            conditions,
        } => {
            out.push('[');
            write_expr(out, element, TEST);
            out.push_str(" for ");
            write_expr(out, target, TEST);
            out.push_str(" in ");
            write_expr(out, iter, OR);
            for condition in conditions {
                out.push_str(" if ");
                write_expr(out, condition, OR);
            }
            out.push(']');
        }
        ExprKind::IfExp {
            body,
            condition,
            orelse,
        } => {
            write_expr(out, body, OR);
            out.push_str(" if ");
            write_expr(out, condition, OR);
            out.push_str(" else ");
            write_expr(out, orelse, TEST);
        }
    }
}

fn write_constant(out: &mut String, constant: &Constant) {
    match constant {
        Constant::None => out.push_str("None"),
        Constant::Bool(true) => out.push_str("True"),
        Constant::Bool(false) => out.push_str("False"),
        Constant::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Constant::Float(x) => out.push_str(&float_repr(*x)),
        Constant::Str(s) => out.push_str(&string_repr(s)),
    }
}

/// Python-compatible float literal.
pub fn float_repr(x: f64) -> String {
    if x.is_nan() {
        "(1e309 - 1e309)".to_owned()
    } else if x.is_infinite() {
        let literal = if x > 0.0 { "1e309" } else { "-1e309" };
        literal.to_owned()
    } else {
        format!("{x:?}")
    }
}

/// Python `repr()` of a string: single quotes unless the text contains a
/// single quote and no double quote.
pub fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::parser::parse_function;

    fn reprint(source: &str) -> String {
        parse_function(source).unwrap().unparse()
    }

    #[test]
    fn test_canonical_layout() {
        let printed = reprint(
            "def max_list(lst):\n  current_max = lst[0]\n  for x in lst:\n    if x > current_max:\n      current_max = x\n  return current_max\n",
        );
        assert_snapshot!(printed.trim_end(), @r"
def max_list(lst):
    current_max = lst[0]
    for x in lst:
        if x > current_max:
            current_max = x
    return current_max
");
    }

    #[test]
    fn test_elif_and_else() {
        let printed = reprint(
            "def sign(x):\n    if x > 0:\n        return 1\n    elif x < 0:\n        return -1\n    else:\n        return 0\n",
        );
        assert_snapshot!(printed.trim_end(), @r"
def sign(x):
    if x > 0:
        return 1
    elif x < 0:
        return -1
    else:
        return 0
");
    }

    #[test]
    fn test_parentheses_follow_precedence() {
        let cases = [
            ("(a + b) * c", "(a + b) * c"),
            ("a + (b * c)", "a + b * c"),
            ("a - (b - c)", "a - (b - c)"),
            ("(a - b) - c", "a - b - c"),
            ("(-2) ** 2", "(-2) ** 2"),
            ("-(2 ** 2)", "-2 ** 2"),
            ("2 ** (3 ** 2)", "2 ** 3 ** 2"),
            ("(2 ** 3) ** 2", "(2 ** 3) ** 2"),
            ("not (a and b)", "not (a and b)"),
            ("(not a) and b", "not a and b"),
            ("(a or b) and c", "(a or b) and c"),
            ("(x if c else y) + 1", "(x if c else y) + 1"),
            ("[e for e in (a if c else b)]", "[e for e in (a if c else b)]"),
            ("(a < b) == c", "(a < b) == c"),
            ("(a, b)", "(a, b)"),
            ("(a,)", "(a,)"),
            ("lst[1:-1]", "lst[1:-1]"),
            ("lst[::2]", "lst[::2]"),
        ];
        for (input, expected) in cases {
            let printed = reprint(&format!("def f(a, b, c, x, y, lst):\n    return {input}\n"));
            assert_eq!(printed.lines().nth(1).unwrap().trim(), format!("return {expected}"));
        }
    }

    #[test]
    fn test_string_repr_matches_python() {
        assert_eq!(string_repr("hello"), "'hello'");
        assert_eq!(string_repr("it's"), "\"it's\"");
        assert_eq!(string_repr("both ' and \""), "'both \\' and \"'");
        assert_eq!(string_repr("tab\there\n"), "'tab\\there\\n'");
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.25), "0.25");
    }

    #[test]
    fn test_reprint_is_a_fixpoint() {
        let source = "def greet(name):\n    \"\"\"greet\"\"\"\n    message = 'Hello ' + name\n    print(message)\n    return message\n";
        let once = reprint(source);
        assert_eq!(reprint(&once), once);
        assert!(once.starts_with("def greet(name):\n    'greet'\n"));
    }

    #[test]
    fn test_code_size_ignores_whitespace() {
        let tree = parse_function("def f(x):\n    return x\n").unwrap();
        assert_eq!(tree.code_size(), "deff(x):returnx".len());
    }
}
