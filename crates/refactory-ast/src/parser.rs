//! Python source → [`SyntaxTree`] conversion.
//!
//! Parsing is delegated to `tree-sitter-python`; this module walks the
//! concrete syntax tree and lowers the supported subset of Python into the
//! owned AST. Anything outside that subset is rejected with a
//! [`ParseError`] pointing at the offending node.

use std::cell::Cell;

use derive_more::Display;
use tree_sitter::{Node, Parser};

use crate::ast::*;

/// Deepest nesting of expressions and blocks the lowering accepts. Deeper
/// trees would exhaust the stack in the recursive passes over the AST.
pub const MAX_NESTING: usize = 100;

#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{message} (line {line}, column {column})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn at(node: Node, message: impl Into<String>) -> Self {
        let position = node.start_position();
        ParseError {
            message: message.into(),
            line: position.row + 1,
            column: position.column + 1,
        }
    }

    fn unsupported(node: Node, what: &str) -> Self {
        ParseError::at(node, format!("unsupported syntax: {what}"))
    }
}

impl std::error::Error for ParseError {}

pub struct FunctionParser {
    parser: Parser,
}

impl FunctionParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseError {
                message: format!("failed to load the Python grammar: {e}"),
                line: 0,
                column: 0,
            })?;
        Ok(FunctionParser { parser })
    }

    /// Parses `source`, which must consist of exactly one function definition.
    pub fn parse(&mut self, source: &str) -> Result<SyntaxTree, ParseError> {
        let tree = self.parser.parse(source, None).ok_or_else(|| ParseError {
            message: "parser produced no tree".to_owned(),
            line: 0,
            column: 0,
        })?;
        Lowering {
            source,
            loop_depth: Cell::new(0),
            nesting: Cell::new(0),
        }
        .module(tree.root_node())
    }
}

/// Convenience wrapper creating a fresh [`FunctionParser`].
pub fn parse_function(source: &str) -> Result<SyntaxTree, ParseError> {
    FunctionParser::new()?.parse(source)
}

fn span_of(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn is_trivia(node: Node) -> bool {
    matches!(node.kind(), "comment" | "line_continuation")
}

fn named_children<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| !is_trivia(*child))
        .collect();
    children
}

fn field_children<'tree>(node: Node<'tree>, name: &str) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    let children = node
        .children_by_field_name(name, &mut cursor)
        .filter(|child| !is_trivia(*child))
        .collect();
    children
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

struct Lowering<'src> {
    source: &'src str,
    loop_depth: Cell<usize>,
    nesting: Cell<usize>,
}

impl<'src> Lowering<'src> {
    fn text(&self, node: Node) -> Result<&'src str, ParseError> {
        node.utf8_text(self.source.as_bytes())
            .map_err(|_| ParseError::at(node, "source is not valid UTF-8"))
    }

    fn field<'tree>(&self, node: Node<'tree>, name: &str) -> Result<Node<'tree>, ParseError> {
        node.child_by_field_name(name)
            .ok_or_else(|| ParseError::at(node, format!("`{}` without `{name}`", node.kind())))
    }

    fn reject_token(&self, node: Node, token: &str, what: &str) -> Result<(), ParseError> {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).any(|child| child.kind() == token);
        if found {
            Err(ParseError::unsupported(node, what))
        } else {
            Ok(())
        }
    }

    fn module(&self, root: Node) -> Result<SyntaxTree, ParseError> {
        if root.has_error() {
            let node = first_error(root).unwrap_or(root);
            let message = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                "invalid syntax".to_owned()
            };
            return Err(ParseError::at(node, message));
        }

        match named_children(root).as_slice() {
            [item] if item.kind() == "function_definition" => {
                Ok(SyntaxTree::new(self.function(*item)?))
            }
            [item] if item.kind() == "decorated_definition" => {
                Err(ParseError::unsupported(*item, "decorators"))
            }
            [] => Err(ParseError::at(root, "expected a function definition")),
            items => {
                let functions = items
                    .iter()
                    .filter(|item| item.kind() == "function_definition")
                    .count();
                Err(ParseError::at(
                    root,
                    format!(
                        "expected exactly one top-level function definition, found {functions} \
                         function(s) among {} statement(s)",
                        items.len()
                    ),
                ))
            }
        }
    }

    fn function(&self, node: Node) -> Result<FunctionDef, ParseError> {
        self.reject_token(node, "async", "async functions")?;
        if node.child_by_field_name("return_type").is_some() {
            return Err(ParseError::unsupported(node, "return annotations"));
        }
        if node.child_by_field_name("type_parameters").is_some() {
            return Err(ParseError::unsupported(node, "type parameters"));
        }

        let name = self.text(self.field(node, "name")?)?.to_owned();
        let params = self.parameters(self.field(node, "parameters")?)?;
        let body = self.block(self.field(node, "body")?)?;

        Ok(FunctionDef {
            name,
            params,
            body,
            span: span_of(node),
        })
    }

    fn parameters(&self, node: Node) -> Result<Vec<Param>, ParseError> {
        let mut params: Vec<Param> = Vec::new();
        for child in named_children(node) {
            if child.kind() != "identifier" {
                return Err(ParseError::unsupported(
                    child,
                    "parameters other than plain names",
                ));
            }
            let name = self.text(child)?;
            if params.iter().any(|param| param.name == name) {
                return Err(ParseError::at(
                    child,
                    format!("duplicate argument `{name}` in function definition"),
                ));
            }
            params.push(Param {
                name: name.to_owned(),
                span: span_of(child),
            });
        }
        Ok(params)
    }

    fn loop_body(&self, node: Node) -> Result<Vec<Stmt>, ParseError> {
        self.loop_depth.set(self.loop_depth.get() + 1);
        let body = self.block(node);
        self.loop_depth.set(self.loop_depth.get() - 1);
        body
    }

    fn block(&self, node: Node) -> Result<Vec<Stmt>, ParseError> {
        self.nested(node, "block nested too deeply", || {
            named_children(node)
                .into_iter()
                .map(|child| self.statement(child))
                .collect()
        })
    }

    fn nested<T>(
        &self,
        node: Node,
        what: &str,
        lower: impl FnOnce() -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let depth = self.nesting.get();
        if depth >= MAX_NESTING {
            return Err(ParseError::unsupported(node, what));
        }
        self.nesting.set(depth + 1);
        let result = lower();
        self.nesting.set(depth);
        result
    }

    fn statement(&self, node: Node) -> Result<Stmt, ParseError> {
        let span = span_of(node);
        let kind = match node.kind() {
            "expression_statement" => return self.expression_statement(node),
            "return_statement" => StmtKind::Return(self.optional_value(node)?),
            "raise_statement" => {
                if node.child_by_field_name("cause").is_some() {
                    return Err(ParseError::unsupported(node, "`raise ... from ...`"));
                }
                StmtKind::Raise(self.optional_value(node)?)
            }
            "pass_statement" => StmtKind::Pass,
            "break_statement" | "continue_statement" if self.loop_depth.get() == 0 => {
                let keyword = node.kind().trim_end_matches("_statement");
                return Err(ParseError::at(node, format!("`{keyword}` outside loop")));
            }
            "break_statement" => StmtKind::Break,
            "continue_statement" => StmtKind::Continue,
            "if_statement" => return self.if_statement(node),
            "for_statement" => {
                self.reject_token(node, "async", "async for")?;
                if node.child_by_field_name("alternative").is_some() {
                    return Err(ParseError::unsupported(node, "`else` on loops"));
                }
                StmtKind::For {
                    target: self.target(self.field(node, "left")?)?,
                    iter: self.expr(self.field(node, "right")?)?,
                    body: self.loop_body(self.field(node, "body")?)?,
                }
            }
            "while_statement" => {
                if node.child_by_field_name("alternative").is_some() {
                    return Err(ParseError::unsupported(node, "`else` on loops"));
                }
                StmtKind::While {
                    condition: self.expr(self.field(node, "condition")?)?,
                    body: self.loop_body(self.field(node, "body")?)?,
                }
            }
            "function_definition" | "decorated_definition" | "class_definition" => {
                return Err(ParseError::unsupported(node, "nested definitions"));
            }
            other => {
                return Err(ParseError::unsupported(node, &format!("`{other}`")));
            }
        };
        Ok(Stmt::new(kind, span))
    }

    fn optional_value(&self, node: Node) -> Result<Option<Expr>, ParseError> {
        match named_children(node).as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(self.expr(*value)?)),
            [_, extra, ..] => Err(ParseError::unsupported(*extra, "multiple operands")),
        }
    }

    fn expression_statement(&self, node: Node) -> Result<Stmt, ParseError> {
        let span = span_of(node);
        let children = named_children(node);
        let kind = match children.as_slice() {
            [child] if child.kind() == "assignment" => self.assignment(*child)?,
            [child] if child.kind() == "augmented_assignment" => {
                let operator = self.text(self.field(*child, "operator")?)?;
                let op = operator
                    .strip_suffix('=')
                    .and_then(BinaryOperator::from_symbol)
                    .ok_or_else(|| {
                        ParseError::unsupported(*child, &format!("operator `{operator}`"))
                    })?;
                StmtKind::AugAssign {
                    target: self.target(self.field(*child, "left")?)?,
                    op,
                    value: self.expr(self.field(*child, "right")?)?,
                }
            }
            [child] => StmtKind::Expr(self.expr(*child)?),
            items => {
                let elements = items
                    .iter()
                    .map(|item| self.expr(*item))
                    .collect::<Result<Vec<_>, _>>()?;
                StmtKind::Expr(Expr::new(ExprKind::Tuple(elements), span))
            }
        };
        Ok(Stmt::new(kind, span))
    }

    fn assignment(&self, node: Node) -> Result<StmtKind, ParseError> {
        if node.child_by_field_name("type").is_some() {
            return Err(ParseError::unsupported(node, "annotated assignments"));
        }
        let right = self.field(node, "right")?;
        if right.kind() == "assignment" {
            return Err(ParseError::unsupported(node, "chained assignment"));
        }
        Ok(StmtKind::Assign {
            target: self.target(self.field(node, "left")?)?,
            value: self.expr(right)?,
        })
    }

    /// Assignment and loop targets: names, subscripts, attributes and flat
    /// tuples of names.
    fn target(&self, node: Node) -> Result<Expr, ParseError> {
        match node.kind() {
            "identifier" | "subscript" | "attribute" => self.expr(node),
            "pattern_list" | "tuple_pattern" => {
                let elements = named_children(node)
                    .into_iter()
                    .map(|child| match child.kind() {
                        "identifier" => self.expr(child),
                        _ => Err(ParseError::unsupported(child, "nested unpacking")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::new(ExprKind::Tuple(elements), span_of(node)))
            }
            other => Err(ParseError::unsupported(
                node,
                &format!("assignment to `{other}`"),
            )),
        }
    }

    fn if_statement(&self, node: Node) -> Result<Stmt, ParseError> {
        let condition = self.expr(self.field(node, "condition")?)?;
        let body = self.block(self.field(node, "consequence")?)?;

        let alternatives = field_children(node, "alternative");

        let mut orelse = Vec::new();
        for clause in alternatives.into_iter().rev() {
            match clause.kind() {
                "else_clause" => {
                    orelse = self.block(self.field(clause, "body")?)?;
                }
                "elif_clause" => {
                    let span = Span::new(clause.start_byte(), node.end_byte());
                    let nested = StmtKind::If {
                        condition: self.expr(self.field(clause, "condition")?)?,
                        body: self.block(self.field(clause, "consequence")?)?,
                        orelse,
                    };
                    orelse = vec![Stmt::new(nested, span)];
                }
                other => {
                    return Err(ParseError::unsupported(clause, &format!("`{other}`")));
                }
            }
        }

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                body,
                orelse,
            },
            span_of(node),
        ))
    }

    fn boxed(&self, node: Node) -> Result<Box<Expr>, ParseError> {
        self.expr(node).map(Box::new)
    }

    fn expr(&self, node: Node) -> Result<Expr, ParseError> {
        self.nested(node, "expression nested too deeply", || self.lower_expr(node))
    }

    fn lower_expr(&self, node: Node) -> Result<Expr, ParseError> {
        let span = span_of(node);
        let kind = match node.kind() {
            "identifier" => ExprKind::Name(self.text(node)?.to_owned()),
            "integer" => ExprKind::Constant(Constant::Int(self.integer(node)?)),
            "float" => ExprKind::Constant(Constant::Float(self.float(node)?)),
            "string" => ExprKind::Constant(Constant::Str(self.string(node)?)),
            "concatenated_string" => {
                let mut value = String::new();
                for part in named_children(node) {
                    value.push_str(&self.string(part)?);
                }
                ExprKind::Constant(Constant::Str(value))
            }
            "true" => ExprKind::Constant(Constant::Bool(true)),
            "false" => ExprKind::Constant(Constant::Bool(false)),
            "none" => ExprKind::Constant(Constant::None),
            "parenthesized_expression" => {
                return match named_children(node).as_slice() {
                    [inner] => self.expr(*inner),
                    _ => Err(ParseError::unsupported(node, "parenthesized form")),
                };
            }
            "list" => ExprKind::List(self.exprs(named_children(node))?),
            "tuple" | "expression_list" => ExprKind::Tuple(self.exprs(named_children(node))?),
            "binary_operator" => {
                let operator = self.text(self.field(node, "operator")?)?;
                let op = BinaryOperator::from_symbol(operator).ok_or_else(|| {
                    ParseError::unsupported(node, &format!("operator `{operator}`"))
                })?;
                ExprKind::BinaryOp {
                    left: self.boxed(self.field(node, "left")?)?,
                    op,
                    right: self.boxed(self.field(node, "right")?)?,
                }
            }
            "unary_operator" => {
                let op = match self.text(self.field(node, "operator")?)? {
                    "-" => UnaryOperator::Negate,
                    "+" => UnaryOperator::Plus,
                    "~" => UnaryOperator::Invert,
                    other => {
                        return Err(ParseError::unsupported(node, &format!("operator `{other}`")));
                    }
                };
                ExprKind::UnaryOp {
                    op,
                    operand: self.boxed(self.field(node, "argument")?)?,
                }
            }
            "not_operator" => ExprKind::UnaryOp {
                op: UnaryOperator::Not,
                operand: self.boxed(self.field(node, "argument")?)?,
            },
            "boolean_operator" => {
                let op = match self.text(self.field(node, "operator")?)? {
                    "and" => BoolOperator::And,
                    "or" => BoolOperator::Or,
                    other => {
                        return Err(ParseError::unsupported(node, &format!("operator `{other}`")));
                    }
                };
                ExprKind::BoolOp {
                    left: self.boxed(self.field(node, "left")?)?,
                    op,
                    right: self.boxed(self.field(node, "right")?)?,
                }
            }
            "comparison_operator" => self.comparison(node)?,
            "call" => {
                let arguments = self.field(node, "arguments")?;
                if arguments.kind() != "argument_list" {
                    return Err(ParseError::unsupported(arguments, "generator arguments"));
                }
                let args = named_children(arguments)
                    .into_iter()
                    .map(|arg| match arg.kind() {
                        "keyword_argument" => {
                            Err(ParseError::unsupported(arg, "keyword arguments"))
                        }
                        "list_splat" | "dictionary_splat" => {
                            Err(ParseError::unsupported(arg, "argument unpacking"))
                        }
                        _ => self.expr(arg),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ExprKind::Call {
                    func: self.boxed(self.field(node, "function")?)?,
                    args,
                }
            }
            "attribute" => ExprKind::Attribute {
                value: self.boxed(self.field(node, "object")?)?,
                attr: self.text(self.field(node, "attribute")?)?.to_owned(),
            },
            "subscript" => {
                let indices = field_children(node, "subscript");
                let index = match indices.as_slice() {
                    [single] => self.expr(*single)?,
                    [first, ..] => {
                        let span = Span::new(first.start_byte(), node.end_byte());
                        Expr::new(ExprKind::Tuple(self.exprs(indices)?), span)
                    }
                    [] => return Err(ParseError::at(node, "subscript without index")),
                };
                ExprKind::Subscript {
                    value: self.boxed(self.field(node, "value")?)?,
                    index: Box::new(index),
                }
            }
            "slice" => self.slice(node)?,
            "list_comprehension" => self.list_comprehension(node)?,
            "conditional_expression" => match named_children(node).as_slice() {
                [body, condition, orelse] => ExprKind::IfExp {
                    body: self.boxed(*body)?,
                    condition: self.boxed(*condition)?,
                    orelse: self.boxed(*orelse)?,
                },
                _ => return Err(ParseError::unsupported(node, "conditional form")),
            },
            other => {
                return Err(ParseError::unsupported(node, &format!("`{other}`")));
            }
        };
        Ok(Expr::new(kind, span))
    }

    fn exprs(&self, nodes: Vec<Node>) -> Result<Vec<Expr>, ParseError> {
        nodes.into_iter().map(|node| self.expr(node)).collect()
    }

    fn comparison(&self, node: Node) -> Result<ExprKind, ParseError> {
        let mut operands = Vec::new();
        let mut operators = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if is_trivia(child) {
                continue;
            }
            if child.is_named() {
                operands.push(child);
            } else {
                let op = CompareOperator::from_symbol(child.kind()).ok_or_else(|| {
                    ParseError::unsupported(child, &format!("comparison `{}`", child.kind()))
                })?;
                operators.push(op);
            }
        }

        let mut operands = operands.into_iter();
        let Some(left) = operands.next() else {
            return Err(ParseError::at(node, "comparison without operands"));
        };
        if operators.len() != operands.len() {
            return Err(ParseError::at(node, "malformed comparison"));
        }
        let comparisons = operators
            .into_iter()
            .zip(operands)
            .map(|(op, operand)| Ok((op, self.expr(operand)?)))
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(ExprKind::Compare {
            left: self.boxed(left)?,
            comparisons,
        })
    }

    fn slice(&self, node: Node) -> Result<ExprKind, ParseError> {
        let mut parts: [Option<Box<Expr>>; 3] = [None, None, None];
        let mut position = 0;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                ":" => position += 1,
                _ if is_trivia(child) => {}
                _ if child.is_named() && position < 3 => {
                    parts[position] = Some(self.boxed(child)?);
                }
                _ => {}
            }
        }
        let [lower, upper, step] = parts;
        Ok(ExprKind::Slice { lower, upper, step })
    }

    fn list_comprehension(&self, node: Node) -> Result<ExprKind, ParseError> {
        let element = self.boxed(self.field(node, "body")?)?;
        let mut generator = None;
        let mut conditions = Vec::new();

        for clause in named_children(node).into_iter().skip(1) {
            match clause.kind() {
                "for_in_clause" if generator.is_none() => {
                    self.reject_token(clause, "async", "async comprehensions")?;
                    let sources = field_children(clause, "right");
                    let [source] = sources.as_slice() else {
                        return Err(ParseError::unsupported(clause, "multiple iterables"));
                    };
                    generator = Some((
                        self.boxed_target(self.field(clause, "left")?)?,
                        self.boxed(*source)?,
                    ));
                }
                "for_in_clause" => {
                    return Err(ParseError::unsupported(clause, "nested comprehension loops"));
                }
                "if_clause" => match named_children(clause).as_slice() {
                    [condition] => conditions.push(self.expr(*condition)?),
                    _ => return Err(ParseError::unsupported(clause, "comprehension filter")),
                },
                other => {
                    return Err(ParseError::unsupported(clause, &format!("`{other}`")));
                }
            }
        }

        let Some((target, iter)) = generator else {
            return Err(ParseError::at(node, "comprehension without `for`"));
        };
        Ok(ExprKind::ListComp {
            element,
            target,
            iter,
            conditions,
        })
    }

    fn boxed_target(&self, node: Node) -> Result<Box<Expr>, ParseError> {
        self.target(node).map(Box::new)
    }

    fn integer(&self, node: Node) -> Result<i64, ParseError> {
        let text = self.text(node)?.replace('_', "").to_ascii_lowercase();
        if text.ends_with('j') || text.ends_with('l') {
            return Err(ParseError::unsupported(node, "complex or long literals"));
        }
        let (digits, radix) = if let Some(rest) = text.strip_prefix("0x") {
            (rest, 16)
        } else if let Some(rest) = text.strip_prefix("0o") {
            (rest, 8)
        } else if let Some(rest) = text.strip_prefix("0b") {
            (rest, 2)
        } else {
            (text.as_str(), 10)
        };
        i64::from_str_radix(digits, radix)
            .map_err(|_| ParseError::unsupported(node, "integer literal outside the 64-bit range"))
    }

    fn float(&self, node: Node) -> Result<f64, ParseError> {
        let text = self.text(node)?.replace('_', "");
        if text.ends_with(['j', 'J']) {
            return Err(ParseError::unsupported(node, "complex literals"));
        }
        text.parse::<f64>()
            .map_err(|_| ParseError::at(node, format!("invalid float literal `{text}`")))
    }

    fn string(&self, node: Node) -> Result<String, ParseError> {
        let text = self.text(node)?;
        let quote_start = text
            .find(['\'', '"'])
            .ok_or_else(|| ParseError::at(node, "string literal without quotes"))?;
        let prefix = text[..quote_start].to_ascii_lowercase();
        if prefix.contains('f') || prefix.contains('t') {
            return Err(ParseError::unsupported(node, "formatted string literals"));
        }
        if prefix.contains('b') {
            return Err(ParseError::unsupported(node, "bytes literals"));
        }

        let quoted = &text[quote_start..];
        let delimiter = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
            3
        } else {
            1
        };
        if quoted.len() < delimiter * 2 {
            return Err(ParseError::at(node, "unterminated string literal"));
        }
        let body = &quoted[delimiter..quoted.len() - delimiter];

        if prefix.contains('r') {
            Ok(body.to_owned())
        } else {
            unescape(body).map_err(|message| ParseError::at(node, message))
        }
    }
}

fn unescape(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\');
            break;
        };
        match escaped {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = escaped.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|next| next.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).ok_or("invalid octal escape")?);
            }
            'x' | 'u' | 'U' => {
                let width = match escaped {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.by_ref().take(width).collect();
                let value = u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| digits.len() == width)
                    .ok_or_else(|| format!("truncated \\{escaped} escape"))?;
                out.push(char::from_u32(value).ok_or("escape is not a valid character")?);
            }
            'N' => return Err("unsupported syntax: named unicode escapes".to_owned()),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}
