//! Tree traversals: read-only visiting, name collection, renaming and
//! span normalization.
//!
//! Every traversal visits children in source order, so "first encountered"
//! always means "leftmost in the printed source".

use std::collections::BTreeSet;

use crate::ast::*;

/// Read-only visitor. Override a method and call the matching `walk_*`
/// function to keep descending.
pub trait Visitor<'t> {
    fn visit_stmt(&mut self, stmt: &'t Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'t Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_function<'t, V: Visitor<'t> + ?Sized>(visitor: &mut V, function: &'t FunctionDef) {
    for stmt in &function.body {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'t, V: Visitor<'t> + ?Sized>(visitor: &mut V, stmt: &'t Stmt) {
    match &stmt.kind {
        StmtKind::Expr(expr) => visitor.visit_expr(expr),
        StmtKind::Assign { target, value } | StmtKind::AugAssign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        StmtKind::For { target, iter, body } => {
            visitor.visit_expr(target);
            visitor.visit_expr(iter);
            for stmt in body {
                visitor.visit_stmt(stmt);
            }
        }
        StmtKind::While { condition, body } => {
            visitor.visit_expr(condition);
            for stmt in body {
                visitor.visit_stmt(stmt);
            }
        }
        StmtKind::If {
            condition,
            body,
            orelse,
        } => {
            visitor.visit_expr(condition);
            for stmt in body.iter().chain(orelse) {
                visitor.visit_stmt(stmt);
            }
        }
        StmtKind::Return(value) | StmtKind::Raise(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
    }
}

pub fn walk_expr<'t, V: Visitor<'t> + ?Sized>(visitor: &mut V, expr: &'t Expr) {
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Constant(_) => {}
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            for item in items {
                visitor.visit_expr(item);
            }
        }
        ExprKind::BinaryOp { left, right, .. } | ExprKind::BoolOp { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::UnaryOp { operand, .. } => visitor.visit_expr(operand),
        ExprKind::Compare { left, comparisons } => {
            visitor.visit_expr(left);
            for (_, operand) in comparisons {
                visitor.visit_expr(operand);
            }
        }
        ExprKind::Call { func, args } => {
            visitor.visit_expr(func);
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::Attribute { value, .. } => visitor.visit_expr(value),
        ExprKind::Subscript { value, index } => {
            visitor.visit_expr(value);
            visitor.visit_expr(index);
        }
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                visitor.visit_expr(part);
            }
        }
        ExprKind::ListComp {
            element,
            target,
            iter,
            conditions,
        } => {
            visitor.visit_expr(element);
            visitor.visit_expr(target);
            visitor.visit_expr(iter);
            for condition in conditions {
                visitor.visit_expr(condition);
            }
        }
        ExprKind::IfExp {
            body,
            condition,
            orelse,
        } => {
            visitor.visit_expr(body);
            visitor.visit_expr(condition);
            visitor.visit_expr(orelse);
        }
    }
}

/// Names introduced by a binding target (`x`, `a, b`); subscripts and
/// attributes bind nothing.
pub fn target_names<'t>(target: &'t Expr, out: &mut Vec<&'t str>) {
    match &target.kind {
        ExprKind::Name(name) => out.push(name),
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            for item in items {
                target_names(item, out);
            }
        }
        _ => {}
    }
}

struct BoundNames<'t> {
    names: Vec<&'t str>,
}

impl<'t> BoundNames<'t> {
    fn add(&mut self, name: &'t str) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    fn bind(&mut self, target: &'t Expr) {
        let mut found = Vec::new();
        target_names(target, &mut found);
        for name in found {
            self.add(name);
        }
    }
}

impl<'t> Visitor<'t> for BoundNames<'t> {
    fn visit_stmt(&mut self, stmt: &'t Stmt) {
        match &stmt.kind {
            StmtKind::Assign { target, value } | StmtKind::AugAssign { target, value, .. } => {
                self.bind(target);
                self.visit_expr(value);
            }
            StmtKind::For { target, iter, body } => {
                self.bind(target);
                self.visit_expr(iter);
                for stmt in body {
                    self.visit_stmt(stmt);
                }
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &'t Expr) {
        if let ExprKind::ListComp {
            element,
            target,
            iter,
            conditions,
        } = &expr.kind
        {
            self.visit_expr(element);
            self.bind(target);
            self.visit_expr(iter);
            for condition in conditions {
                self.visit_expr(condition);
            }
        } else {
            walk_expr(self, expr);
        }
    }
}

/// Parameters (declaration order) followed by every name bound in the body
/// (assignment, augmented assignment, `for` and comprehension targets), in
/// first-encountered order without duplicates.
pub fn bound_names(function: &FunctionDef) -> Vec<&str> {
    let mut collector = BoundNames {
        names: Vec::with_capacity(function.params.len()),
    };
    for param in &function.params {
        collector.add(&param.name);
    }
    walk_function(&mut collector, function);
    collector.names
}

/// Every identifier the function mentions: parameters plus all `Name`
/// nodes, read or written.
pub fn all_names(function: &FunctionDef) -> BTreeSet<&str> {
    struct Names<'t>(BTreeSet<&'t str>);

    impl<'t> Visitor<'t> for Names<'t> {
        fn visit_expr(&mut self, expr: &'t Expr) {
            if let ExprKind::Name(name) = &expr.kind {
                self.0.insert(name);
            }
            walk_expr(self, expr);
        }
    }

    let mut names = Names(function.params.iter().map(|p| p.name.as_str()).collect());
    walk_function(&mut names, function);
    names.0
}

/// Mutable traversal for rewrites that edit a tree they exclusively own.
pub trait VisitorMut {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }
}

pub fn walk_stmt_mut<V: VisitorMut + ?Sized>(visitor: &mut V, stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Expr(expr) => visitor.visit_expr_mut(expr),
        StmtKind::Assign { target, value } | StmtKind::AugAssign { target, value, .. } => {
            visitor.visit_expr_mut(target);
            visitor.visit_expr_mut(value);
        }
        StmtKind::For { target, iter, body } => {
            visitor.visit_expr_mut(target);
            visitor.visit_expr_mut(iter);
            for stmt in body {
                visitor.visit_stmt_mut(stmt);
            }
        }
        StmtKind::While { condition, body } => {
            visitor.visit_expr_mut(condition);
            for stmt in body {
                visitor.visit_stmt_mut(stmt);
            }
        }
        StmtKind::If {
            condition,
            body,
            orelse,
        } => {
            visitor.visit_expr_mut(condition);
            for stmt in body.iter_mut().chain(orelse.iter_mut()) {
                visitor.visit_stmt_mut(stmt);
            }
        }
        StmtKind::Return(value) | StmtKind::Raise(value) => {
            if let Some(value) = value {
                visitor.visit_expr_mut(value);
            }
        }
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
    }
}

pub fn walk_expr_mut<V: VisitorMut + ?Sized>(visitor: &mut V, expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Name(_) | ExprKind::Constant(_) => {}
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            for item in items {
                visitor.visit_expr_mut(item);
            }
        }
        ExprKind::BinaryOp { left, right, .. } | ExprKind::BoolOp { left, right, .. } => {
            visitor.visit_expr_mut(left);
            visitor.visit_expr_mut(right);
        }
        ExprKind::UnaryOp { operand, .. } => visitor.visit_expr_mut(operand),
        ExprKind::Compare { left, comparisons } => {
            visitor.visit_expr_mut(left);
            for (_, operand) in comparisons {
                visitor.visit_expr_mut(operand);
            }
        }
        ExprKind::Call { func, args } => {
            visitor.visit_expr_mut(func);
            for arg in args {
                visitor.visit_expr_mut(arg);
            }
        }
        ExprKind::Attribute { value, .. } => visitor.visit_expr_mut(value),
        ExprKind::Subscript { value, index } => {
            visitor.visit_expr_mut(value);
            visitor.visit_expr_mut(index);
        }
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                visitor.visit_expr_mut(part);
            }
        }
        ExprKind::ListComp {
            element,
            target,
            iter,
            conditions,
        } => {
            visitor.visit_expr_mut(element);
            visitor.visit_expr_mut(target);
            visitor.visit_expr_mut(iter);
            for condition in conditions {
                visitor.visit_expr_mut(condition);
            }
        }
        ExprKind::IfExp {
            body,
            condition,
            orelse,
        } => {
            visitor.visit_expr_mut(body);
            visitor.visit_expr_mut(condition);
            visitor.visit_expr_mut(orelse);
        }
    }
}

/// Renames every occurrence of `from` (references and parameter
/// declarations) to `to`. Returns the number of occurrences replaced.
pub fn rename(function: &mut FunctionDef, from: &str, to: &str) -> usize {
    struct Renamer<'n> {
        from: &'n str,
        to: &'n str,
        count: usize,
    }

    impl VisitorMut for Renamer<'_> {
        fn visit_expr_mut(&mut self, expr: &mut Expr) {
            if let ExprKind::Name(name) = &mut expr.kind
                && name == self.from
            {
                *name = self.to.to_owned();
                self.count += 1;
            }
            walk_expr_mut(self, expr);
        }
    }

    let mut renamer = Renamer { from, to, count: 0 };
    for param in &mut function.params {
        if param.name == from {
            param.name = to.to_owned();
            renamer.count += 1;
        }
    }
    for stmt in &mut function.body {
        renamer.visit_stmt_mut(stmt);
    }
    renamer.count
}

/// Gives every synthetic span the span of its nearest positioned ancestor
/// and clamps every other span into its parent's range.
pub fn normalize_spans(function: &mut FunctionDef) {
    struct Spans {
        parents: Vec<Span>,
    }

    impl Spans {
        fn settle(&self, span: &mut Span) {
            let Some(&parent) = self.parents.last() else {
                return;
            };
            if span.is_synthetic() {
                *span = parent;
            } else if !parent.is_synthetic() && !parent.contains(*span) {
                let start = span.start.clamp(parent.start, parent.end);
                let end = span.end.clamp(start, parent.end);
                *span = Span::new(start, end);
            }
        }
    }

    impl VisitorMut for Spans {
        fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
            self.settle(&mut stmt.span);
            self.parents.push(stmt.span);
            walk_stmt_mut(self, stmt);
            self.parents.pop();
        }

        fn visit_expr_mut(&mut self, expr: &mut Expr) {
            self.settle(&mut expr.span);
            self.parents.push(expr.span);
            walk_expr_mut(self, expr);
            self.parents.pop();
        }
    }

    let mut spans = Spans {
        parents: vec![function.span],
    };
    for param in &mut function.params {
        spans.settle(&mut param.span);
    }
    for stmt in &mut function.body {
        spans.visit_stmt_mut(stmt);
    }
}
