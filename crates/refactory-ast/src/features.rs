use serde::Serialize;

use crate::ast::*;
use crate::walk::{Visitor, walk_expr, walk_function, walk_stmt};

/// Cheap structural descriptors of a function, for search policies that
/// pick the next rule to try.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeFeatures {
    pub code_size: usize,
    pub has_docstring: bool,
    pub param_count: usize,
    pub node_count: usize,
    pub loop_count: usize,
    pub branch_count: usize,
}

#[derive(Default)]
struct Counter {
    nodes: usize,
    loops: usize,
    branches: usize,
}

impl<'t> Visitor<'t> for Counter {
    fn visit_stmt(&mut self, stmt: &'t Stmt) {
        self.nodes += 1;
        match stmt.kind {
            StmtKind::For { .. } | StmtKind::While { .. } => self.loops += 1,
            StmtKind::If { .. } => self.branches += 1,
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'t Expr) {
        self.nodes += 1;
        match expr.kind {
            ExprKind::ListComp { .. } => self.loops += 1,
            ExprKind::IfExp { .. } => self.branches += 1,
            _ => {}
        }
        walk_expr(self, expr);
    }
}

impl SyntaxTree {
    pub fn features(&self) -> TreeFeatures {
        let function = &self.function;
        let mut counter = Counter::default();
        walk_function(&mut counter, function);

        TreeFeatures {
            code_size: self.code_size(),
            has_docstring: has_docstring(function),
            param_count: function.params.len(),
            // The definition itself plus its parameters.
            node_count: counter.nodes + 1 + function.params.len(),
            loop_count: counter.loops,
            branch_count: counter.branches,
        }
    }
}

/// True when the first statement is a bare string literal.
pub fn has_docstring(function: &FunctionDef) -> bool {
    matches!(
        function.body.first(),
        Some(Stmt {
            kind: StmtKind::Expr(Expr {
                kind: ExprKind::Constant(Constant::Str(_)),
                ..
            }),
            ..
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    #[test]
    fn test_features_of_docstring_function() {
        let tree = parse_function(
            "def greet(name):\n    \"\"\"greet\"\"\"\n    message = 'Hello ' + name\n    print(message)\n    return message\n",
        )
        .unwrap();
        let features = tree.features();
        assert!(features.has_docstring);
        assert_eq!(features.param_count, 1);
        assert_eq!(features.loop_count, 0);
        assert_eq!(features.branch_count, 0);
        assert_eq!(features.code_size, tree.code_size());
    }

    #[test]
    fn test_features_count_loops_and_branches() {
        let tree = parse_function(
            "def max_list(lst):\n    current_max = lst[0]\n    for x in lst:\n        if x > current_max:\n            current_max = x\n    return current_max\n",
        )
        .unwrap();
        let features = tree.features();
        assert!(!features.has_docstring);
        assert_eq!(features.loop_count, 1);
        assert_eq!(features.branch_count, 1);
        // def + param + 5 statements + 12 expressions
        assert_eq!(features.node_count, 19);
    }
}
