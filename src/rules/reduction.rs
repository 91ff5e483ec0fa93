//! Loops that only accumulate a total or a running maximum.

use refactory_ast::*;

use super::window::{return_call, returns_name};

/// Matches `name = 0; for _ in S: <one statement>; return name` and
/// captures `S`. The loop body itself is not inspected.
pub(crate) fn match_sum(window: &[Stmt]) -> Option<&Expr> {
    let [assign, for_loop, ret] = window else {
        return None;
    };
    if let StmtKind::Assign { target, value } = &assign.kind
        && let Some(total) = target.as_name()
        && value.as_constant() == Some(&Constant::Int(0))
        && let StmtKind::For { iter, body, .. } = &for_loop.kind
        && body.len() == 1
        && returns_name(ret, total)
    {
        return Some(iter);
    }
    None
}

/// Matches `name = X[...]; for ...: <body with an if>; return name` and
/// captures `X`.
pub(crate) fn match_max(window: &[Stmt]) -> Option<&Expr> {
    let [assign, for_loop, ret] = window else {
        return None;
    };
    if let StmtKind::Assign { target, value } = &assign.kind
        && let Some(current) = target.as_name()
        && let ExprKind::Subscript {
            value: sequence, ..
        } = &value.kind
        && let StmtKind::For { body, .. } = &for_loop.kind
        && body
            .iter()
            .any(|stmt| matches!(stmt.kind, StmtKind::If { .. }))
        && returns_name(ret, current)
    {
        return Some(sequence);
    }
    None
}

pub(crate) fn loop_to_sum(window: &[Stmt]) -> Option<Stmt> {
    match_sum(window).map(|sequence| return_call("sum", sequence.clone()))
}

pub(crate) fn loop_to_max(window: &[Stmt]) -> Option<Stmt> {
    match_max(window).map(|sequence| return_call("max", sequence.clone()))
}
