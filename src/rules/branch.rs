use refactory_ast::*;

/// Matches `if C: return <b> else: return <not b>` and captures `C` with
/// the boolean the true branch returns.
pub(crate) fn match_bool_branch(stmt: &Stmt) -> Option<(&Expr, bool)> {
    if let StmtKind::If {
        condition,
        body,
        orelse,
    } = &stmt.kind
        && let Some(then) = returned_bool(body)
        && let Some(otherwise) = returned_bool(orelse)
        && then != otherwise
    {
        return Some((condition, then));
    }
    None
}

/// `return C` when the true branch returned `True`, `return not C`
/// otherwise.
pub(crate) fn build_return(condition: &Expr, then: bool) -> StmtKind {
    let condition = condition.clone();
    let value = if then {
        condition
    } else {
        Expr::synthetic(ExprKind::UnaryOp {
            op: UnaryOperator::Not,
            operand: Box::new(condition),
        })
    };
    StmtKind::Return(Some(value))
}

fn returned_bool(block: &[Stmt]) -> Option<bool> {
    match block {
        [
            Stmt {
                kind:
                    StmtKind::Return(Some(Expr {
                        kind: ExprKind::Constant(Constant::Bool(b)),
                        ..
                    })),
                ..
            },
        ] => Some(*b),
        _ => None,
    }
}
