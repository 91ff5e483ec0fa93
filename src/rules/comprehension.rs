use refactory_ast::*;

use super::window::returns_name;

pub(crate) struct AppendLoop<'t> {
    element: &'t Expr,
    target: &'t Expr,
    iter: &'t Expr,
}

/// Matches `name = []; for T in S: name.append(E); return name`.
pub(crate) fn match_append_loop(window: &[Stmt]) -> Option<AppendLoop<'_>> {
    let [assign, for_loop, ret] = window else {
        return None;
    };
    if let StmtKind::Assign { target, value } = &assign.kind
        && let Some(list) = target.as_name()
        && matches!(&value.kind, ExprKind::List(items) if items.is_empty())
        && let StmtKind::For { target, iter, body } = &for_loop.kind
        && let [
            Stmt {
                kind: StmtKind::Expr(call),
                ..
            },
        ] = body.as_slice()
        && let ExprKind::Call { func, args } = &call.kind
        && let ExprKind::Attribute {
            value: receiver,
            attr,
        } = &func.kind
        && receiver.as_name() == Some(list)
        && attr == "append"
        && let [element] = args.as_slice()
        && returns_name(ret, list)
    {
        return Some(AppendLoop {
            element,
            target,
            iter,
        });
    }
    None
}

/// `return [E for T in S]`.
pub(crate) fn build_comprehension(captures: AppendLoop<'_>) -> Stmt {
    let comprehension = ExprKind::ListComp {
        element: Box::new(captures.element.clone()),
        target: Box::new(captures.target.clone()),
        iter: Box::new(captures.iter.clone()),
        conditions: Vec::new(),
    };
    Stmt::synthetic(StmtKind::Return(Some(Expr::synthetic(comprehension))))
}

pub(crate) fn append_to_comprehension(window: &[Stmt]) -> Option<Stmt> {
    match_append_loop(window).map(build_comprehension)
}
