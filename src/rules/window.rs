//! Shared machinery for rules that rewrite a run of consecutive top-level
//! statements.

use refactory_ast::*;

/// True when `stmt` is `return <name>`.
pub(crate) fn returns_name(stmt: &Stmt, name: &str) -> bool {
    matches!(&stmt.kind, StmtKind::Return(Some(value)) if value.as_name() == Some(name))
}

/// `return <func>(<arg>)`.
pub(crate) fn return_call(func: &str, arg: Expr) -> Stmt {
    let call = ExprKind::Call {
        func: Box::new(Expr::name(func)),
        args: vec![arg],
    };
    Stmt::synthetic(StmtKind::Return(Some(Expr::synthetic(call))))
}

/// Offers every window of `width` consecutive statements to `rewrite`,
/// lowest index first, and replaces the first window it builds a
/// replacement for. The splice is the only change made to `body`.
pub(crate) fn splice_first(
    body: &mut Vec<Stmt>,
    width: usize,
    rewrite: impl Fn(&[Stmt]) -> Option<Stmt>,
) -> bool {
    if width == 0 {
        return false;
    }
    let found = body
        .windows(width)
        .enumerate()
        .find_map(|(start, window)| rewrite(window).map(|stmt| (start, window_span(window), stmt)));
    let Some((start, span, mut replacement)) = found else {
        return false;
    };
    if replacement.span.is_synthetic() {
        replacement.span = span;
    }
    body.splice(start..start + width, [replacement]);
    true
}

fn window_span(window: &[Stmt]) -> Span {
    window
        .iter()
        .fold(Span::SYNTHETIC, |span, stmt| span.to(stmt.span))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts(source: &str) -> Vec<Stmt> {
        parse_function(source).unwrap().function.body
    }

    #[test]
    fn test_first_window_wins() {
        let mut body = stmts("def f():\n    a = 1\n    pass\n    b = 2\n    pass\n");
        let applied = splice_first(&mut body, 2, |window| match &window[0].kind {
            StmtKind::Assign { .. } => Some(Stmt::synthetic(StmtKind::Break)),
            _ => None,
        });
        assert!(applied);
        assert_eq!(body.len(), 3);
        assert_eq!(body[0].kind, StmtKind::Break);
        assert!(!body[0].span.is_synthetic());
        assert!(matches!(body[1].kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn test_short_body_never_matches() {
        let mut body = stmts("def f():\n    pass\n");
        assert!(!splice_first(&mut body, 3, |_| Some(Stmt::synthetic(StmtKind::Pass))));
        assert_eq!(body.len(), 1);
    }
}
