use refactory_ast::*;

/// Drops a leading string-literal statement. A function left without
/// statements gets a `pass` in the docstring's place.
pub(crate) fn remove_docstring(function: &mut FunctionDef) -> bool {
    if !has_docstring(function) {
        return false;
    }
    let docstring = function.body.remove(0);
    if function.body.is_empty() {
        function
            .body
            .push(Stmt::new(StmtKind::Pass, docstring.span));
    }
    true
}
