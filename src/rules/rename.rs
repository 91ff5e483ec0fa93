use refactory_ast::walk::{all_names, bound_names, rename};
use refactory_ast::*;

/// Renames the longest multi-character local (first one found on ties) to
/// the first letter of `a..z` no identifier in the function uses yet.
/// Returns the old and new names.
pub(crate) fn compress_variable(function: &mut FunctionDef) -> Option<(String, String)> {
    let (from, to) = {
        let mut longest: Option<(&str, usize)> = None;
        for name in bound_names(function) {
            let len = name.chars().count();
            if len > 1 && longest.is_none_or(|(_, best)| len > best) {
                longest = Some((name, len));
            }
        }
        let (from, _) = longest?;

        let used = all_names(function);
        let to = ('a'..='z')
            .map(String::from)
            .find(|letter| !used.contains(letter.as_str()) && *letter != function.name)?;
        (from.to_owned(), to)
    };
    rename(function, &from, &to);
    Some((from, to))
}
