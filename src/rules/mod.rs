//! The rule catalog: a closed set of structural rewrites.
//!
//! Every rule takes a tree by value and hands back either the rewritten tree
//! or the input untouched, together with whether it applied. Matchers only
//! read the statements they inspect and return borrowed captures; builders
//! turn captures into new nodes. Rules scan only the top-level statements
//! of the function body.

mod branch;
mod comprehension;
mod docstring;
mod reduction;
mod rename;
mod window;

use refactory_ast::walk::normalize_spans;
use refactory_ast::{SyntaxTree, parse_function};
use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    RemoveDocstring,
    CompressVariable,
    LoopToSum,
    LoopToMax,
    CollapseBoolBranch,
    AppendToComprehension,
}

/// The result of dispatching a rule.
#[derive(Clone, Debug, PartialEq)]
pub struct RewriteResult {
    pub tree: SyntaxTree,
    pub applied: bool,
}

impl RuleKind {
    /// Catalog order; a rule's position is its id.
    pub const ALL: [RuleKind; 6] = [
        RuleKind::RemoveDocstring,
        RuleKind::CompressVariable,
        RuleKind::LoopToSum,
        RuleKind::LoopToMax,
        RuleKind::CollapseBoolBranch,
        RuleKind::AppendToComprehension,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn from_id(id: usize) -> Result<Self> {
        Self::ALL
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::invalid_rule_id(id))
    }

    pub fn id(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RuleKind::RemoveDocstring => "remove_docstring",
            RuleKind::CompressVariable => "compress_variable",
            RuleKind::LoopToSum => "loop_to_sum",
            RuleKind::LoopToMax => "loop_to_max",
            RuleKind::CollapseBoolBranch => "collapse_bool_branch",
            RuleKind::AppendToComprehension => "append_to_comprehension",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RuleKind::RemoveDocstring => "drop a leading docstring",
            RuleKind::CompressVariable => "rename the longest local to a free one-letter name",
            RuleKind::LoopToSum => "`t = 0; for x in S: ...; return t` -> `return sum(S)`",
            RuleKind::LoopToMax => "`m = X[i]; for ...: if ...; return m` -> `return max(X)`",
            RuleKind::CollapseBoolBranch => {
                "`if C: return True else: return False` -> `return C`"
            }
            RuleKind::AppendToComprehension => {
                "`r = []; for T in S: r.append(E); return r` -> `return [E for T in S]`"
            }
        }
    }

    /// Applies the rule to `tree`.
    pub fn apply(self, mut tree: SyntaxTree) -> RewriteResult {
        let function = &mut tree.function;
        let applied = match self {
            RuleKind::RemoveDocstring => docstring::remove_docstring(function),
            RuleKind::CompressVariable => match rename::compress_variable(function) {
                Some((from, to)) => {
                    debug!(%from, %to, "compressing variable");
                    true
                }
                None => false,
            },
            RuleKind::LoopToSum => {
                window::splice_first(&mut function.body, 3, reduction::loop_to_sum)
            }
            RuleKind::LoopToMax => {
                window::splice_first(&mut function.body, 3, reduction::loop_to_max)
            }
            RuleKind::CollapseBoolBranch => {
                let mut applied = false;
                for stmt in &mut function.body {
                    if let Some((condition, then)) = branch::match_bool_branch(stmt) {
                        let kind = branch::build_return(condition, then);
                        stmt.kind = kind;
                        applied = true;
                    }
                }
                applied
            }
            RuleKind::AppendToComprehension => window::splice_first(
                &mut function.body,
                3,
                comprehension::append_to_comprehension,
            ),
        };
        if applied {
            normalize_spans(function);
        }
        debug!(
            rule = self.name(),
            function = %tree.function.name,
            applied,
            "rule dispatched"
        );
        RewriteResult { tree, applied }
    }
}

pub fn apply_rule_to_tree(tree: SyntaxTree, rule: RuleKind) -> RewriteResult {
    rule.apply(tree)
}

/// Parses `source`, applies rule `id` and prints the result. An unapplied
/// rule yields the canonical printing of the unchanged input.
pub fn apply_rule(source: &str, id: usize) -> Result<(String, bool)> {
    let rule = RuleKind::from_id(id)?;
    let tree = parse_function(source)?;
    let RewriteResult { tree, applied } = rule.apply(tree);
    Ok((tree.unparse(), applied))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(source: &str, rule: RuleKind) -> (String, bool) {
        let RewriteResult { tree, applied } = rule.apply(parse_function(source).unwrap());
        (tree.unparse(), applied)
    }

    #[test]
    fn test_ids_follow_catalog_order() {
        for (i, rule) in RuleKind::ALL.iter().enumerate() {
            assert_eq!(rule.id(), i);
            assert_eq!(RuleKind::from_id(i).unwrap(), *rule);
        }
        assert!(RuleKind::from_id(RuleKind::COUNT).is_err());
    }

    #[test]
    fn test_docstring_only_body_becomes_pass() {
        let (source, applied) = rewrite(
            "def f():\n    \"\"\"doc\"\"\"\n",
            RuleKind::RemoveDocstring,
        );
        assert!(applied);
        assert_eq!(source, "def f():\n    pass\n");
    }

    #[test]
    fn test_docstring_must_come_first() {
        let (_, applied) = rewrite(
            "def f():\n    x = 1\n    'late'\n    return x\n",
            RuleKind::RemoveDocstring,
        );
        assert!(!applied);
    }

    #[test]
    fn test_compression_tie_goes_to_first_bound() {
        let (source, applied) = rewrite(
            "def f(ab, cd):\n    return ab + cd\n",
            RuleKind::CompressVariable,
        );
        assert!(applied);
        assert_eq!(source, "def f(a, cd):\n    return a + cd\n");
    }

    #[test]
    fn test_compression_skips_letters_in_use() {
        let (source, _) = rewrite(
            "def f(a, b):\n    result = a + b + c\n    return result\n",
            RuleKind::CompressVariable,
        );
        assert_eq!(source, "def f(a, b):\n    d = a + b + c\n    return d\n");
    }

    #[test]
    fn test_compression_needs_a_long_name() {
        let (_, applied) = rewrite("def f(x):\n    return x\n", RuleKind::CompressVariable);
        assert!(!applied);
    }

    #[test]
    fn test_sum_requires_single_statement_body() {
        let (_, applied) = rewrite(
            "def f(lst):\n    t = 0\n    for x in lst:\n        t += x\n        print(x)\n    return t\n",
            RuleKind::LoopToSum,
        );
        assert!(!applied);
    }

    #[test]
    fn test_sum_window_may_follow_other_statements() {
        let (source, applied) = rewrite(
            "def f(lst):\n    print(lst)\n    t = 0\n    for x in lst:\n        t += x\n    return t\n",
            RuleKind::LoopToSum,
        );
        assert!(applied);
        assert_eq!(source, "def f(lst):\n    print(lst)\n    return sum(lst)\n");
    }

    #[test]
    fn test_sum_ignores_nested_windows() {
        let (_, applied) = rewrite(
            "def f(lst):\n    if lst:\n        t = 0\n        for x in lst:\n            t += x\n        return t\n    return 0\n",
            RuleKind::LoopToSum,
        );
        assert!(!applied);
    }

    #[test]
    fn test_max_moves_the_subscripted_sequence() {
        let (source, applied) = rewrite(
            "def f(xs):\n    best = xs[-1]\n    for x in xs:\n        if x > best:\n            best = x\n    return best\n",
            RuleKind::LoopToMax,
        );
        assert!(applied);
        assert_eq!(source, "def f(xs):\n    return max(xs)\n");
    }

    #[test]
    fn test_collapse_every_top_level_branch() {
        let (source, applied) = rewrite(
            "def f(x):\n    if x < 0:\n        return False\n    else:\n        return True\n    if x:\n        return True\n    else:\n        return False\n",
            RuleKind::CollapseBoolBranch,
        );
        assert!(applied);
        assert_eq!(source, "def f(x):\n    return not x < 0\n    return x\n");
    }

    #[test]
    fn test_collapse_needs_opposite_literals() {
        let (_, applied) = rewrite(
            "def f(x):\n    if x:\n        return True\n    else:\n        return True\n",
            RuleKind::CollapseBoolBranch,
        );
        assert!(!applied);
    }

    #[test]
    fn test_comprehension_requires_append_on_the_same_list() {
        let (_, applied) = rewrite(
            "def f(lst):\n    res = []\n    other = []\n    for x in lst:\n        other.append(x)\n    return res\n",
            RuleKind::AppendToComprehension,
        );
        assert!(!applied);
    }

    #[test]
    fn test_rewritten_spans_are_positioned() {
        let source = "def f(lst):\n    res = []\n    for x in lst:\n        res.append(x * 2)\n    return res\n";
        let RewriteResult { tree, applied } =
            RuleKind::AppendToComprehension.apply(parse_function(source).unwrap());
        assert!(applied);
        let stmt = &tree.function.body[0];
        assert!(!stmt.span.is_synthetic());
        assert!(tree.function.span.contains(stmt.span));
        let refactory_ast::StmtKind::Return(Some(value)) = &stmt.kind else {
            panic!("expected a return");
        };
        assert!(stmt.span.contains(value.span));
    }
}
