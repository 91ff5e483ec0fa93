//! Differential testing of a candidate rewrite against its reference.

use refactory_ast::FunctionDef;
use std::time::Instant;

use refactory_eval::{ExecutionBudget, Outcome, py_eq, run_until};
use serde::Serialize;
use tracing::warn;

use crate::corpus::TestCase;
use crate::error::{EngineError, Result, Role};

/// The first test case on which two functions disagree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Divergence {
    pub case: usize,
    pub args: String,
    pub reference: String,
    pub candidate: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Verdict {
    Equivalent { cases: usize },
    Diverged(Divergence),
}

impl Verdict {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Verdict::Equivalent { .. })
    }
}

/// Two outcomes agree when both raised the same exception class or both
/// returned values that compare equal.
pub fn outcomes_agree(reference: &Outcome, candidate: &Outcome) -> bool {
    match (reference, candidate) {
        (Outcome::Raised(a), Outcome::Raised(b)) => a.kind == b.kind,
        (Outcome::Returned(a), Outcome::Returned(b)) => py_eq(a, b).unwrap_or(false),
        _ => false,
    }
}

pub struct EquivalenceOracle {
    budget: ExecutionBudget,
}

impl EquivalenceOracle {
    pub fn new(budget: ExecutionBudget) -> Self {
        Self { budget }
    }

    /// Runs both functions on every case in order and stops at the first
    /// disagreement. A run that exhausts its budget is an error, and all runs
    /// of one call share a single `timeout_ms` deadline.
    pub fn check(
        &self,
        reference: &FunctionDef,
        candidate: &FunctionDef,
        cases: &[TestCase],
    ) -> Result<Verdict> {
        let deadline = Instant::now().checked_add(self.budget.timeout());
        for (i, case) in cases.iter().enumerate() {
            let expected = self.run(Role::Reference, reference, i, case, deadline)?;
            let actual = self.run(Role::Candidate, candidate, i, case, deadline)?;
            if !outcomes_agree(&expected, &actual) {
                return Ok(Verdict::Diverged(Divergence {
                    case: i,
                    args: case.describe(),
                    reference: expected.summary(),
                    candidate: actual.summary(),
                }));
            }
        }
        Ok(Verdict::Equivalent { cases: cases.len() })
    }

    fn run(
        &self,
        role: Role,
        function: &FunctionDef,
        index: usize,
        case: &TestCase,
        deadline: Option<Instant>,
    ) -> Result<Outcome> {
        match run_until(function, case.values()?, &self.budget, deadline) {
            Ok(execution) => Ok(execution.outcome),
            Err(error) => {
                warn!(
                    function = %function.name,
                    %role,
                    case = index,
                    %error,
                    "run exceeded its budget"
                );
                Err(EngineError::execution(role, index, error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineErrorKind;
    use refactory_ast::parse_function;
    use serde_json::json;

    fn function(source: &str) -> FunctionDef {
        parse_function(source).unwrap().function
    }

    fn cases(args: &[serde_json::Value]) -> Vec<TestCase> {
        args.iter().map(|arg| TestCase::new(vec![arg.clone()])).collect()
    }

    #[test]
    fn test_equal_values_agree_across_numeric_types() {
        let reference = function("def f(x):\n    return x * 2\n");
        let candidate = function("def f(x):\n    return x * 2.0\n");
        let verdict = EquivalenceOracle::new(ExecutionBudget::default())
            .check(&reference, &candidate, &cases(&[json!(1), json!(-4)]))
            .unwrap();
        assert_eq!(verdict, Verdict::Equivalent { cases: 2 });
    }

    #[test]
    fn test_first_divergence_is_reported() {
        let reference = function("def f(x):\n    return x\n");
        let candidate = function("def f(x):\n    return abs(x)\n");
        let verdict = EquivalenceOracle::new(ExecutionBudget::default())
            .check(
                &reference,
                &candidate,
                &cases(&[json!(3), json!(-1), json!(-2)]),
            )
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Diverged(Divergence {
                case: 1,
                args: "(-1)".into(),
                reference: "returned -1".into(),
                candidate: "returned 1".into(),
            })
        );
    }

    #[test]
    fn test_exception_classes_are_compared() {
        let reference = function("def f(x):\n    return [][x]\n");
        let same = function("def f(x):\n    raise IndexError('other message')\n");
        let other = function("def f(x):\n    raise ValueError\n");
        let oracle = EquivalenceOracle::new(ExecutionBudget::default());
        let tests = cases(&[json!(0)]);

        assert!(oracle.check(&reference, &same, &tests).unwrap().is_equivalent());
        assert!(!oracle.check(&reference, &other, &tests).unwrap().is_equivalent());
    }

    #[test]
    fn test_value_never_equals_exception() {
        let reference = function("def f(x):\n    return None\n");
        let candidate = function("def f(x):\n    raise Exception\n");
        let verdict = EquivalenceOracle::new(ExecutionBudget::default())
            .check(&reference, &candidate, &cases(&[json!(0)]))
            .unwrap();
        assert!(!verdict.is_equivalent());
    }

    #[test]
    fn test_candidate_timeout_is_an_error() {
        let reference = function("def f(x):\n    return x\n");
        let candidate = function("def f(x):\n    while True:\n        x += 1\n");
        let budget = ExecutionBudget {
            max_steps: 5_000,
            ..ExecutionBudget::default()
        };
        let err = EquivalenceOracle::new(budget)
            .check(&reference, &candidate, &cases(&[json!(0)]))
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            EngineErrorKind::ExecutionTimeout {
                role: Role::Candidate,
                case: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_no_cases_is_vacuously_equivalent() {
        let reference = function("def f():\n    return 1\n");
        let candidate = function("def f():\n    return 2\n");
        let verdict = EquivalenceOracle::new(ExecutionBudget::default())
            .check(&reference, &candidate, &[])
            .unwrap();
        assert_eq!(verdict, Verdict::Equivalent { cases: 0 });
    }
}
