//! Execution budgets and the meter that enforces them.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// Limits applied to a single run of a function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionBudget {
    /// Evaluation steps (statements, expressions and per-element builtin
    /// work) before the run is abandoned.
    pub max_steps: u64,
    /// Wall-clock limit in milliseconds.
    pub timeout_ms: u64,
    /// Nested calls of the function itself before `RecursionError`. Values
    /// above [`MAX_CALL_DEPTH`] are clamped.
    pub max_call_depth: usize,
    /// Longest list, tuple or string (in characters) a run may build.
    pub max_sequence_len: usize,
    /// Bytes of captured `print` output.
    pub max_output_bytes: usize,
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            max_steps: 10_000_000,
            timeout_ms: 2_000,
            max_call_depth: 64,
            max_sequence_len: 1_000_000,
            max_output_bytes: 1 << 20,
        }
    }
}

/// Ceiling on [`ExecutionBudget::max_call_depth`], whatever the config says.
pub const MAX_CALL_DEPTH: usize = 64;

/// Statements and expressions the evaluator may have in progress at once,
/// counted across calls. Past this a run raises `RecursionError`.
pub const MAX_NESTING: usize = 256;

impl ExecutionBudget {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn call_depth_limit(&self) -> usize {
        self.max_call_depth.min(MAX_CALL_DEPTH)
    }
}

const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Counts steps against an [`ExecutionBudget`].
#[derive(Debug)]
pub struct Meter {
    steps: u64,
    max_steps: u64,
    started: Instant,
    deadline: Option<Instant>,
    next_clock_check: u64,
}

impl Meter {
    pub fn start(budget: &ExecutionBudget) -> Self {
        Self::start_until(budget, None)
    }

    /// Like [`Meter::start`], but also stops at `limit` when that comes
    /// before the budget's own deadline.
    pub fn start_until(budget: &ExecutionBudget, limit: Option<Instant>) -> Self {
        let started = Instant::now();
        let own = started.checked_add(budget.timeout());
        let deadline = match (own, limit) {
            (Some(own), Some(limit)) => Some(own.min(limit)),
            (own, limit) => own.or(limit),
        };
        Self {
            steps: 0,
            max_steps: budget.max_steps,
            started,
            deadline,
            next_clock_check: CLOCK_CHECK_INTERVAL,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Consumes `cost` steps, failing once either the step fuel or the
    /// deadline is exhausted.
    pub fn tick(&mut self, cost: u64) -> Result<(), ExecutionError> {
        self.steps = self.steps.saturating_add(cost);
        if self.steps > self.max_steps {
            return Err(self.timeout());
        }
        if self.steps >= self.next_clock_check {
            self.next_clock_check = self.steps.saturating_add(CLOCK_CHECK_INTERVAL);
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(self.timeout());
            }
        }
        Ok(())
    }

    fn timeout(&self) -> ExecutionError {
        ExecutionError::Timeout {
            steps: self.steps,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_exhaustion() {
        let budget = ExecutionBudget {
            max_steps: 10,
            ..ExecutionBudget::default()
        };
        let mut meter = Meter::start(&budget);
        assert!(meter.tick(10).is_ok());
        assert!(matches!(
            meter.tick(1),
            Err(ExecutionError::Timeout { steps: 11, .. })
        ));
    }

    #[test]
    fn test_deadline_exhaustion() {
        let budget = ExecutionBudget {
            timeout_ms: 0,
            ..ExecutionBudget::default()
        };
        let mut meter = Meter::start(&budget);
        assert!(matches!(
            meter.tick(CLOCK_CHECK_INTERVAL),
            Err(ExecutionError::Timeout { .. })
        ));
    }

    #[test]
    fn test_shared_deadline_overrides_a_later_one() {
        let budget = ExecutionBudget::default();
        let mut meter = Meter::start_until(&budget, Some(Instant::now()));
        assert!(matches!(
            meter.tick(CLOCK_CHECK_INTERVAL),
            Err(ExecutionError::Timeout { .. })
        ));

        let later = Instant::now() + Duration::from_secs(3600);
        let mut meter = Meter::start_until(&budget, Some(later));
        assert!(meter.tick(CLOCK_CHECK_INTERVAL).is_ok());
    }

    #[test]
    fn test_call_depth_is_clamped() {
        let budget = ExecutionBudget {
            max_call_depth: 1_000_000,
            ..ExecutionBudget::default()
        };
        assert_eq!(budget.call_depth_limit(), MAX_CALL_DEPTH);
        let budget = ExecutionBudget {
            max_call_depth: 8,
            ..ExecutionBudget::default()
        };
        assert_eq!(budget.call_depth_limit(), 8);
    }

    #[test]
    fn test_budget_deserializes_with_defaults() {
        let budget: ExecutionBudget = serde_json::from_str(r#"{"max_steps": 5}"#).unwrap();
        assert_eq!(budget.max_steps, 5);
        assert_eq!(budget.timeout_ms, ExecutionBudget::default().timeout_ms);
    }
}
