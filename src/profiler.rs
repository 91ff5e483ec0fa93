//! Wall-clock comparison of a reference and a candidate on one heavy input.

use std::time::{Duration, Instant};

use refactory_ast::FunctionDef;
use refactory_eval::{ExecutionBudget, run_until};
use serde::Serialize;
use tracing::warn;

use crate::corpus::PerfCase;
use crate::error::{EngineError, Result, Role};

/// Candidate means below this are treated as unmeasurable.
pub const MEASURABLE_FLOOR: Duration = Duration::from_micros(1);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimingReport {
    pub repeats: usize,
    #[serde(with = "duration_secs")]
    pub reference_mean: Duration,
    #[serde(with = "duration_secs")]
    pub candidate_mean: Duration,
    /// `reference_mean / candidate_mean`, or exactly `1.0` when the
    /// candidate is too fast to measure.
    pub speedup: f64,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Mean of `runs` runs that took `total` together.
pub fn average(total: Duration, runs: usize) -> Duration {
    total.div_f64(runs.max(1) as f64)
}

pub fn speedup(reference_mean: Duration, candidate_mean: Duration) -> f64 {
    if candidate_mean < MEASURABLE_FLOOR {
        return 1.0;
    }
    reference_mean.as_secs_f64() / candidate_mean.as_secs_f64()
}

pub struct PerformanceProfiler {
    budget: ExecutionBudget,
    default_repeats: usize,
}

impl PerformanceProfiler {
    pub fn new(budget: ExecutionBudget, default_repeats: usize) -> Self {
        Self {
            budget,
            default_repeats,
        }
    }

    /// Times both functions on `case`. Argument construction is not timed;
    /// outcomes are ignored. All runs of one call share a single
    /// `timeout_ms` deadline.
    pub fn measure(
        &self,
        reference: &FunctionDef,
        candidate: &FunctionDef,
        case: &PerfCase,
    ) -> Result<TimingReport> {
        let repeats = case.repeats.unwrap_or(self.default_repeats).max(1);
        let deadline = Instant::now().checked_add(self.budget.timeout());
        let reference_mean = self.mean(Role::Reference, reference, case, repeats, deadline)?;
        let candidate_mean = self.mean(Role::Candidate, candidate, case, repeats, deadline)?;
        Ok(TimingReport {
            repeats,
            reference_mean,
            candidate_mean,
            speedup: speedup(reference_mean, candidate_mean),
        })
    }

    fn mean(
        &self,
        role: Role,
        function: &FunctionDef,
        case: &PerfCase,
        repeats: usize,
        deadline: Option<Instant>,
    ) -> Result<Duration> {
        let mut total = Duration::ZERO;
        for _ in 0..repeats {
            let args = case.values()?;
            let start = Instant::now();
            let result = run_until(function, args, &self.budget, deadline);
            total += start.elapsed();
            if let Err(error) = result {
                warn!(
                    function = %function.name,
                    %role,
                    %error,
                    "timing run exceeded its budget"
                );
                return Err(EngineError::execution(role, 0, error));
            }
        }
        Ok(average(total, repeats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refactory_ast::parse_function;
    use serde_json::json;

    #[test]
    fn test_speedup_is_guarded() {
        assert_eq!(speedup(Duration::from_millis(5), Duration::ZERO), 1.0);
        assert_eq!(
            speedup(Duration::from_millis(4), Duration::from_millis(2)),
            2.0
        );
    }

    #[test]
    fn test_average_keeps_large_run_counts() {
        let runs = u32::MAX as usize + 2;
        let total = Duration::from_secs(runs as u64);
        let mean = average(total, runs);
        assert!(mean.abs_diff(Duration::from_secs(1)) < Duration::from_millis(1), "{mean:?}");
        let mean = average(Duration::from_millis(6), 3);
        assert!(mean.abs_diff(Duration::from_millis(2)) < Duration::from_micros(1), "{mean:?}");
    }

    #[test]
    fn test_measure_reports_requested_repeats() {
        let reference = parse_function(
            "def f(lst):\n    t = 0\n    for x in lst:\n        t += x\n    return t\n",
        )
        .unwrap()
        .function;
        let candidate = parse_function("def f(lst):\n    return sum(lst)\n")
            .unwrap()
            .function;
        let case = PerfCase {
            args: vec![json!({ "range": 2_000 })],
            repeats: Some(3),
        };
        let report = PerformanceProfiler::new(ExecutionBudget::default(), 5)
            .measure(&reference, &candidate, &case)
            .unwrap();
        assert_eq!(report.repeats, 3);
        assert!(report.speedup > 0.0);
        assert!(report.reference_mean > Duration::ZERO);
    }

    #[test]
    fn test_zero_repeats_still_runs_once() {
        let function = parse_function("def f():\n    return 1\n").unwrap().function;
        let case = PerfCase {
            args: vec![],
            repeats: Some(0),
        };
        let report = PerformanceProfiler::new(ExecutionBudget::default(), 5)
            .measure(&function, &function, &case)
            .unwrap();
        assert_eq!(report.repeats, 1);
    }
}
