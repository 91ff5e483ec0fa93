//! A hand-written search strategy over the three primitives: keep taking
//! the first rule in catalog order that the oracle accepts.

use refactory_ast::SyntaxTree;
use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::corpus::CorpusEntry;
use crate::error::Result;
use crate::rules::RuleKind;
use crate::session::{Status, TransformationSession};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Step {
    pub rule: RuleKind,
    pub size_delta: i64,
    pub heuristic_score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeReport {
    pub function: String,
    pub steps: Vec<Step>,
    /// Rules that applied but were rejected, with the step they were tried at.
    pub violations: Vec<(usize, RuleKind)>,
    pub tree: SyntaxTree,
}

/// Greedily rewrites `entry` until no rule is accepted or the configured
/// step limit is reached.
pub fn optimize(entry: &CorpusEntry, config: &EngineConfig) -> Result<OptimizeReport> {
    let session = TransformationSession::new(entry, config)?;
    let mut tree = session.reference().clone();
    let mut steps = Vec::new();
    let mut violations = Vec::new();

    'search: for step in 0..config.max_optimize_steps {
        for rule in RuleKind::ALL {
            let outcome = session.attempt(tree, rule)?;
            tree = outcome.new_tree;
            match outcome.status {
                Status::Accepted => {
                    steps.push(Step {
                        rule,
                        size_delta: outcome.size_delta,
                        heuristic_score: outcome.heuristic_score,
                    });
                    continue 'search;
                }
                Status::SoundnessViolation(_) => violations.push((step, rule)),
                Status::NoMatch => {}
            }
        }
        debug!(function = %entry.name, step, "no rule accepted");
        break;
    }

    Ok(OptimizeReport {
        function: entry.name.clone(),
        steps,
        violations,
        tree,
    })
}
