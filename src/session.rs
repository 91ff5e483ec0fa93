//! One rewrite attempt: apply a rule, verify the candidate, and optionally
//! time it.

use refactory_ast::SyntaxTree;
use serde::Serialize;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::corpus::{CorpusEntry, PerfCase, TestCase};
use crate::error::Result;
use crate::oracle::{Divergence, EquivalenceOracle, Verdict};
use crate::profiler::{PerformanceProfiler, TimingReport};
use crate::rules::{RewriteResult, RuleKind};

/// Where an attempt stands. `Accepted` and `Rejected` are terminal.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Ready(SyntaxTree),
    Matched {
        tree: SyntaxTree,
        candidate: SyntaxTree,
    },
    Accepted(SyntaxTree),
    Rejected(SyntaxTree),
}

/// Why an attempt ended the way it did.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Status {
    /// The rule's pattern does not occur in the tree.
    NoMatch,
    /// The rule applied but the candidate behaves differently from the
    /// reference, which points at a gap in the rule.
    SoundnessViolation(Divergence),
    Accepted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransformationOutcome {
    pub rule: RuleKind,
    pub applied: bool,
    pub accepted: bool,
    pub status: Status,
    /// The candidate when accepted, otherwise the input tree.
    pub new_tree: SyntaxTree,
    /// Non-whitespace characters saved by the candidate.
    pub size_delta: i64,
    pub timing: Option<TimingReport>,
    pub heuristic_score: Option<f64>,
}

impl TransformationOutcome {
    pub fn divergence(&self) -> Option<&Divergence> {
        match &self.status {
            Status::SoundnessViolation(divergence) => Some(divergence),
            _ => None,
        }
    }
}

/// Drives attempts for one function. The reference is always the tree
/// parsed from the original source, whatever tree an attempt starts from.
pub struct TransformationSession<'a> {
    reference: SyntaxTree,
    tests: &'a [TestCase],
    perf: Option<&'a PerfCase>,
    config: &'a EngineConfig,
}

impl<'a> TransformationSession<'a> {
    pub fn new(entry: &'a CorpusEntry, config: &'a EngineConfig) -> Result<Self> {
        Ok(Self {
            reference: entry.parse()?,
            tests: &entry.tests,
            perf: entry.perf.as_ref(),
            config,
        })
    }

    pub fn reference(&self) -> &SyntaxTree {
        &self.reference
    }

    /// Attempts `rule` on `tree`, which the session owns until the outcome
    /// hands it (or its replacement) back.
    pub fn attempt(&self, tree: SyntaxTree, rule: RuleKind) -> Result<TransformationOutcome> {
        let input_size = tree.code_size() as i64;
        let mut state = SessionState::Ready(tree);
        let mut status = Status::NoMatch;
        let mut timing = None;

        let outcome = loop {
            state = match state {
                SessionState::Ready(tree) => {
                    let RewriteResult {
                        tree: candidate,
                        applied,
                    } = rule.apply(tree.clone());
                    if applied {
                        SessionState::Matched { tree, candidate }
                    } else {
                        SessionState::Rejected(tree)
                    }
                }
                SessionState::Matched { tree, candidate } => {
                    match self.verify(&candidate)? {
                        Verdict::Equivalent { .. } => {
                            timing = self.time(&tree, &candidate)?;
                            status = Status::Accepted;
                            SessionState::Accepted(candidate)
                        }
                        Verdict::Diverged(divergence) => {
                            error!(
                                rule = rule.name(),
                                function = %self.reference.function.name,
                                case = divergence.case,
                                args = %divergence.args,
                                reference = %divergence.reference,
                                candidate = %divergence.candidate,
                                "soundness violation: rewrite changed behavior"
                            );
                            status = Status::SoundnessViolation(divergence);
                            SessionState::Rejected(tree)
                        }
                    }
                }
                SessionState::Accepted(candidate) => {
                    let size_delta = input_size - candidate.code_size() as i64;
                    let score = match &timing {
                        Some(TimingReport { speedup, .. }) => {
                            size_delta as f64 + self.config.speed_weight * (speedup - 1.0)
                        }
                        None => size_delta as f64,
                    };
                    info!(
                        rule = rule.name(),
                        function = %candidate.function.name,
                        size_delta,
                        speedup = timing.as_ref().map(|t| t.speedup),
                        "rewrite accepted"
                    );
                    break TransformationOutcome {
                        rule,
                        applied: true,
                        accepted: true,
                        status,
                        new_tree: candidate,
                        size_delta,
                        timing,
                        heuristic_score: Some(score),
                    };
                }
                SessionState::Rejected(tree) => {
                    break TransformationOutcome {
                        rule,
                        applied: status != Status::NoMatch,
                        accepted: false,
                        status,
                        new_tree: tree,
                        size_delta: 0,
                        timing: None,
                        heuristic_score: None,
                    };
                }
            };
        };
        Ok(outcome)
    }

    fn verify(&self, candidate: &SyntaxTree) -> Result<Verdict> {
        EquivalenceOracle::new(self.config.budget.clone()).check(
            &self.reference.function,
            &candidate.function,
            self.tests,
        )
    }

    /// Times the candidate against the tree it was rewritten from, the same
    /// baseline the size delta uses.
    fn time(&self, input: &SyntaxTree, candidate: &SyntaxTree) -> Result<Option<TimingReport>> {
        let Some(perf) = self.perf.filter(|_| self.config.profile) else {
            return Ok(None);
        };
        let profiler =
            PerformanceProfiler::new(self.config.budget.clone(), self.config.perf_repeats);
        Ok(Some(profiler.measure(
            &input.function,
            &candidate.function,
            perf,
        )?))
    }
}
