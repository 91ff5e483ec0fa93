//! Rewrite-and-verify engine for small Python functions.
//!
//! A [`RuleKind`] proposes a structural rewrite, the [`EquivalenceOracle`]
//! checks it against the untransformed function by running both in a
//! sandbox, and the [`PerformanceProfiler`] times accepted candidates. A
//! [`TransformationSession`] strings the three together for one attempt.

pub mod config;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod oracle;
pub mod profiler;
pub mod rules;
pub mod session;

pub use config::EngineConfig;
pub use corpus::{Corpus, CorpusEntry, PerfCase, TestCase};
pub use driver::{OptimizeReport, optimize};
pub use error::{EngineError, EngineErrorKind, Result};
pub use oracle::{Divergence, EquivalenceOracle, Verdict};
pub use profiler::{PerformanceProfiler, TimingReport};
pub use rules::{RewriteResult, RuleKind, apply_rule, apply_rule_to_tree};
pub use session::{SessionState, Status, TransformationOutcome, TransformationSession};

pub use refactory_ast::{ParseError, SyntaxTree, parse_function};
pub use refactory_eval::ExecutionBudget;
