//! Error types for the rewrite engine.
//!
//! Only failures live here. A rule that does not match and a rewrite the
//! oracle rejects are ordinary results (see [`crate::session::Status`]).

use std::path::PathBuf;

use derive_more::Display;
use refactory_ast::ParseError;
use refactory_eval::ExecutionError;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Display, Debug)]
#[display("{kind}")]
pub struct EngineError {
    kind: Box<EngineErrorKind>,
}

impl<E> From<E> for EngineError
where
    EngineErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        EngineError {
            kind: Box::new(EngineErrorKind::from(error)),
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> &EngineErrorKind {
        &self.kind
    }

    pub(crate) fn invalid_rule_id(id: usize) -> Self {
        EngineErrorKind::InvalidRuleId {
            id,
            count: crate::rules::RuleKind::COUNT,
        }
        .into()
    }

    pub(crate) fn unknown_function(name: impl Into<String>) -> Self {
        EngineErrorKind::UnknownFunction(name.into()).into()
    }

    pub(crate) fn corpus(message: impl std::fmt::Display) -> Self {
        EngineErrorKind::Corpus(CorpusError::Invalid(message.to_string())).into()
    }

    /// Classifies a sandbox failure of `role` on test case `case`.
    pub(crate) fn execution(role: Role, case: usize, error: ExecutionError) -> Self {
        match error {
            ExecutionError::Timeout { .. } => {
                EngineErrorKind::ExecutionTimeout { role, case, error }.into()
            }
            ExecutionError::ResourceExhausted { .. } => {
                EngineErrorKind::ResourceExhausted { role, case, error }.into()
            }
        }
    }
}

/// Which side of a differential run failed.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum Role {
    #[display("reference")]
    Reference,
    #[display("candidate")]
    Candidate,
}

#[derive(Display, Debug)]
pub enum EngineErrorKind {
    #[display("invalid rule id {id}: expected a value below {count}")]
    InvalidRuleId { id: usize, count: usize },

    #[display("parse error: {_0}")]
    Parse(ParseError),

    #[display("{role} timed out on case {case}: {error}")]
    ExecutionTimeout {
        role: Role,
        case: usize,
        error: ExecutionError,
    },

    #[display("{role} exhausted its resources on case {case}: {error}")]
    ResourceExhausted {
        role: Role,
        case: usize,
        error: ExecutionError,
    },

    #[display(
        "{function}() takes {expected} argument(s) but {which} supplies {given}"
    )]
    ArityMismatch {
        function: String,
        which: String,
        expected: usize,
        given: usize,
    },

    #[display("unknown function `{_0}`")]
    UnknownFunction(String),

    #[display("corpus error: {_0}")]
    Corpus(CorpusError),
}

#[derive(Display, Debug)]
pub enum CorpusError {
    #[display("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[display("malformed JSON: {_0}")]
    Json(serde_json::Error),

    #[display("{_0}")]
    Invalid(String),
}

impl From<ParseError> for EngineErrorKind {
    fn from(error: ParseError) -> Self {
        EngineErrorKind::Parse(error)
    }
}

impl From<CorpusError> for EngineErrorKind {
    fn from(error: CorpusError) -> Self {
        EngineErrorKind::Corpus(error)
    }
}

impl From<serde_json::Error> for EngineErrorKind {
    fn from(error: serde_json::Error) -> Self {
        EngineErrorKind::Corpus(CorpusError::Json(error))
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            EngineErrorKind::Parse(e) => Some(e),
            EngineErrorKind::ExecutionTimeout { error, .. }
            | EngineErrorKind::ResourceExhausted { error, .. } => Some(error),
            EngineErrorKind::Corpus(CorpusError::Io { source, .. }) => Some(source),
            EngineErrorKind::Corpus(CorpusError::Json(e)) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_errors_are_classified() {
        let timeout = EngineError::execution(
            Role::Candidate,
            2,
            ExecutionError::Timeout {
                steps: 10,
                elapsed_ms: 1,
            },
        );
        assert!(matches!(
            timeout.kind(),
            EngineErrorKind::ExecutionTimeout {
                role: Role::Candidate,
                case: 2,
                ..
            }
        ));
        assert!(timeout.to_string().starts_with("candidate timed out on case 2"));

        let exhausted = EngineError::execution(
            Role::Reference,
            0,
            ExecutionError::ResourceExhausted {
                resource: "sequence length",
                limit: 5,
            },
        );
        assert!(matches!(
            exhausted.kind(),
            EngineErrorKind::ResourceExhausted { .. }
        ));
    }

    #[test]
    fn test_invalid_rule_id_message() {
        let err = EngineError::invalid_rule_id(9);
        assert_eq!(
            err.to_string(),
            "invalid rule id 9: expected a value below 6"
        );
    }
}
