use derive_more::Display;

/// Python exception classes the interpreter can raise or construct.
///
/// Outcomes are compared by class only, so the message is informational.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Exception,
    TypeError,
    ValueError,
    IndexError,
    KeyError,
    NameError,
    UnboundLocalError,
    AttributeError,
    ZeroDivisionError,
    OverflowError,
    RecursionError,
    RuntimeError,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 12] = [
        ExceptionKind::Exception,
        ExceptionKind::TypeError,
        ExceptionKind::ValueError,
        ExceptionKind::IndexError,
        ExceptionKind::KeyError,
        ExceptionKind::NameError,
        ExceptionKind::UnboundLocalError,
        ExceptionKind::AttributeError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::OverflowError,
        ExceptionKind::RecursionError,
        ExceptionKind::RuntimeError,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.to_string() == name)
    }
}

/// A raised (or constructed) exception instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ExceptionKind::ALL {
            assert_eq!(ExceptionKind::from_name(&kind.to_string()), Some(kind));
        }
        assert_eq!(ExceptionKind::from_name("StopIteration"), None);
    }

    #[test]
    fn test_display() {
        let err = Exception::new(ExceptionKind::IndexError, "list index out of range");
        assert_eq!(err.to_string(), "IndexError: list index out of range");
        assert_eq!(
            Exception::new(ExceptionKind::ValueError, "").to_string(),
            "ValueError"
        );
    }
}
