use derive_more::Display;

/// A run that was abandoned rather than finished. Never a Python outcome.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ExecutionError {
    #[display("execution budget exhausted after {steps} steps ({elapsed_ms} ms)")]
    Timeout { steps: u64, elapsed_ms: u64 },

    #[display("{resource} limit of {limit} exceeded")]
    ResourceExhausted {
        resource: &'static str,
        limit: usize,
    },
}

impl std::error::Error for ExecutionError {}
