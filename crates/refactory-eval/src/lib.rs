//! Resource-bounded interpreter for single Python functions.
//!
//! Candidate rewrites never run in the host process: [`run`] walks the
//! syntax tree with its own values, captures `print` output per run, and
//! abandons the run once its [`ExecutionBudget`] is spent.

pub mod budget;
pub mod builtins;
pub mod error;
pub mod exception;
pub mod interpreter;
pub mod ops;
pub mod value;

pub use budget::ExecutionBudget;
pub use error::ExecutionError;
pub use exception::{Exception, ExceptionKind};
pub use interpreter::{Execution, Outcome, run, run_until};
pub use value::{Value, py_eq};
