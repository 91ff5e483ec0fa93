//! Syntax tree model for single Python functions.
//!
//! Parses one `def` into an owned tree, prints it back canonically and
//! provides the traversals the rewrite rules are built on.

pub mod ast;
pub mod features;
pub mod parser;
pub mod printer;
pub mod walk;

pub use ast::*;
pub use features::{TreeFeatures, has_docstring};
pub use parser::{FunctionParser, ParseError, parse_function};
