//! Static analysis of workflow definitions.
//!
//! Each pass returns diagnostics instead of failing, so a single
//! inspection surfaces every problem at once.

mod context;
mod expressions;
mod structure;
mod syntax;

pub use context::ContextAnalyzer;
pub use expressions::check_expressions;
pub use structure::check_structure;
pub use syntax::check_syntax;
