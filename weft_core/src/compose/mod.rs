//! Graph composition.
//!
//! Two strategies turn a [`TaskTransitionModel`] into a [`WorkflowGraph`]:
//!
//! - [`DirectComposer`]: one node per task. Split points are annotated
//!   with instance `0` but not instantiated.
//! - [`ExpandingComposer`]: split points become numbered instance nodes
//!   (`name__N`), so no node is shared across branches.
//!
//! Both are pure: they read the model and return a fresh graph.

mod direct;
mod expand;

pub use direct::DirectComposer;
pub use expand::ExpandingComposer;

use crate::graph::{GraphError, WorkflowGraph};
use crate::model::TaskTransitionModel;
use thiserror::Error;

/// Errors that can occur during composition.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// Graph API misuse while building the graph
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Every task has a predecessor
    #[error("Unable to identify start tasks; the workflow may be a cycle with no entry point")]
    NoStartTasks,

    /// A clause names a task that is not defined
    #[error("Task \"{origin}\" transitions to undefined task \"{task}\"")]
    UnknownTask {
        /// Undefined destination
        task: String,
        /// Task owning the clause
        origin: String,
    },

    /// Input goes beyond a configured bound
    #[error("Composition limit exceeded: {limit} is capped at {max}")]
    LimitExceeded {
        /// Name of the bound
        limit: &'static str,
        /// Configured maximum
        max: usize,
    },

    /// Guard rewriting pattern could not be built
    #[error("Invalid guard rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A composition strategy.
pub trait GraphComposer {
    /// Builds a workflow graph from the model.
    fn compose(&self, model: &TaskTransitionModel) -> Result<WorkflowGraph, ComposeError>;
}
