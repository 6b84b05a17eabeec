//! WeftKit - Workflow definition compiler.
//!
//! This crate compiles declarative workflow definitions (named tasks joined
//! by guarded transitions, with loops, fan-out and fan-in) into executable
//! task-transition graphs, and statically analyzes the same definitions.
//!
//! # Overview
//!
//! ```text
//! definition ──> TaskTransitionModel ──┬──> GraphComposer ──> WorkflowGraph
//!                                      └──> analysis passes ──> InspectionReport
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use weft_core::{
//!     load_definition_from_string, ExpandingComposer, GraphComposer, Inspector,
//!     TaskTransitionModel,
//! };
//! use weft_expr::EvaluatorRegistry;
//!
//! let definition = load_definition_from_string(r#"
//! tasks:
//!   task1:
//!     next: [{do: [task2, task3]}]
//!   task2:
//!     next: [{do: task4}]
//!   task3:
//!     next: [{do: task4}]
//!   task4: {}
//! "#).unwrap();
//!
//! let registry = EvaluatorRegistry::default();
//! assert!(Inspector::new(&registry).inspect(&definition).is_valid());
//!
//! let model = TaskTransitionModel::from(&definition);
//! let graph = ExpandingComposer::default().compose(&model).unwrap();
//! assert!(graph.has_task("task4__1"));
//! assert!(graph.has_task("task4__2"));
//! ```
//!
//! # Modules
//!
//! - [`definition`]: YAML workflow document and loaders
//! - [`model`]: Read-only task transition model
//! - [`graph`]: Workflow multigraph and its serialized form
//! - [`compose`]: Direct and split-expanding composers
//! - [`analysis`]: Syntax, expression, context and structural passes
//! - [`inspect`]: Combined inspection report
//! - [`config`]: Composition limits

pub mod analysis;
pub mod compose;
pub mod config;
pub mod definition;
pub mod graph;
pub mod inspect;
pub mod model;

pub use compose::{ComposeError, DirectComposer, ExpandingComposer, GraphComposer};
pub use config::ComposerConfig;
pub use definition::{
    load_definition_from_file, load_definition_from_string, DefinitionError, WorkflowDefinition,
};
pub use graph::{GraphError, SerializedGraph, WorkflowGraph};
pub use inspect::{Category, InspectionReport, Inspector};
pub use model::TaskTransitionModel;
pub use weft_expr::{Diagnostic, EvaluatorRegistry};
