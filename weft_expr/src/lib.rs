//! WeftKit expression layer.
//!
//! Workflow definitions embed small expressions inside string values.
//! This crate recognizes, validates and evaluates them, and statically
//! extracts the context variables they reference.
//!
//! Two dialects ship by default:
//!
//! - `percent`: `<% ctx(name) %>`, parsed with the crate's own grammar
//! - `brace`: `{{ name }}`, Jinja templates rendered with minijinja
//!
//! # Quick Start
//!
//! ```rust
//! use weft_expr::EvaluatorRegistry;
//! use serde_json::json;
//!
//! let registry = EvaluatorRegistry::default();
//! let value = registry.evaluate("<% ctx(count) + 1 %>", &json!({"count": 1})).unwrap();
//! assert_eq!(value, json!(2));
//!
//! let refs = registry.extract_vars("Hello {{ user.name }}");
//! assert_eq!(refs[0].name, "user");
//! ```

pub mod error;
pub mod evaluator;
pub mod jinja;
pub mod registry;

mod eval;
mod lexer;
mod parser;

pub use error::ExpressionError;
pub use eval::truthy;
pub use evaluator::{DelimitedEvaluator, Diagnostic, ExpressionEvaluator, VariableRef};
pub use jinja::JinjaEvaluator;
pub use registry::EvaluatorRegistry;
