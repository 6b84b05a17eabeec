//! Registry of enabled expression dialects.

use crate::error::ExpressionError;
use crate::evaluator::{DelimitedEvaluator, Diagnostic, ExpressionEvaluator, VariableRef};
use crate::jinja::JinjaEvaluator;
use serde_json::Value;

/// The set of expression dialects a workflow may use.
///
/// The registry is an ordinary value: build it once and hand it by
/// reference to whatever needs to evaluate or inspect expressions.
pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn ExpressionEvaluator>>,
}

impl EvaluatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    /// Registers a dialect, replacing any dialect with the same name.
    pub fn register(mut self, evaluator: Box<dyn ExpressionEvaluator>) -> Self {
        self.evaluators
            .retain(|existing| existing.dialect() != evaluator.dialect());
        tracing::debug!("Registered expression dialect {}", evaluator.dialect());
        self.evaluators.push(evaluator);
        self
    }

    /// Looks up a dialect by name.
    pub fn get(&self, dialect: &str) -> Option<&dyn ExpressionEvaluator> {
        self.evaluators
            .iter()
            .find(|evaluator| evaluator.dialect() == dialect)
            .map(|evaluator| evaluator.as_ref())
    }

    /// Returns the registered dialects in registration order.
    pub fn evaluators(&self) -> impl Iterator<Item = &dyn ExpressionEvaluator> {
        self.evaluators.iter().map(|evaluator| evaluator.as_ref())
    }

    /// Returns true if any dialect finds an expression in the text.
    pub fn has_expressions(&self, text: &str) -> bool {
        self.evaluators().any(|evaluator| evaluator.has_expressions(text))
    }

    /// Lists variable references found by every dialect.
    pub fn extract_vars(&self, text: &str) -> Vec<VariableRef> {
        self.evaluators()
            .flat_map(|evaluator| evaluator.extract_vars(text))
            .collect()
    }

    /// Validates the text with every dialect.
    ///
    /// A single string may only use one dialect; mixing them is reported
    /// as well.
    pub fn validate(&self, text: &str) -> Vec<Diagnostic> {
        let used: Vec<&str> = self
            .evaluators()
            .filter(|evaluator| evaluator.has_expressions(text))
            .map(|evaluator| evaluator.dialect())
            .collect();

        let mut diagnostics: Vec<Diagnostic> = self
            .evaluators()
            .flat_map(|evaluator| evaluator.validate(text))
            .collect();

        if used.len() > 1 {
            diagnostics.push(
                Diagnostic::new(
                    "expressions",
                    format!(
                        "Expression mixes dialects ({}); use only one per value.",
                        used.join(", ")
                    ),
                )
                .with_expression(text),
            );
        }

        diagnostics
    }

    /// Evaluates the text with the dialect it is written in.
    ///
    /// Text without expressions is returned unchanged as a string.
    pub fn evaluate(&self, text: &str, data: &Value) -> Result<Value, ExpressionError> {
        let mut matching = self
            .evaluators()
            .filter(|evaluator| evaluator.has_expressions(text));

        match (matching.next(), matching.next()) {
            (None, _) => Ok(Value::String(text.to_string())),
            (Some(evaluator), None) => evaluator.evaluate(text, data),
            (Some(_), Some(_)) => Err(ExpressionError::Syntax {
                expression: text.to_string(),
                reason: "expression mixes dialects".to_string(),
            }),
        }
    }
}

impl Default for EvaluatorRegistry {
    /// Registry with the `percent` and `brace` dialects.
    fn default() -> Self {
        Self::new()
            .register(Box::new(DelimitedEvaluator::percent()))
            .register(Box::new(JinjaEvaluator::new()))
    }
}
