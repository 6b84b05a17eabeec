//! The `brace` dialect: Jinja templates rendered with minijinja.
//!
//! A value that is exactly one `{{ ... }}` block evaluates to the typed
//! result of its expression. Any other template renders to a string.
//!
//! ```json
//! { "recipient": "{{ email }}", "greeting": "Hello {{ name | title }}!" }
//! ```

use crate::error::ExpressionError;
use crate::evaluator::{Diagnostic, ExpressionEvaluator, VariableRef};
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use serde_json::Value;

const DIALECT: &str = "brace";

/// Evaluator for Jinja-delimited text (`{{ ... }}` and `{% ... %}`).
///
/// Undefined variables are errors rather than empty strings, so a
/// missing context entry surfaces as
/// [`ExpressionError::UndefinedVariable`].
#[derive(Debug)]
pub struct JinjaEvaluator {
    env: Environment<'static>,
}

impl JinjaEvaluator {
    /// Creates the `{{ ... }}` dialect.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Returns the body of a text that is a single `{{ ... }}` block.
    fn single_expression(text: &str) -> Option<&str> {
        let body = text.trim().strip_prefix("{{")?.strip_suffix("}}")?;
        if body.contains("{{") || body.contains("}}") || body.contains("{%") {
            return None;
        }
        Some(body.trim())
    }

    /// Sorted top-level names the template reads from the context.
    fn undeclared(&self, text: &str) -> Vec<String> {
        let Ok(template) = self.env.template_from_str(text) else {
            return Vec::new();
        };
        let mut names: Vec<String> = template.undeclared_variables(false).into_iter().collect();
        names.sort();
        names
    }

    fn undefined(&self, text: &str, data: &Value, fallback: &str) -> ExpressionError {
        let name = self
            .undeclared(text)
            .into_iter()
            .find(|name| data.get(name).is_none())
            .unwrap_or_else(|| fallback.to_string());
        ExpressionError::UndefinedVariable {
            expression: text.to_string(),
            name,
        }
    }

    fn error_for(&self, err: Error, text: &str, data: &Value) -> ExpressionError {
        let expression = text.to_string();
        let detail = err.detail().unwrap_or_default().to_string();
        match err.kind() {
            ErrorKind::SyntaxError => ExpressionError::Syntax {
                expression,
                reason: err.to_string(),
            },
            ErrorKind::UndefinedError => self.undefined(text, data, &detail),
            ErrorKind::UnknownFunction | ErrorKind::UnknownFilter | ErrorKind::UnknownTest => {
                let name = detail.trim_end_matches(" is unknown").to_string();
                ExpressionError::UnknownFunction { expression, name }
            }
            _ => ExpressionError::TypeMismatch {
                expression,
                reason: err.to_string(),
            },
        }
    }
}

impl Default for JinjaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator for JinjaEvaluator {
    fn dialect(&self) -> &str {
        DIALECT
    }

    fn has_expressions(&self, text: &str) -> bool {
        text.contains("{{") || text.contains("{%")
    }

    fn validate(&self, text: &str) -> Vec<Diagnostic> {
        if !self.has_expressions(text) {
            return Vec::new();
        }
        match self.env.template_from_str(text) {
            Ok(_) => Vec::new(),
            Err(err) => {
                tracing::debug!("Template {:?} failed to parse: {}", text, err);
                vec![Diagnostic::new(DIALECT, err.to_string()).with_expression(text)]
            }
        }
    }

    fn evaluate(&self, text: &str, data: &Value) -> Result<Value, ExpressionError> {
        if !self.has_expressions(text) {
            return Ok(Value::String(text.to_string()));
        }

        let context = minijinja::Value::from_serialize(data);
        if let Some(body) = Self::single_expression(text) {
            let value = self
                .env
                .compile_expression(body)
                .and_then(|expression| expression.eval(context))
                .map_err(|err| self.error_for(err, text, data))?;
            if value.is_undefined() {
                return Err(self.undefined(text, data, body));
            }
            return serde_json::to_value(&value).map_err(|err| ExpressionError::TypeMismatch {
                expression: text.to_string(),
                reason: err.to_string(),
            });
        }

        self.env
            .render_str(text, context)
            .map(Value::String)
            .map_err(|err| self.error_for(err, text, data))
    }

    fn extract_vars(&self, text: &str) -> Vec<VariableRef> {
        if !self.has_expressions(text) {
            return Vec::new();
        }
        self.undeclared(text)
            .into_iter()
            .map(|name| VariableRef {
                dialect: DIALECT.to_string(),
                source: text.to_string(),
                name,
            })
            .collect()
    }
}
