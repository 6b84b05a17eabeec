//! Expression evaluator capability and the `percent` dialect.

use crate::error::ExpressionError;
use crate::eval::{evaluate, render};
use crate::parser::{parse, referenced_variables};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A problem found while inspecting a workflow definition.
///
/// The same shape is used for expression syntax errors, context
/// (used-before-assignment) errors and structural errors so that all of
/// them can be collected into one report.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Dialect name for expression problems, or the problem family
    #[serde(rename = "type")]
    pub kind: String,
    /// Offending expression, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Dotted path into the workflow definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_path: Option<String>,
    /// Path into the definition schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

impl Diagnostic {
    /// Creates a diagnostic with no expression or location.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            expression: None,
            message: message.into(),
            spec_path: None,
            schema_path: None,
        }
    }

    /// Attaches the offending expression.
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Attaches the location inside the definition and its schema.
    pub fn at(mut self, spec_path: impl Into<String>, schema_path: impl Into<String>) -> Self {
        self.spec_path = Some(spec_path.into());
        self.schema_path = Some(schema_path.into());
        self
    }
}

/// A variable referenced from inside an expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableRef {
    /// Dialect that recognized the expression
    pub dialect: String,
    /// Full expression text, delimiters included
    pub source: String,
    /// Referenced variable name
    pub name: String,
}

/// Pluggable expression language.
///
/// Workflow analysis only relies on these four operations, so any
/// templating language can be plugged in by implementing this trait and
/// registering it in an [`EvaluatorRegistry`](crate::EvaluatorRegistry).
pub trait ExpressionEvaluator: Send + Sync {
    /// Short dialect name used in diagnostics.
    fn dialect(&self) -> &str;

    /// Returns true if the text contains at least one expression.
    fn has_expressions(&self, text: &str) -> bool;

    /// Checks every expression in the text against the grammar.
    fn validate(&self, text: &str) -> Vec<Diagnostic>;

    /// Evaluates the text against context data.
    fn evaluate(&self, text: &str, data: &Value) -> Result<Value, ExpressionError>;

    /// Lists the context variables the text references.
    fn extract_vars(&self, text: &str) -> Vec<VariableRef>;
}

/// One expression found in a larger text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Segment<'a> {
    /// Expression including its delimiters
    pub source: &'a str,
    /// Text between the delimiters
    pub body: &'a str,
}

/// Evaluator for expressions wrapped in a pair of delimiters, parsed
/// with the built-in expression grammar.
///
/// [`percent`](Self::percent) is the `<% ... %>` dialect. Other
/// delimiters can share the grammar through [`new`](Self::new).
#[derive(Clone, Debug)]
pub struct DelimitedEvaluator {
    dialect: &'static str,
    open: &'static str,
    close: &'static str,
}

impl DelimitedEvaluator {
    /// Creates the `<% ... %>` dialect.
    pub fn percent() -> Self {
        Self {
            dialect: "percent",
            open: "<%",
            close: "%>",
        }
    }

    /// Creates a dialect with its own delimiters.
    pub fn new(dialect: &'static str, open: &'static str, close: &'static str) -> Self {
        Self { dialect, open, close }
    }

    /// Finds every delimited expression in the text.
    ///
    /// Fails with the unclosed remainder when an opening delimiter has
    /// no matching close.
    pub(crate) fn segments<'a>(&self, text: &'a str) -> Result<Vec<Segment<'a>>, &'a str> {
        let mut segments = Vec::new();
        let mut offset = 0;

        while let Some(start) = text[offset..].find(self.open) {
            let start = offset + start;
            let body_start = start + self.open.len();
            let Some(len) = text[body_start..].find(self.close) else {
                return Err(&text[start..]);
            };
            let end = body_start + len + self.close.len();
            segments.push(Segment {
                source: &text[start..end],
                body: &text[body_start..body_start + len],
            });
            offset = end;
        }

        Ok(segments)
    }

    fn diagnostic(&self, expression: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(self.dialect, message).with_expression(expression)
    }
}

impl ExpressionEvaluator for DelimitedEvaluator {
    fn dialect(&self) -> &str {
        self.dialect
    }

    fn has_expressions(&self, text: &str) -> bool {
        self.segments(text).map(|s| !s.is_empty()).unwrap_or(false)
    }

    fn validate(&self, text: &str) -> Vec<Diagnostic> {
        let segments = match self.segments(text) {
            Ok(segments) => segments,
            Err(rest) => {
                return vec![self.diagnostic(
                    rest,
                    format!("Expression is missing the closing delimiter \"{}\".", self.close),
                )]
            }
        };

        segments
            .into_iter()
            .filter_map(|segment| match parse(segment.body) {
                Ok(_) => None,
                Err(fault) => Some(self.diagnostic(
                    segment.source,
                    fault.into_error(segment.source).to_string(),
                )),
            })
            .collect()
    }

    fn evaluate(&self, text: &str, data: &Value) -> Result<Value, ExpressionError> {
        let segments = self.segments(text).map_err(|rest| ExpressionError::Syntax {
            expression: rest.to_string(),
            reason: format!("missing closing delimiter \"{}\"", self.close),
        })?;

        if segments.is_empty() {
            return Ok(Value::String(text.to_string()));
        }

        let eval_segment = |segment: &Segment<'_>| {
            parse(segment.body)
                .and_then(|expr| evaluate(&expr, data))
                .map_err(|fault| fault.into_error(segment.source))
        };

        if segments.len() == 1 && segments[0].source == text.trim() {
            return eval_segment(&segments[0]);
        }

        let mut rendered = String::with_capacity(text.len());
        let mut rest = text;
        for segment in &segments {
            if let Some(pos) = rest.find(segment.source) {
                rendered.push_str(&rest[..pos]);
                rendered.push_str(&render(&eval_segment(segment)?));
                rest = &rest[pos + segment.source.len()..];
            }
        }
        rendered.push_str(rest);

        Ok(Value::String(rendered))
    }

    fn extract_vars(&self, text: &str) -> Vec<VariableRef> {
        let Ok(segments) = self.segments(text) else {
            return Vec::new();
        };

        let mut refs = Vec::new();
        for segment in segments {
            let Ok(expr) = parse(segment.body) else {
                continue;
            };
            for name in referenced_variables(&expr) {
                refs.push(VariableRef {
                    dialect: self.dialect.to_string(),
                    source: segment.source.to_string(),
                    name,
                });
            }
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_expressions() {
        let percent = DelimitedEvaluator::percent();
        assert!(percent.has_expressions("<% ctx(foo) %>"));
        assert!(percent.has_expressions("value is <% 1 %> here"));
        assert!(!percent.has_expressions("plain text"));
        assert!(!percent.has_expressions("{{ foo }}"));
        assert!(DelimitedEvaluator::new("hash", "#{", "}").has_expressions("#{ foo }"));
    }

    #[test]
    fn test_validate_reports_each_bad_expression() {
        let percent = DelimitedEvaluator::percent();
        assert!(percent.validate("<% ctx(foo) %> and <% 1 + 2 %>").is_empty());

        let diagnostics = percent.validate("<% ctx( %> and <% 1 + %>");
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].kind, "percent");
        assert_eq!(diagnostics[0].expression.as_deref(), Some("<% ctx( %>"));
    }

    #[test]
    fn test_validate_unclosed_delimiter() {
        let diagnostics = DelimitedEvaluator::percent().validate("hello <% name");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("closing delimiter"));
    }

    #[test]
    fn test_evaluate_whole_expression_keeps_type() {
        let percent = DelimitedEvaluator::percent();
        let data = json!({"count": 3});
        assert_eq!(percent.evaluate("<% ctx(count) + 1 %>", &data).unwrap(), json!(4));
        assert_eq!(percent.evaluate("  <% ctx(count) %>  ", &data).unwrap(), json!(3));
    }

    #[test]
    fn test_evaluate_interpolates_mixed_text() {
        let hash = DelimitedEvaluator::new("hash", "#{", "}");
        let data = json!({"name": "weft", "n": 2});
        assert_eq!(
            hash.evaluate("#{ name } has #{ n } dialects", &data).unwrap(),
            json!("weft has 2 dialects")
        );
        assert_eq!(hash.evaluate("no expressions", &data).unwrap(), json!("no expressions"));
    }

    #[test]
    fn test_evaluate_undefined_variable_names_expression() {
        let err = DelimitedEvaluator::percent()
            .evaluate("<% ctx().missing %>", &json!({}))
            .unwrap_err();
        assert_eq!(
            err,
            ExpressionError::UndefinedVariable {
                expression: "<% ctx().missing %>".to_string(),
                name: "missing".to_string(),
            }
        );
    }

    #[test]
    fn test_extract_vars() {
        let refs = DelimitedEvaluator::percent().extract_vars("<% ctx(a) %>-<% b + ctx().c %>");
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(refs[1].source, "<% b + ctx().c %>");
        assert_eq!(refs[1].dialect, "percent");
    }

    #[test]
    fn test_extract_vars_skips_unparsable_segments() {
        let refs = DelimitedEvaluator::percent().extract_vars("<% ( %> <% ok %>");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "ok");
    }
}
