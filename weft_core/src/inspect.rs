//! Combined inspection of a workflow definition.
//!
//! Runs every analysis pass and groups the findings by category, so
//! callers get one report per definition rather than the first error.

use crate::analysis::{check_expressions, check_structure, check_syntax, ContextAnalyzer};
use crate::definition::WorkflowDefinition;
use crate::model::TaskTransitionModel;
use serde::{Deserialize, Serialize};
use weft_expr::{Diagnostic, EvaluatorRegistry};

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Definition rules beyond the document shape
    Syntax,
    /// Malformed expressions
    Expressions,
    /// Variables referenced before assignment
    Context,
    /// Structural problems
    Semantics,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 4] = [
        Category::Syntax,
        Category::Expressions,
        Category::Context,
        Category::Semantics,
    ];

    /// Lowercase category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Expressions => "expressions",
            Category::Context => "context",
            Category::Semantics => "semantics",
        }
    }
}

/// Inspection report for a workflow definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    /// Definition rule violations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub syntax: Vec<Diagnostic>,
    /// Expressions that fail to parse
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<Diagnostic>,
    /// Variables referenced before assignment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<Diagnostic>,
    /// Graph structure problems
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantics: Vec<Diagnostic>,
}

impl InspectionReport {
    /// Returns true if no problem was found.
    pub fn is_valid(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of diagnostics.
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }

    /// Returns true if the report holds no diagnostics.
    pub fn is_empty(&self) -> bool {
        self.is_valid()
    }

    /// Returns the diagnostics of one category.
    pub fn get(&self, category: Category) -> &[Diagnostic] {
        match category {
            Category::Syntax => &self.syntax,
            Category::Expressions => &self.expressions,
            Category::Context => &self.context,
            Category::Semantics => &self.semantics,
        }
    }

    /// Returns every diagnostic tagged with its category, in report order.
    pub fn flatten(&self) -> Vec<(Category, &Diagnostic)> {
        Category::ALL
            .iter()
            .flat_map(|category| self.get(*category).iter().map(move |d| (*category, d)))
            .collect()
    }
}

/// Workflow inspector.
///
/// Runs the syntax pass on the raw definition, then the expression,
/// context and structural passes on the resolved model.
///
/// # Example
///
/// ```
/// use weft_core::{load_definition_from_string, Inspector};
/// use weft_expr::EvaluatorRegistry;
///
/// let definition = load_definition_from_string(
///     "vars:\n  - foo: <% ctx(bar) %>\ntasks:\n  task1:\n    action: core.noop\n",
/// )
/// .unwrap();
/// let registry = EvaluatorRegistry::default();
/// let report = Inspector::new(&registry).inspect(&definition);
/// assert_eq!(report.context.len(), 1);
/// ```
pub struct Inspector<'a> {
    registry: &'a EvaluatorRegistry,
}

impl<'a> Inspector<'a> {
    /// Creates an inspector using the registry's dialects.
    pub fn new(registry: &'a EvaluatorRegistry) -> Self {
        Self { registry }
    }

    /// Inspects a workflow definition.
    pub fn inspect(&self, definition: &WorkflowDefinition) -> InspectionReport {
        let model = TaskTransitionModel::from(definition);

        let report = InspectionReport {
            syntax: check_syntax(definition),
            expressions: check_expressions(&model, self.registry),
            context: ContextAnalyzer::new(self.registry).analyze(&model),
            semantics: check_structure(&model),
        };

        tracing::info!(
            "Inspected {} tasks: {} syntax, {} expression, {} context, {} semantic problems",
            model.task_count(),
            report.syntax.len(),
            report.expressions.len(),
            report.context.len(),
            report.semantics.len()
        );

        report
    }
}
