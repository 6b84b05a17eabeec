//! Expression syntax checks.

use crate::model::TaskTransitionModel;
use weft_expr::{Diagnostic, EvaluatorRegistry};

/// Validates every expression-bearing field against the registered
/// dialects, attaching the field location to each diagnostic.
pub fn check_expressions(model: &TaskTransitionModel, registry: &EvaluatorRegistry) -> Vec<Diagnostic> {
    model
        .expression_sites()
        .into_iter()
        .flat_map(|site| {
            registry
                .validate(&site.text)
                .into_iter()
                .map(move |diagnostic| diagnostic.at(site.spec_path.as_str(), site.schema_path.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::load_definition_from_string;

    #[test]
    fn test_reports_bad_expressions_with_location() {
        let definition = load_definition_from_string(
            r#"
vars:
  - ok: <% 1 + 2 %>
  - broken: <% 1 + %>
tasks:
  task1:
    input:
      msg: "{{ ok "
    next:
      - when: <% ctx(ok) %> {{ ok }}
        do: noop
"#,
        )
        .unwrap();
        let registry = EvaluatorRegistry::default();
        let diagnostics = check_expressions(&TaskTransitionModel::from(&definition), &registry);

        let located: Vec<(&str, Option<&str>)> = diagnostics
            .iter()
            .map(|d| (d.kind.as_str(), d.spec_path.as_deref()))
            .collect();
        assert_eq!(
            located,
            vec![
                ("percent", Some("vars[1].broken")),
                ("brace", Some("tasks.task1.input.msg")),
                ("expressions", Some("tasks.task1.next[0].when")),
            ]
        );
    }
}
