//! Definition rules serde cannot express.

use crate::definition::{JoinSpec, WorkflowDefinition};
use regex::Regex;
use std::sync::LazyLock;
use weft_expr::Diagnostic;

const KIND: &str = "syntax";
const TASKS_SCHEMA: &str = r"properties.tasks.patternProperties.^\w+$";

static TASK_NAME: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"^\w+$"));

/// Checks task naming, join counts, retry counts and transition
/// destinations.
pub fn check_syntax(definition: &WorkflowDefinition) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let task_name = match &*TASK_NAME {
        Ok(pattern) => Some(pattern),
        Err(err) => {
            tracing::warn!("Task name pattern failed to build: {}", err);
            diagnostics.push(
                Diagnostic::new(KIND, format!("Unable to check task names: {}", err))
                    .at("tasks", "properties.tasks.patternProperties"),
            );
            None
        }
    };

    for (name, task) in &definition.tasks {
        let base = format!("tasks.{}", name);

        if task_name.is_some_and(|pattern| !pattern.is_match(name)) {
            diagnostics.push(
                Diagnostic::new(
                    KIND,
                    format!("Task name \"{}\" must only contain letters, digits and underscores.", name),
                )
                .at(base.clone(), "properties.tasks.patternProperties"),
            );
        }

        if task.join == Some(JoinSpec::Count(0)) {
            diagnostics.push(
                Diagnostic::new(KIND, "Join count must be \"all\" or a positive integer.")
                    .at(format!("{}.join", base), format!("{}.properties.join", TASKS_SCHEMA)),
            );
        }

        if task.retry.as_ref().is_some_and(|retry| retry.count == 0) {
            diagnostics.push(
                Diagnostic::new(KIND, "Retry count must be a positive integer.").at(
                    format!("{}.retry.count", base),
                    format!("{}.properties.retry.properties.count", TASKS_SCHEMA),
                ),
            );
        }

        for (i, transition) in task.next.iter().enumerate() {
            if transition.destinations.is_empty() {
                diagnostics.push(
                    Diagnostic::new(KIND, "Transition must name at least one task to run.").at(
                        format!("{}.next[{}].do", base, i),
                        format!("{}.properties.next.items.properties.do", TASKS_SCHEMA),
                    ),
                );
            }
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::load_definition_from_string;

    #[test]
    fn test_clean_definition() {
        let definition = load_definition_from_string(
            "tasks:\n  task_1:\n    join: 2\n    retry: {count: 1}\n    next: [{do: noop}]\n",
        )
        .unwrap();
        assert!(check_syntax(&definition).is_empty());
    }

    #[test]
    fn test_task_name_pattern() {
        assert!(TASK_NAME.is_ok());
        let definition = load_definition_from_string(
            "tasks:\n  tâche_1: {}\n  \"with space\": {}\n  \"dot.ted\": {}\n",
        )
        .unwrap();
        let paths: Vec<String> = check_syntax(&definition)
            .into_iter()
            .map(|d| d.spec_path.unwrap_or_default())
            .collect();
        assert_eq!(paths, vec!["tasks.with space", "tasks.dot.ted"]);
    }

    #[test]
    fn test_rule_violations() {
        let definition = load_definition_from_string(
            r#"
tasks:
  "bad-name":
    join: 0
    retry: {count: 0}
    next:
      - when: <% succeeded() %>
"#,
        )
        .unwrap();
        let paths: Vec<String> = check_syntax(&definition)
            .into_iter()
            .map(|d| d.spec_path.unwrap_or_default())
            .collect();
        assert_eq!(
            paths,
            vec![
                "tasks.bad-name",
                "tasks.bad-name.join",
                "tasks.bad-name.retry.count",
                "tasks.bad-name.next[0].do",
            ]
        );
    }
}
