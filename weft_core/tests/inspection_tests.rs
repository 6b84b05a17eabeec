//! Integration tests for workflow inspection and loading.

mod common;

use common::{fixture_path, load_fixture};
use std::io::Write;
use weft_core::{
    load_definition_from_file, Category, DefinitionError, EvaluatorRegistry, Inspector,
    TaskTransitionModel,
};

#[tokio::test]
async fn test_clean_fixtures_are_valid() {
    let registry = EvaluatorRegistry::default();
    for name in ["linear.yaml", "fan_out_fan_in.yaml", "reused_split.yaml", "cycle_with_entry.yaml"] {
        let definition = load_fixture(name).await.unwrap();
        let report = Inspector::new(&registry).inspect(&definition);
        assert!(report.is_valid(), "{}: {:?}", name, report);
    }
}

#[tokio::test]
async fn test_forward_reference() {
    let definition = load_fixture("forward_reference.yaml").await.unwrap();
    let registry = EvaluatorRegistry::default();
    let report = Inspector::new(&registry).inspect(&definition);

    assert_eq!(report.len(), 1);
    let (category, diagnostic) = report.flatten()[0];
    assert_eq!(category, Category::Context);
    assert_eq!(diagnostic.message, "Variable \"bar\" is referenced before assignment.");
    assert_eq!(diagnostic.expression.as_deref(), Some("<% bar %>"));
    assert_eq!(diagnostic.spec_path.as_deref(), Some("vars[0].foo"));
}

#[tokio::test]
async fn test_cycle_without_entry_is_a_semantic_problem() {
    let definition = load_fixture("cycle_no_entry.yaml").await.unwrap();
    let registry = EvaluatorRegistry::default();
    let report = Inspector::new(&registry).inspect(&definition);

    assert!(report.context.is_empty());
    assert_eq!(report.semantics.len(), 1);
    assert!(report.semantics[0]
        .message
        .starts_with("Unable to identify start tasks"));
}

#[tokio::test]
async fn test_split_and_join_are_exclusive() {
    for name in [
        "linear.yaml",
        "fan_out_fan_in.yaml",
        "reused_split.yaml",
        "cycle_with_entry.yaml",
        "cycle_no_entry.yaml",
    ] {
        let definition = load_fixture(name).await.unwrap();
        let model = TaskTransitionModel::from(&definition);
        for task in model.task_names() {
            assert!(!(model.is_split(task) && model.is_join(task)), "{}: {}", name, task);
        }
    }
}

#[test]
fn test_every_problem_category_is_reported() {
    let definition = weft_core::load_definition_from_string(
        r#"
vars:
  - x: <% ctx(y) %>
tasks:
  bad-name:
    action: core.noop
    next:
      - when: <% ctx( %>
        do: ghost
"#,
    )
    .unwrap();
    let registry = EvaluatorRegistry::default();
    let report = Inspector::new(&registry).inspect(&definition);

    for category in Category::ALL {
        assert!(!report.get(category).is_empty(), "no {} problems", category.as_str());
    }
    assert!(report
        .semantics
        .iter()
        .any(|d| d.message == "The task \"ghost\" is not defined."));
}

#[tokio::test]
async fn test_load_from_temp_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"tasks:\n  only:\n    action: core.noop\n").unwrap();

    let definition = load_definition_from_file(file.path()).await.unwrap();
    assert_eq!(definition.tasks.len(), 1);
    assert!(definition.tasks.contains_key("only"));
}

#[tokio::test]
async fn test_load_missing_file() {
    let err = load_definition_from_file(&fixture_path("missing.yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, DefinitionError::Io(_)));
}

#[test]
fn test_adding_declarations_never_adds_context_problems() {
    let base = r#"
tasks:
  task1:
    input: { a: "<% ctx(x) %>" }
    next:
      - do: task2
  task2:
    input: { b: "<% ctx(y) %>", c: "<% ctx(z) %>" }
"#;
    let registry = EvaluatorRegistry::default();
    let count = |prefix: &str| {
        let definition = weft_core::load_definition_from_string(&format!("{}{}", prefix, base)).unwrap();
        Inspector::new(&registry).inspect(&definition).context.len()
    };

    let without = count("");
    assert_eq!(without, 3);
    let mut previous = without;
    for prefix in ["vars:\n  - x: 1\n", "vars:\n  - x: 1\n  - y: 2\n", "vars:\n  - x: 1\n  - y: 2\n  - z: 3\n"] {
        let current = count(prefix);
        assert!(current <= previous, "{} > {}", current, previous);
        previous = current;
    }
    assert_eq!(previous, 0);
}
