//! YAML loading of workflow definitions.

use super::WorkflowDefinition;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a workflow definition.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Document parsed but is not a usable workflow
    #[error("Invalid workflow schema: {0}")]
    InvalidSchema(String),
}

/// Loads a workflow definition from a YAML file.
///
/// # Example
///
/// ```ignore
/// let definition = load_definition_from_file(Path::new("workflow.yaml")).await?;
/// ```
pub async fn load_definition_from_file(path: &Path) -> Result<WorkflowDefinition, DefinitionError> {
    let content = tokio::fs::read_to_string(path).await?;
    tracing::debug!("Loaded workflow definition from {}", path.display());
    load_definition_from_string(&content)
}

/// Loads a workflow definition from a YAML string.
///
/// Only shape problems serde can see are reported here. Naming rules and
/// dangling references are left to [`Inspector`](crate::Inspector), which
/// reports them as diagnostics instead of failing.
pub fn load_definition_from_string(yaml: &str) -> Result<WorkflowDefinition, DefinitionError> {
    let definition: WorkflowDefinition = serde_yaml::from_str(yaml)?;

    if definition.tasks.is_empty() {
        return Err(DefinitionError::InvalidSchema(
            "workflow defines no tasks".to_string(),
        ));
    }

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_string() {
        let yaml = r#"
version: 1.0
description: two steps
tasks:
  task1:
    action: core.noop
    next:
      - do: task2
  task2:
    action: core.noop
"#;
        let definition = load_definition_from_string(yaml).unwrap();
        assert_eq!(definition.description.as_deref(), Some("two steps"));
        let names: Vec<&str> = definition.tasks.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["task1", "task2"]);
    }

    #[test]
    fn test_load_rejects_empty_workflow() {
        let result = load_definition_from_string("description: nothing\n");
        assert!(matches!(result, Err(DefinitionError::InvalidSchema(_))));
    }

    #[test]
    fn test_load_rejects_malformed_yaml() {
        let result = load_definition_from_string("tasks: [unclosed");
        assert!(matches!(result, Err(DefinitionError::YamlParse(_))));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tasks:\n  only:\n    action: core.noop").unwrap();

        let definition = load_definition_from_file(file.path()).await.unwrap();
        assert!(definition.tasks.contains_key("only"));
    }

    #[tokio::test]
    async fn test_load_from_missing_file() {
        let result = load_definition_from_file(Path::new("/nonexistent/workflow.yaml")).await;
        assert!(matches!(result, Err(DefinitionError::Io(_))));
    }
}
