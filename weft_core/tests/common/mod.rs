//! Common test utilities for WeftKit integration tests.

use std::path::PathBuf;
use weft_core::{load_definition_from_file, TaskTransitionModel, WorkflowDefinition};

/// Returns the path of a fixture under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Loads a fixture definition.
pub async fn load_fixture(name: &str) -> anyhow::Result<WorkflowDefinition> {
    Ok(load_definition_from_file(&fixture_path(name)).await?)
}

/// Loads a fixture and resolves its task transition model.
pub async fn load_model(name: &str) -> anyhow::Result<TaskTransitionModel> {
    let definition = load_fixture(name).await?;
    Ok(TaskTransitionModel::from(&definition))
}
