//! Composition limits.

use serde::{Deserialize, Serialize};

/// Bounds applied by the graph composers.
///
/// Composition is refused with
/// [`ComposeError::LimitExceeded`](crate::compose::ComposeError::LimitExceeded)
/// once an input goes beyond any of them.
///
/// # Example
///
/// ```
/// use weft_core::ComposerConfig;
///
/// let config = ComposerConfig::from_yaml_str("max_split_depth: 4").unwrap();
/// assert_eq!(config.max_split_depth, 4);
/// assert_eq!(config.max_tasks, 1_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Maximum number of tasks in a definition
    pub max_tasks: usize,
    /// Maximum split lineage length on any path
    pub max_split_depth: usize,
    /// Maximum number of nodes in an expanded graph
    pub max_instances: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_tasks: 1_000,
            max_split_depth: 32,
            max_instances: 10_000,
        }
    }
}

impl ComposerConfig {
    /// Reads a configuration from YAML; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
