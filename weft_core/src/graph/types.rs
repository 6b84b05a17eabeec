//! Node and edge types of the workflow graph.

use crate::definition::{JoinSpec, RetrySpec};
use serde::{Deserialize, Serialize};

/// Synchronization requirement of a join node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBarrier", into = "RawBarrier")]
pub enum Barrier {
    /// Every inbound branch, serialized as `"*"`
    All,
    /// This many inbound branches
    Count(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawBarrier {
    Count(u32),
    Text(String),
}

impl TryFrom<RawBarrier> for Barrier {
    type Error = String;

    fn try_from(raw: RawBarrier) -> Result<Self, Self::Error> {
        match raw {
            RawBarrier::Count(n) => Ok(Barrier::Count(n)),
            RawBarrier::Text(text) if text == "*" => Ok(Barrier::All),
            RawBarrier::Text(text) => Err(format!("invalid barrier \"{}\"", text)),
        }
    }
}

impl From<Barrier> for RawBarrier {
    fn from(barrier: Barrier) -> Self {
        match barrier {
            Barrier::All => RawBarrier::Text("*".to_string()),
            Barrier::Count(n) => RawBarrier::Count(n),
        }
    }
}

impl From<JoinSpec> for Barrier {
    fn from(join: JoinSpec) -> Self {
        match join {
            JoinSpec::All => Barrier::All,
            JoinSpec::Count(n) => Barrier::Count(n),
        }
    }
}

/// One step of a split lineage: the split-origin task and the instance
/// number. Serialized as `[task, instance]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Split(pub String, pub u32);

impl Split {
    /// Split-origin task name.
    pub fn task(&self) -> &str {
        &self.0
    }

    /// Instance number; zero on a logical graph.
    pub fn instance(&self) -> u32 {
        self.1
    }
}

/// Returns the split-origin task names of a lineage.
pub fn lineage_names(splits: &[Split]) -> Vec<&str> {
    splits.iter().map(Split::task).collect()
}

/// Node weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    /// Unique node id
    pub id: String,
    /// Task name; differs from the id on expanded split instances
    pub name: String,
    /// Join requirement
    pub barrier: Option<Barrier>,
    /// Split lineage, outermost first
    pub splits: Vec<Split>,
    /// Retry policy carried from the task
    pub retry: Option<RetrySpec>,
}

impl TaskNode {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            barrier: None,
            splits: Vec::new(),
            retry: None,
        }
    }

    pub(crate) fn merge(&mut self, attrs: TaskAttrs) {
        if let Some(name) = attrs.name {
            self.name = name;
        }
        if let Some(barrier) = attrs.barrier {
            self.barrier = Some(barrier);
        }
        if let Some(splits) = attrs.splits {
            self.splits = splits;
        }
        if let Some(retry) = attrs.retry {
            self.retry = Some(retry);
        }
    }
}

/// Attribute patch for a node; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskAttrs {
    /// Task name, when the node id is an instance id
    pub name: Option<String>,
    /// Join barrier
    pub barrier: Option<Barrier>,
    /// Split lineage, outermost first
    pub splits: Option<Vec<Split>>,
    /// Retry policy carried over from the definition
    pub retry: Option<RetrySpec>,
}

/// Edge weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEdge {
    /// Key disambiguating parallel edges between the same two nodes
    pub key: u32,
    /// Guard expressions, all of which must hold
    pub criteria: Vec<String>,
    /// Ordinal of the originating clause in the source task
    pub reference: Option<usize>,
}

/// Attributes of a new or updated transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionAttrs {
    /// Guard expressions, all of which must hold
    pub criteria: Vec<String>,
    /// Ordinal of the originating clause in the source task
    pub reference: Option<usize>,
}

impl TransitionAttrs {
    /// Creates transition attributes.
    pub fn new(criteria: Vec<String>, reference: Option<usize>) -> Self {
        Self { criteria, reference }
    }
}

/// Filter for [`WorkflowGraph::has_transition`](super::WorkflowGraph::has_transition).
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionFilter {
    /// Exact guard list to match
    pub criteria: Option<Vec<String>>,
    /// Originating clause to match
    pub reference: Option<usize>,
}

impl TransitionFilter {
    /// Matches edges with exactly these criteria.
    pub fn criteria(criteria: Vec<String>) -> Self {
        Self {
            criteria: Some(criteria),
            reference: None,
        }
    }

    /// Narrows the filter to one originating clause.
    pub fn with_reference(mut self, reference: usize) -> Self {
        self.reference = Some(reference);
        self
    }

    pub(crate) fn matches(&self, edge: &TransitionEdge) -> bool {
        self.criteria.as_ref().map_or(true, |c| *c == edge.criteria)
            && self.reference.map_or(true, |r| edge.reference == Some(r))
    }
}

/// A transition as returned by graph lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEntry {
    /// Source node id
    pub source: String,
    /// Destination node id
    pub destination: String,
    /// Key among parallel edges between the same two nodes
    pub key: u32,
    /// Guard expressions, all of which must hold
    pub criteria: Vec<String>,
    /// Ordinal of the originating clause in the source task
    pub reference: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_barrier_serde() {
        assert_eq!(serde_json::to_value(Barrier::All).unwrap(), json!("*"));
        assert_eq!(serde_json::to_value(Barrier::Count(2)).unwrap(), json!(2));
        assert_eq!(serde_json::from_value::<Barrier>(json!("*")).unwrap(), Barrier::All);
        assert!(serde_json::from_value::<Barrier>(json!("all")).is_err());
    }

    #[test]
    fn test_split_serializes_as_pair() {
        let split = Split("task4".to_string(), 2);
        assert_eq!(serde_json::to_value(&split).unwrap(), json!(["task4", 2]));
    }

    #[test]
    fn test_attrs_merge_leaves_unset_fields() {
        let mut node = TaskNode::new("a");
        node.merge(TaskAttrs {
            barrier: Some(Barrier::All),
            ..Default::default()
        });
        node.merge(TaskAttrs {
            splits: Some(vec![Split("a".to_string(), 0)]),
            ..Default::default()
        });
        assert_eq!(node.barrier, Some(Barrier::All));
        assert_eq!(node.splits.len(), 1);
        assert_eq!(node.name, "a");
    }

    #[test]
    fn test_filter_matching() {
        let edge = TransitionEdge {
            key: 0,
            criteria: vec!["<% ok %>".to_string()],
            reference: Some(1),
        };
        assert!(TransitionFilter::default().matches(&edge));
        assert!(TransitionFilter::criteria(vec!["<% ok %>".to_string()]).matches(&edge));
        assert!(!TransitionFilter::criteria(vec![]).matches(&edge));
        assert!(!TransitionFilter::default().with_reference(0).matches(&edge));
    }
}
