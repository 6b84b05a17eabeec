//! Workflow graph: a directed, labeled multigraph using petgraph.
//!
//! Nodes are tasks (or expanded task instances) carrying join and
//! split-lineage attributes; edges are transitions carrying guard criteria
//! and a back-reference to the clause that produced them. Parallel edges
//! between the same pair of nodes are told apart by a key.

mod document;
mod types;

pub use document::{SerializedEdge, SerializedGraph, SerializedNode};
pub use types::{
    lineage_names, Barrier, Split, TaskAttrs, TaskNode, TransitionAttrs, TransitionEdge,
    TransitionEntry, TransitionFilter,
};

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, EdgeIndex, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by misuse of the graph API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Referenced task is not in the graph
    #[error("Task \"{0}\" does not exist in the workflow graph")]
    InvalidTask(String),

    /// No transition matches the lookup
    #[error("Transition from \"{origin}\" to \"{destination}\" does not exist")]
    InvalidTransition {
        /// Source task id
        origin: String,
        /// Destination task id
        destination: String,
    },

    /// More than one transition matches a lookup that must be unique
    #[error("{count} transitions from \"{origin}\" to \"{destination}\" match the lookup")]
    AmbiguousTransition {
        /// Source task id
        origin: String,
        /// Destination task id
        destination: String,
        /// Number of matching transitions
        count: usize,
    },

    /// Serialized document is malformed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Directed multigraph of tasks and transitions.
///
/// # Example
///
/// ```
/// use weft_core::graph::{TransitionAttrs, WorkflowGraph};
///
/// let mut graph = WorkflowGraph::new();
/// graph.add_transition("task1", "task2", TransitionAttrs::default()).unwrap();
/// assert_eq!(graph.roots(), vec!["task1"]);
/// assert_eq!(graph.leaves(), vec!["task2"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    /// Directed graph of tasks with transition edges
    graph: DiGraph<TaskNode, TransitionEdge>,
    /// Map from task id to graph node index for O(1) lookup
    task_map: HashMap<String, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_map: HashMap::new(),
        }
    }

    /// Adds a task, or merges the attributes into an existing one.
    pub fn add_task(&mut self, id: &str, attrs: TaskAttrs) -> NodeIndex {
        let idx = self.ensure_task(id);
        self.graph[idx].merge(attrs);
        idx
    }

    /// Merges attributes into an existing task.
    pub fn update_task(&mut self, id: &str, attrs: TaskAttrs) -> Result<(), GraphError> {
        let idx = self.index(id)?;
        self.graph[idx].merge(attrs);
        Ok(())
    }

    /// Returns true if the task is in the graph.
    pub fn has_task(&self, id: &str) -> bool {
        self.task_map.contains_key(id)
    }

    /// Returns the task with the given id.
    pub fn get_task(&self, id: &str) -> Result<&TaskNode, GraphError> {
        Ok(&self.graph[self.index(id)?])
    }

    /// Returns tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.graph.node_weights()
    }

    /// Returns the number of tasks.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of transitions.
    pub fn transition_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Sets or clears the barrier of a task.
    pub fn set_barrier(&mut self, id: &str, barrier: Option<Barrier>) -> Result<(), GraphError> {
        let idx = self.index(id)?;
        self.graph[idx].barrier = barrier;
        Ok(())
    }

    /// Returns the barrier of a task.
    pub fn get_barrier(&self, id: &str) -> Result<Option<Barrier>, GraphError> {
        Ok(self.get_task(id)?.barrier)
    }

    /// Returns true if the task has a barrier.
    pub fn has_barrier(&self, id: &str) -> Result<bool, GraphError> {
        Ok(self.get_barrier(id)?.is_some())
    }

    /// Adds a transition, creating missing endpoints.
    ///
    /// A transition with the same criteria between the same two tasks is
    /// updated in place instead of duplicated.
    ///
    /// # Returns
    ///
    /// - `Ok(key)` - Key of the new or updated transition
    /// - `Err(GraphError::AmbiguousTransition)` - If several transitions
    ///   already share these criteria
    pub fn add_transition(
        &mut self,
        source: &str,
        destination: &str,
        attrs: TransitionAttrs,
    ) -> Result<u32, GraphError> {
        let src = self.ensure_task(source);
        let dst = self.ensure_task(destination);

        let filter = TransitionFilter::criteria(attrs.criteria.clone());
        let matching = self.matching_edges(src, dst, &filter);

        match matching.as_slice() {
            [] => {
                let key = self
                    .graph
                    .edges_connecting(src, dst)
                    .map(|edge| edge.weight().key + 1)
                    .max()
                    .unwrap_or(0);
                self.graph.add_edge(
                    src,
                    dst,
                    TransitionEdge {
                        key,
                        criteria: attrs.criteria,
                        reference: attrs.reference,
                    },
                );
                Ok(key)
            }
            [edge] => {
                let weight = &mut self.graph[*edge];
                if attrs.reference.is_some() {
                    weight.reference = attrs.reference;
                }
                Ok(weight.key)
            }
            _ => Err(GraphError::AmbiguousTransition {
                origin: source.to_string(),
                destination: destination.to_string(),
                count: matching.len(),
            }),
        }
    }

    /// Replaces the attributes of the transition with the given key.
    pub fn update_transition(
        &mut self,
        source: &str,
        destination: &str,
        key: u32,
        attrs: TransitionAttrs,
    ) -> Result<(), GraphError> {
        let src = self.index(source)?;
        let dst = self.index(destination)?;
        let edge = self
            .graph
            .edges_connecting(src, dst)
            .find(|edge| edge.weight().key == key)
            .map(|edge| edge.id())
            .ok_or_else(|| GraphError::InvalidTransition {
                origin: source.to_string(),
                destination: destination.to_string(),
            })?;

        let weight = &mut self.graph[edge];
        weight.criteria = attrs.criteria;
        if attrs.reference.is_some() {
            weight.reference = attrs.reference;
        }
        Ok(())
    }

    /// Returns the transitions between two tasks matching the filter.
    ///
    /// Missing endpoints simply yield no matches.
    pub fn has_transition(
        &self,
        source: &str,
        destination: &str,
        filter: &TransitionFilter,
    ) -> Vec<TransitionEntry> {
        let (Some(&src), Some(&dst)) = (self.task_map.get(source), self.task_map.get(destination))
        else {
            return Vec::new();
        };

        let mut entries: Vec<TransitionEntry> = self
            .graph
            .edges_connecting(src, dst)
            .filter(|edge| filter.matches(edge.weight()))
            .map(|edge| self.entry(edge))
            .collect();
        entries.sort_by_key(|entry| entry.key);
        entries
    }

    /// Returns the single transition matching the filter.
    pub fn get_transition(
        &self,
        source: &str,
        destination: &str,
        filter: &TransitionFilter,
    ) -> Result<TransitionEntry, GraphError> {
        let mut matching = self.has_transition(source, destination, filter);
        match matching.len() {
            0 => Err(GraphError::InvalidTransition {
                origin: source.to_string(),
                destination: destination.to_string(),
            }),
            1 => Ok(matching.remove(0)),
            count => Err(GraphError::AmbiguousTransition {
                origin: source.to_string(),
                destination: destination.to_string(),
                count,
            }),
        }
    }

    /// Returns outbound transitions sorted by destination, then key.
    pub fn get_next_transitions(&self, id: &str) -> Result<Vec<TransitionEntry>, GraphError> {
        let mut entries = self.directed_entries(id, Direction::Outgoing)?;
        entries.sort_by(|a, b| a.destination.cmp(&b.destination).then(a.key.cmp(&b.key)));
        Ok(entries)
    }

    /// Returns inbound transitions sorted by source, then key.
    pub fn get_prev_transitions(&self, id: &str) -> Result<Vec<TransitionEntry>, GraphError> {
        let mut entries = self.directed_entries(id, Direction::Incoming)?;
        entries.sort_by(|a, b| a.source.cmp(&b.source).then(a.key.cmp(&b.key)));
        Ok(entries)
    }

    /// Returns tasks without inbound transitions, sorted by id.
    pub fn roots(&self) -> Vec<String> {
        self.ids_without(Direction::Incoming)
    }

    /// Returns tasks without outbound transitions, sorted by id.
    pub fn leaves(&self) -> Vec<String> {
        self.ids_without(Direction::Outgoing)
    }

    /// Returns true if the task can reach itself.
    pub fn in_cycle(&self, id: &str) -> bool {
        let Some(&idx) = self.task_map.get(id) else {
            return false;
        };
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .any(|next| next == idx || has_path_connecting(&self.graph, next, idx, None))
    }

    fn ensure_task(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.task_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(TaskNode::new(id));
        self.task_map.insert(id.to_string(), idx);
        idx
    }

    fn index(&self, id: &str) -> Result<NodeIndex, GraphError> {
        self.task_map
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::InvalidTask(id.to_string()))
    }

    fn matching_edges(&self, src: NodeIndex, dst: NodeIndex, filter: &TransitionFilter) -> Vec<EdgeIndex> {
        self.graph
            .edges_connecting(src, dst)
            .filter(|edge| filter.matches(edge.weight()))
            .map(|edge| edge.id())
            .collect()
    }

    fn entry(&self, edge: EdgeReference<'_, TransitionEdge>) -> TransitionEntry {
        let weight = edge.weight();
        TransitionEntry {
            source: self.graph[edge.source()].id.clone(),
            destination: self.graph[edge.target()].id.clone(),
            key: weight.key,
            criteria: weight.criteria.clone(),
            reference: weight.reference,
        }
    }

    fn directed_entries(&self, id: &str, direction: Direction) -> Result<Vec<TransitionEntry>, GraphError> {
        let idx = self.index(id)?;
        Ok(self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| self.entry(edge))
            .collect())
    }

    fn ids_without(&self, direction: Direction) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors_directed(idx, direction).next().is_none())
            .map(|idx| self.graph[idx].id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(text: &str) -> Vec<String> {
        vec![text.to_string()]
    }

    #[test]
    fn test_add_transition_creates_endpoints() {
        let mut graph = WorkflowGraph::new();
        let key = graph
            .add_transition("a", "b", TransitionAttrs::new(vec![], Some(0)))
            .unwrap();
        assert_eq!(key, 0);
        assert!(graph.has_task("a"));
        assert!(graph.has_task("b"));
        assert_eq!(graph.task_count(), 2);
    }

    #[test]
    fn test_parallel_edges_get_distinct_keys() {
        let mut graph = WorkflowGraph::new();
        let k0 = graph
            .add_transition("a", "b", TransitionAttrs::new(criteria("<% x %>"), Some(0)))
            .unwrap();
        let k1 = graph
            .add_transition("a", "b", TransitionAttrs::new(criteria("<% y %>"), Some(1)))
            .unwrap();
        assert_eq!((k0, k1), (0, 1));
        assert_eq!(graph.transition_count(), 2);
    }

    #[test]
    fn test_identical_criteria_merge() {
        let mut graph = WorkflowGraph::new();
        graph
            .add_transition("a", "b", TransitionAttrs::new(criteria("<% x %>"), Some(0)))
            .unwrap();
        let key = graph
            .add_transition("a", "b", TransitionAttrs::new(criteria("<% x %>"), Some(2)))
            .unwrap();
        assert_eq!(key, 0);
        assert_eq!(graph.transition_count(), 1);
        let entry = graph.get_transition("a", "b", &TransitionFilter::default()).unwrap();
        assert_eq!(entry.reference, Some(2));
    }

    #[test]
    fn test_update_task_requires_existing_task() {
        let mut graph = WorkflowGraph::new();
        let err = graph.update_task("missing", TaskAttrs::default()).unwrap_err();
        assert_eq!(err, GraphError::InvalidTask("missing".to_string()));
    }

    #[test]
    fn test_barrier_accessors() {
        let mut graph = WorkflowGraph::new();
        graph.add_task("join", TaskAttrs::default());
        assert!(!graph.has_barrier("join").unwrap());
        graph.set_barrier("join", Some(Barrier::Count(2))).unwrap();
        assert_eq!(graph.get_barrier("join").unwrap(), Some(Barrier::Count(2)));
        assert!(graph.get_barrier("missing").is_err());
    }

    #[test]
    fn test_update_transition() {
        let mut graph = WorkflowGraph::new();
        graph.add_transition("a", "b", TransitionAttrs::default()).unwrap();
        graph
            .update_transition("a", "b", 0, TransitionAttrs::new(criteria("<% z %>"), Some(3)))
            .unwrap();
        let found = graph.has_transition("a", "b", &TransitionFilter::criteria(criteria("<% z %>")));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reference, Some(3));

        let err = graph
            .update_transition("a", "b", 7, TransitionAttrs::default())
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidTransition { .. }));
    }

    #[test]
    fn test_get_transition_ambiguous() {
        let mut graph = WorkflowGraph::new();
        graph.add_transition("a", "b", TransitionAttrs::new(criteria("<% x %>"), None)).unwrap();
        graph.add_transition("a", "b", TransitionAttrs::new(criteria("<% y %>"), None)).unwrap();
        let err = graph
            .get_transition("a", "b", &TransitionFilter::default())
            .unwrap_err();
        assert!(matches!(err, GraphError::AmbiguousTransition { count: 2, .. }));
        assert!(graph.get_transition("b", "a", &TransitionFilter::default()).is_err());
    }

    #[test]
    fn test_next_and_prev_sorted_by_peer() {
        let mut graph = WorkflowGraph::new();
        graph.add_transition("a", "c", TransitionAttrs::default()).unwrap();
        graph.add_transition("a", "b", TransitionAttrs::default()).unwrap();
        graph.add_transition("c", "d", TransitionAttrs::default()).unwrap();
        graph.add_transition("b", "d", TransitionAttrs::default()).unwrap();

        let next: Vec<String> = graph
            .get_next_transitions("a")
            .unwrap()
            .into_iter()
            .map(|e| e.destination)
            .collect();
        assert_eq!(next, vec!["b", "c"]);

        let prev: Vec<String> = graph
            .get_prev_transitions("d")
            .unwrap()
            .into_iter()
            .map(|e| e.source)
            .collect();
        assert_eq!(prev, vec!["b", "c"]);
        assert!(graph.get_next_transitions("missing").is_err());
    }

    #[test]
    fn test_roots_leaves_and_cycles() {
        let mut graph = WorkflowGraph::new();
        graph.add_transition("prep", "task1", TransitionAttrs::default()).unwrap();
        graph.add_transition("task1", "task2", TransitionAttrs::default()).unwrap();
        graph.add_transition("task2", "task1", TransitionAttrs::default()).unwrap();
        graph.add_transition("task2", "done", TransitionAttrs::default()).unwrap();

        assert_eq!(graph.roots(), vec!["prep"]);
        assert_eq!(graph.leaves(), vec!["done"]);
        assert!(graph.in_cycle("task1"));
        assert!(graph.in_cycle("task2"));
        assert!(!graph.in_cycle("prep"));
        assert!(!graph.in_cycle("missing"));
    }
}
