//! Adjacency-list document form of the workflow graph.
//!
//! `adjacency[i]` holds the outbound edges of `nodes[i]`. The lists are
//! index-correlated rather than keyed by id, so node order is part of
//! the format.

use super::{Barrier, GraphError, Split, TaskNode, TransitionEdge, WorkflowGraph};
use crate::definition::RetrySpec;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Serialized workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// Always true
    pub directed: bool,
    /// Always true; parallel edges are told apart by key
    pub multigraph: bool,
    /// Graph-level attributes
    #[serde(default)]
    pub graph: Map<String, Value>,
    /// Nodes in insertion order
    pub nodes: Vec<SerializedNode>,
    /// Outbound edges of the node at the same index
    pub adjacency: Vec<Vec<SerializedEdge>>,
}

/// Serialized node; `name` is omitted when equal to `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedNode {
    /// Node id
    pub id: String,
    /// Task name of a split instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Join barrier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier: Option<Barrier>,
    /// Split lineage, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<Split>,
    /// Retry policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySpec>,
}

/// Serialized outbound edge; `id` is the destination node id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedEdge {
    /// Destination node id
    pub id: String,
    /// Key among parallel edges to the same destination
    pub key: u32,
    /// Guard expressions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<String>,
    /// Ordinal of the originating clause, serialized as `ref`
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<usize>,
}

impl From<&TaskNode> for SerializedNode {
    fn from(node: &TaskNode) -> Self {
        Self {
            id: node.id.clone(),
            name: (node.name != node.id).then(|| node.name.clone()),
            barrier: node.barrier,
            splits: node.splits.clone(),
            retry: node.retry.clone(),
        }
    }
}

impl From<SerializedNode> for TaskNode {
    fn from(node: SerializedNode) -> Self {
        Self {
            name: node.name.unwrap_or_else(|| node.id.clone()),
            id: node.id,
            barrier: node.barrier,
            splits: node.splits,
            retry: node.retry,
        }
    }
}

impl WorkflowGraph {
    /// Converts the graph to its adjacency-list document.
    ///
    /// Nodes keep insertion order; each adjacency list is ordered by
    /// destination index, then key.
    pub fn serialize(&self) -> SerializedGraph {
        let nodes = self.graph.node_weights().map(SerializedNode::from).collect();

        let adjacency = self
            .graph
            .node_indices()
            .map(|idx| {
                let mut edges: Vec<_> = self.graph.edges(idx).collect();
                edges.sort_by_key(|edge| (edge.target().index(), edge.weight().key));
                edges
                    .into_iter()
                    .map(|edge| SerializedEdge {
                        id: self.graph[edge.target()].id.clone(),
                        key: edge.weight().key,
                        criteria: edge.weight().criteria.clone(),
                        reference: edge.weight().reference,
                    })
                    .collect()
            })
            .collect();

        SerializedGraph {
            directed: true,
            multigraph: true,
            graph: Map::new(),
            nodes,
            adjacency,
        }
    }

    /// Rebuilds a graph from its adjacency-list document.
    ///
    /// Edge keys are kept exactly as serialized.
    pub fn deserialize(document: &SerializedGraph) -> Result<Self, GraphError> {
        if !document.directed || !document.multigraph {
            return Err(GraphError::Serialization(
                "workflow graph must be a directed multigraph".to_string(),
            ));
        }
        if document.adjacency.len() != document.nodes.len() {
            return Err(GraphError::Serialization(format!(
                "adjacency has {} entries for {} nodes",
                document.adjacency.len(),
                document.nodes.len()
            )));
        }

        let mut graph = WorkflowGraph::new();
        for node in &document.nodes {
            if graph.has_task(&node.id) {
                return Err(GraphError::Serialization(format!(
                    "duplicate node id \"{}\"",
                    node.id
                )));
            }
            let idx = graph.graph.add_node(TaskNode::from(node.clone()));
            graph.task_map.insert(node.id.clone(), idx);
        }

        let mut seen: HashSet<(usize, usize, u32)> = HashSet::new();
        for (source, edges) in document.nodes.iter().zip(&document.adjacency) {
            let src = graph.index(&source.id)?;
            for edge in edges {
                let dst = graph.index(&edge.id).map_err(|_| {
                    GraphError::Serialization(format!(
                        "edge from \"{}\" targets unknown node \"{}\"",
                        source.id, edge.id
                    ))
                })?;
                if !seen.insert((src.index(), dst.index(), edge.key)) {
                    return Err(GraphError::Serialization(format!(
                        "duplicate edge key {} from \"{}\" to \"{}\"",
                        edge.key, source.id, edge.id
                    )));
                }
                graph.graph.add_edge(
                    src,
                    dst,
                    TransitionEdge {
                        key: edge.key,
                        criteria: edge.criteria.clone(),
                        reference: edge.reference,
                    },
                );
            }
        }

        Ok(graph)
    }

    /// Serializes the graph document to JSON.
    pub fn to_json(&self) -> Result<String, GraphError> {
        serde_json::to_string(&self.serialize())
            .map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Rebuilds a graph from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let document: SerializedGraph =
            serde_json::from_str(json).map_err(|e| GraphError::Serialization(e.to_string()))?;
        Self::deserialize(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{TaskAttrs, TransitionAttrs};
    use serde_json::json;

    fn sample() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        graph.add_task(
            "task4__1",
            TaskAttrs {
                name: Some("task4".to_string()),
                splits: Some(vec![Split("task4".to_string(), 1)]),
                ..Default::default()
            },
        );
        graph.add_task(
            "join",
            TaskAttrs {
                barrier: Some(Barrier::All),
                retry: Some(RetrySpec {
                    when: Some("<% failed() %>".to_string()),
                    count: 2,
                    delay: None,
                }),
                ..Default::default()
            },
        );
        graph
            .add_transition("task4__1", "join", TransitionAttrs::new(vec!["<% a %>".to_string()], Some(0)))
            .unwrap();
        graph
            .add_transition("task4__1", "join", TransitionAttrs::new(vec!["<% b %>".to_string()], Some(1)))
            .unwrap();
        graph
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(sample().serialize()).unwrap();
        assert_eq!(
            value,
            json!({
                "directed": true,
                "multigraph": true,
                "graph": {},
                "nodes": [
                    {"id": "task4__1", "name": "task4", "splits": [["task4", 1]]},
                    {"id": "join", "barrier": "*", "retry": {"when": "<% failed() %>", "count": 2}}
                ],
                "adjacency": [
                    [
                        {"id": "join", "key": 0, "criteria": ["<% a %>"], "ref": 0},
                        {"id": "join", "key": 1, "criteria": ["<% b %>"], "ref": 1}
                    ],
                    []
                ]
            })
        );
    }

    #[test]
    fn test_json_round_trip_keeps_every_attribute() {
        let graph = sample();
        let restored = WorkflowGraph::from_json(&graph.to_json().unwrap()).unwrap();
        assert_eq!(restored.serialize(), graph.serialize());
        assert_eq!(restored.get_task("task4__1").unwrap().name, "task4");
    }

    #[test]
    fn test_deserialize_rejects_mismatched_adjacency() {
        let mut document = sample().serialize();
        document.adjacency.pop();
        assert!(matches!(
            WorkflowGraph::deserialize(&document),
            Err(GraphError::Serialization(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_unknown_target() {
        let mut document = sample().serialize();
        document.adjacency[1].push(SerializedEdge {
            id: "ghost".to_string(),
            key: 0,
            criteria: vec![],
            reference: None,
        });
        assert!(WorkflowGraph::deserialize(&document).is_err());
    }

    #[test]
    fn test_deserialize_rejects_undirected() {
        let mut document = sample().serialize();
        document.directed = false;
        assert!(WorkflowGraph::deserialize(&document).is_err());
    }
}
