//! Split-expanding composition.
//!
//! The logical graph from [`DirectComposer`] is walked a second time,
//! breadth-first from its roots. Each arrival at a split point creates a
//! fresh instance `name__N`, where `N` comes from a counter per split
//! task shared by the whole walk. Everything downstream of that arrival
//! inherits the lineage and is named after its innermost instance, so
//! no execution node is shared between branches.

use super::{ComposeError, DirectComposer, GraphComposer};
use crate::config::ComposerConfig;
use crate::graph::{
    lineage_names, Split, TaskAttrs, TransitionAttrs, TransitionEntry, TransitionFilter,
    WorkflowGraph,
};
use crate::model::TaskTransitionModel;
use regex::{NoExpand, Regex};
use std::collections::{HashMap, HashSet, VecDeque};

/// Composes the execution graph of a workflow.
#[derive(Clone, Debug, Default)]
pub struct ExpandingComposer {
    config: ComposerConfig,
}

/// One arrival at a logical task.
struct Visit {
    task: String,
    splits: Vec<Split>,
    /// Execution node the walk came from, and the logical edge it took
    prev: Option<(String, TransitionEntry)>,
}

impl ExpandingComposer {
    /// Creates a composer with the given limits.
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Expands an already composed logical graph.
    pub fn expand(&self, logical: &WorkflowGraph) -> Result<WorkflowGraph, ComposeError> {
        let mut graph = WorkflowGraph::new();
        let mut counters: HashMap<String, u32> = HashMap::new();
        let mut instances: HashMap<String, Vec<String>> = HashMap::new();
        let mut queue: VecDeque<Visit> = logical
            .roots()
            .into_iter()
            .map(|task| Visit {
                task,
                splits: Vec::new(),
                prev: None,
            })
            .collect();

        while let Some(Visit { task, mut splits, prev }) = queue.pop_front() {
            let node = logical.get_task(&task)?;
            let inbound = logical.get_prev_transitions(&task)?;

            if node.barrier.is_some() {
                let expected = lineage_names(&node.splits);
                let current = lineage_names(&splits);
                if expected.len() > current.len() && expected.starts_with(&current) {
                    tracing::warn!(
                        "Deferring join {} reached with split lineage {:?}, expected {:?}",
                        task,
                        current,
                        expected
                    );
                    continue;
                }
            }

            let predecessors: HashSet<&str> = inbound.iter().map(|edge| edge.source.as_str()).collect();
            let split_point = node.barrier.is_none() && predecessors.len() > 1 && !logical.in_cycle(&task);
            if split_point {
                let counter = counters.entry(task.clone()).or_insert(0);
                *counter += 1;
                splits.push(Split(task.clone(), *counter));
                if splits.len() > self.config.max_split_depth {
                    return Err(ComposeError::LimitExceeded {
                        limit: "max_split_depth",
                        max: self.config.max_split_depth,
                    });
                }
            }

            let exec_id = match splits.last() {
                Some(split) => format!("{}__{}", task, split.instance()),
                None => task.clone(),
            };

            let created = !graph.has_task(&exec_id);
            graph.add_task(
                &exec_id,
                TaskAttrs {
                    name: Some(task.clone()),
                    barrier: node.barrier,
                    splits: (!splits.is_empty()).then(|| splits.clone()),
                    retry: node.retry.clone(),
                },
            );
            if created {
                instances.entry(task.clone()).or_default().push(exec_id.clone());
                if graph.task_count() > self.config.max_instances {
                    return Err(ComposeError::LimitExceeded {
                        limit: "max_instances",
                        max: self.config.max_instances,
                    });
                }
            }

            // A split instance belongs to the single path that created it.
            // Any other node is fed by every upstream instance on its lineage.
            let mut sources: Vec<(String, TransitionEntry)> = prev.into_iter().collect();
            if !split_point {
                for edge in &inbound {
                    for instance in instances.get(&edge.source).into_iter().flatten() {
                        if graph.get_task(instance)?.splits == splits {
                            sources.push((instance.clone(), edge.clone()));
                        }
                    }
                }
            }

            for (source_id, edge) in sources {
                let criteria = rewrite_criteria(&edge.criteria, &edge.source, &source_id)?;
                let mut filter = TransitionFilter::criteria(criteria.clone());
                if let Some(reference) = edge.reference {
                    filter = filter.with_reference(reference);
                }
                if graph.has_transition(&source_id, &exec_id, &filter).is_empty() {
                    graph.add_transition(
                        &source_id,
                        &exec_id,
                        TransitionAttrs::new(criteria, edge.reference),
                    )?;
                }
            }

            if created {
                for edge in logical.get_next_transitions(&task)? {
                    queue.push_back(Visit {
                        task: edge.destination.clone(),
                        splits: splits.clone(),
                        prev: Some((exec_id.clone(), edge)),
                    });
                }
            }
        }

        tracing::debug!(
            "Expanded {} logical tasks into {} execution nodes",
            logical.task_count(),
            graph.task_count()
        );

        Ok(graph)
    }
}

impl GraphComposer for ExpandingComposer {
    fn compose(&self, model: &TaskTransitionModel) -> Result<WorkflowGraph, ComposeError> {
        let logical = DirectComposer::new(self.config.clone()).compose(model)?;
        self.expand(&logical)
    }
}

/// Replaces whole-word mentions of a task in guard criteria with the id
/// of one of its instances.
fn rewrite_criteria(criteria: &[String], task: &str, exec_id: &str) -> Result<Vec<String>, ComposeError> {
    if task == exec_id || criteria.is_empty() {
        return Ok(criteria.to_vec());
    }
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(task)))?;
    Ok(criteria
        .iter()
        .map(|criterion| pattern.replace_all(criterion, NoExpand(exec_id)).into_owned())
        .collect())
}
