//! Direct composition: one graph node per task.

use super::{ComposeError, GraphComposer};
use crate::config::ComposerConfig;
use crate::graph::{lineage_names, Barrier, Split, TaskAttrs, TransitionAttrs, TransitionFilter, WorkflowGraph};
use crate::model::{is_reserved, TaskTransitionModel};
use std::collections::{HashSet, VecDeque};

/// Composes the logical graph of a workflow.
///
/// Traversal is breadth-first from the start tasks, in name order. A
/// task that is a split point (and not on a cycle) extends the split
/// lineage of everything downstream with `(task, 0)`. Reserved
/// destinations are runtime commands and produce no node.
#[derive(Clone, Debug, Default)]
pub struct DirectComposer {
    config: ComposerConfig,
}

impl DirectComposer {
    /// Creates a composer with the given limits.
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }
}

impl GraphComposer for DirectComposer {
    fn compose(&self, model: &TaskTransitionModel) -> Result<WorkflowGraph, ComposeError> {
        if model.task_count() > self.config.max_tasks {
            return Err(ComposeError::LimitExceeded {
                limit: "max_tasks",
                max: self.config.max_tasks,
            });
        }

        let starts = model.get_start_tasks();
        if starts.is_empty() {
            tracing::warn!("No start tasks found among {} tasks", model.task_count());
            return Err(ComposeError::NoStartTasks);
        }

        let mut graph = WorkflowGraph::new();
        let mut queue: VecDeque<(String, Vec<Split>)> = VecDeque::new();
        let mut queued: HashSet<(String, Vec<String>)> = HashSet::new();

        for start in starts {
            queued.insert((start.clone(), Vec::new()));
            queue.push_back((start, Vec::new()));
        }

        while let Some((name, mut splits)) = queue.pop_front() {
            let Some(task) = model.get_task(&name) else {
                continue;
            };

            let mut attrs = TaskAttrs::default();
            if let Some(join) = task.join {
                attrs.barrier = Some(Barrier::from(join));
            }
            if model.is_split(&name) && !model.in_cycle(&name) {
                splits.push(Split(name.clone(), 0));
                if splits.len() > self.config.max_split_depth {
                    return Err(ComposeError::LimitExceeded {
                        limit: "max_split_depth",
                        max: self.config.max_split_depth,
                    });
                }
            }
            if !splits.is_empty() {
                attrs.splits = Some(splits.clone());
            }
            attrs.retry = task.retry.clone();
            graph.add_task(&name, attrs);

            for link in model.get_next(&name) {
                if is_reserved(&link.task) {
                    continue;
                }
                if !model.has_task(&link.task) {
                    return Err(ComposeError::UnknownTask {
                        task: link.task,
                        origin: name,
                    });
                }

                // Decided before the edge is added, since adding it creates
                // the destination node.
                let revisit = graph.has_task(&link.task) && model.in_cycle(&link.task);

                let criteria: Vec<String> = link.condition.into_iter().collect();
                let filter = TransitionFilter::criteria(criteria.clone()).with_reference(link.reference);
                if graph.has_transition(&name, &link.task, &filter).is_empty() {
                    graph.add_transition(
                        &name,
                        &link.task,
                        TransitionAttrs::new(criteria, Some(link.reference)),
                    )?;
                }

                if revisit {
                    continue;
                }
                let key = (
                    link.task.clone(),
                    lineage_names(&splits).into_iter().map(str::to_string).collect(),
                );
                if queued.insert(key) {
                    queue.push_back((link.task, splits.clone()));
                }
            }
        }

        tracing::debug!(
            "Composed logical graph with {} tasks and {} transitions",
            graph.task_count(),
            graph.transition_count()
        );

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::load_definition_from_string;

    fn compose(yaml: &str) -> Result<WorkflowGraph, ComposeError> {
        let definition = load_definition_from_string(yaml).unwrap();
        DirectComposer::default().compose(&TaskTransitionModel::from(&definition))
    }

    #[test]
    fn test_split_point_is_annotated() {
        let graph = compose(
            r#"
tasks:
  task1:
    next: [{do: [task2, task3]}]
  task2:
    next: [{do: task4}]
  task3:
    next: [{do: task4}]
  task4:
    next: [{do: task5}]
  task5: {}
"#,
        )
        .unwrap();

        assert_eq!(graph.task_count(), 5);
        let lineage = vec![Split("task4".to_string(), 0)];
        assert_eq!(graph.get_task("task4").unwrap().splits, lineage);
        assert_eq!(graph.get_task("task5").unwrap().splits, lineage);
        assert!(graph.get_task("task3").unwrap().splits.is_empty());
    }

    #[test]
    fn test_reserved_destinations_are_skipped() {
        let graph = compose(
            r#"
tasks:
  task1:
    next:
      - when: <% failed() %>
        do: fail
      - do: task2
  task2: {}
"#,
        )
        .unwrap();
        assert_eq!(graph.task_count(), 2);
        assert_eq!(graph.transition_count(), 1);
    }

    #[test]
    fn test_undefined_destination_is_an_error() {
        let err = compose("tasks:\n  task1:\n    next: [{do: ghost}]\n").unwrap_err();
        assert!(matches!(err, ComposeError::UnknownTask { ref task, .. } if task == "ghost"));
    }

    #[test]
    fn test_cycle_without_entry_is_an_error() {
        let err = compose(
            "tasks:\n  task1:\n    next: [{do: task2}]\n  task2:\n    next: [{do: task1}]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::NoStartTasks));
    }

    #[test]
    fn test_loop_registers_back_edge_once() {
        let graph = compose(
            r#"
tasks:
  init:
    next: [{do: check}]
  check:
    next:
      - when: <% ctx(retry) %>
        do: work
      - when: <% not ctx(retry) %>
        do: done
  work:
    next: [{do: check}]
  done: {}
"#,
        )
        .unwrap();

        assert_eq!(graph.task_count(), 4);
        assert_eq!(graph.transition_count(), 4);
        assert!(graph.in_cycle("check"));
        assert!(graph.get_task("check").unwrap().splits.is_empty());
    }

    #[test]
    fn test_task_limit() {
        let definition = load_definition_from_string(
            "tasks:\n  a:\n    next: [{do: b}]\n  b: {}\n",
        )
        .unwrap();
        let composer = DirectComposer::new(ComposerConfig {
            max_tasks: 1,
            ..Default::default()
        });
        let err = composer
            .compose(&TaskTransitionModel::from(&definition))
            .unwrap_err();
        assert!(matches!(err, ComposeError::LimitExceeded { limit: "max_tasks", .. }));
    }
}
