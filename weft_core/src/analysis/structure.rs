//! Structural checks over the task transition model.

use crate::model::{is_reserved, TaskTransitionModel};
use std::collections::{HashMap, HashSet, VecDeque};
use weft_expr::Diagnostic;

const KIND: &str = "semantic";
const TASKS_SCHEMA: &str = r"properties.tasks.patternProperties.^\w+$";

/// Reports dangling references, reserved names, entry-point problems,
/// unreachable tasks and ambiguous joins.
pub fn check_structure(model: &TaskTransitionModel) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for task in model.tasks() {
        if is_reserved(&task.name) {
            diagnostics.push(
                Diagnostic::new(
                    KIND,
                    format!("The task name \"{}\" is reserved with special function.", task.name),
                )
                .at(format!("tasks.{}", task.name), TASKS_SCHEMA),
            );
        }

        for transition in &task.transitions {
            for destination in &transition.destinations {
                if is_reserved(destination) || model.has_task(destination) {
                    continue;
                }
                diagnostics.push(
                    Diagnostic::new(KIND, format!("The task \"{}\" is not defined.", destination))
                        .at(
                            format!("{}.do", transition.spec_path),
                            format!("{}.properties.next.items.properties.do", TASKS_SCHEMA),
                        ),
                );
            }
        }
    }

    let starts = model.get_start_tasks();
    if starts.is_empty() {
        if model.task_count() > 0 {
            diagnostics.push(
                Diagnostic::new(
                    KIND,
                    "Unable to identify start tasks. The workflow may be a cycle with no entry point.",
                )
                .at("tasks", "properties.tasks"),
            );
        }
        return diagnostics;
    }

    let reachable = reachable_from(model, &starts);
    for name in model.task_names() {
        if !reachable.contains(name) {
            diagnostics.push(
                Diagnostic::new(
                    KIND,
                    format!("The task \"{}\" is not reachable from any start task.", name),
                )
                .at(format!("tasks.{}", name), TASKS_SCHEMA),
            );
        }
    }

    for join in ambiguous_joins(model, &starts) {
        diagnostics.push(
            Diagnostic::new(
                KIND,
                format!(
                    "The join task \"{}\" is unreachable. It is reached from different levels of \
                     nested splits, so the level at which it joins is ambiguous.",
                    join
                ),
            )
            .at(format!("tasks.{}", join), TASKS_SCHEMA),
        );
    }

    diagnostics
}

fn reachable_from(model: &TaskTransitionModel, starts: &[String]) -> HashSet<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = starts.iter().cloned().collect();

    while let Some(name) = queue.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }
        queue.extend(
            model
                .get_next(&name)
                .into_iter()
                .map(|link| link.task)
                .filter(|next| model.has_task(next) && !visited.contains(next)),
        );
    }

    visited
}

/// Joins reached with more than one distinct split lineage, in
/// declaration order.
fn ambiguous_joins(model: &TaskTransitionModel, starts: &[String]) -> Vec<String> {
    let mut arrivals: HashMap<String, HashSet<Vec<String>>> = HashMap::new();
    let mut seen: HashSet<(String, Vec<String>)> = HashSet::new();
    let mut queue: VecDeque<(String, Vec<String>)> =
        starts.iter().map(|start| (start.clone(), Vec::new())).collect();

    while let Some((name, mut lineage)) = queue.pop_front() {
        if !seen.insert((name.clone(), lineage.clone())) {
            continue;
        }

        if model.is_join(&name) {
            arrivals.entry(name.clone()).or_default().insert(lineage.clone());
        } else if model.is_split(&name) && !model.in_cycle(&name) {
            lineage.push(name.clone());
        }

        for link in model.get_next(&name) {
            if model.has_task(&link.task) {
                queue.push_back((link.task, lineage.clone()));
            }
        }
    }

    model
        .task_names()
        .filter(|name| arrivals.get(*name).map_or(false, |lineages| lineages.len() > 1))
        .map(str::to_string)
        .collect()
}
