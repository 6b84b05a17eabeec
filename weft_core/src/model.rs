//! Task Transition Model.
//!
//! A read-only view over a workflow definition, resolved once so that
//! composition and analysis never look at the document shape again.
//! Every expression-bearing field is flattened into an
//! [`ExpressionSite`] that records where it came from.

use crate::definition::{
    ItemsSpec, JoinSpec, Parameter, RetrySpec, TaskSpec, WorkflowDefinition,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

/// Task names the engine reserves for runtime commands.
///
/// They are valid transition destinations without a task definition.
pub const RESERVED_TASK_NAMES: [&str; 4] = ["continue", "fail", "noop", "retry"];

/// Returns true if the name is a reserved engine command.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_TASK_NAMES.contains(&name)
}

const TASK_SCHEMA: &str = r"properties.tasks.patternProperties.^\w+$";

/// A string value that may contain expressions, with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSite {
    /// Dotted path into the definition
    pub spec_path: String,
    /// Path into the definition schema
    pub schema_path: String,
    /// Raw text
    pub text: String,
}

impl ExpressionSite {
    fn new(spec_path: String, schema_path: String, text: impl Into<String>) -> Self {
        Self {
            spec_path,
            schema_path,
            text: text.into(),
        }
    }
}

/// A named binding: a workflow input, var, output or published entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Bound variable name
    pub name: String,
    /// Expression sites of the bound value
    pub sites: Vec<ExpressionSite>,
}

/// A resolved transition clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Ordinal of the clause within its source task
    pub reference: usize,
    /// Guard expression
    pub when: Option<ExpressionSite>,
    /// Published bindings, in declaration order
    pub publish: Vec<Binding>,
    /// Destination task names
    pub destinations: Vec<String>,
    /// Dotted path of the clause
    pub spec_path: String,
}

impl Transition {
    /// Returns the guard text, if any.
    pub fn condition(&self) -> Option<&str> {
        self.when.as_ref().map(|site| site.text.as_str())
    }
}

/// A resolved task.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique task name
    pub name: String,
    /// Outgoing clauses in declaration order
    pub transitions: Vec<Transition>,
    /// Join policy
    pub join: Option<JoinSpec>,
    /// Retry policy
    pub retry: Option<RetrySpec>,
    /// For-each metadata
    pub items: Option<ItemsSpec>,
    /// Expression sites of the task body (action, input, with, retry)
    pub sites: Vec<ExpressionSite>,
}

/// One step between two tasks as seen from either end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLink {
    /// Peer task (destination for successors, source for predecessors)
    pub task: String,
    /// Guard of the originating clause
    pub condition: Option<String>,
    /// Ordinal of the originating clause within its source task
    pub reference: usize,
}

/// Read-only view over a workflow definition.
#[derive(Debug, Clone, Default)]
pub struct TaskTransitionModel {
    tasks: IndexMap<String, Task>,
    inputs: Vec<Binding>,
    vars: Vec<Binding>,
    outputs: Vec<Binding>,
}

impl TaskTransitionModel {
    /// Returns the task with the given name.
    pub fn get_task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Returns true if a task with this name is defined.
    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Returns task names in declaration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|name| name.as_str())
    }

    /// Returns tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Returns the number of defined tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Workflow inputs in declaration order.
    pub fn inputs(&self) -> &[Binding] {
        &self.inputs
    }

    /// Workflow vars in declaration order.
    pub fn vars(&self) -> &[Binding] {
        &self.vars
    }

    /// Workflow outputs in declaration order.
    pub fn outputs(&self) -> &[Binding] {
        &self.outputs
    }

    /// Every expression site of the workflow, declarations first.
    pub fn expression_sites(&self) -> Vec<&ExpressionSite> {
        let declarations = self
            .inputs
            .iter()
            .chain(&self.vars)
            .chain(&self.outputs)
            .flat_map(|binding| &binding.sites);

        let tasks = self.tasks.values().flat_map(|task| {
            task.sites.iter().chain(task.transitions.iter().flat_map(|transition| {
                transition
                    .when
                    .iter()
                    .chain(transition.publish.iter().flat_map(|binding| &binding.sites))
            }))
        });

        declarations.chain(tasks).collect()
    }

    /// Returns the successors of a task, sorted by destination name.
    ///
    /// Reserved destinations are included. An unknown task has no
    /// successors.
    pub fn get_next(&self, task: &str) -> Vec<TaskLink> {
        let Some(task) = self.tasks.get(task) else {
            return Vec::new();
        };

        let mut next: Vec<TaskLink> = task
            .transitions
            .iter()
            .flat_map(|transition| {
                transition.destinations.iter().map(move |destination| TaskLink {
                    task: destination.clone(),
                    condition: transition.condition().map(str::to_string),
                    reference: transition.reference,
                })
            })
            .collect();

        next.sort_by(|a, b| a.task.cmp(&b.task).then(a.reference.cmp(&b.reference)));
        next
    }

    /// Returns the predecessors of a task, sorted by source name.
    ///
    /// Computed by scanning every task's clauses.
    pub fn get_prev(&self, task: &str) -> Vec<TaskLink> {
        let mut prev: Vec<TaskLink> = self
            .tasks
            .values()
            .flat_map(|source| {
                source
                    .transitions
                    .iter()
                    .filter(|transition| transition.destinations.iter().any(|d| d == task))
                    .map(move |transition| TaskLink {
                        task: source.name.clone(),
                        condition: transition.condition().map(str::to_string),
                        reference: transition.reference,
                    })
            })
            .collect();

        prev.sort_by(|a, b| a.task.cmp(&b.task).then(a.reference.cmp(&b.reference)));
        prev
    }

    /// Returns tasks without predecessors, sorted by name.
    ///
    /// An empty result while tasks exist means every task sits on a
    /// cycle with no entry point.
    pub fn get_start_tasks(&self) -> Vec<String> {
        let mut targeted: HashSet<&str> = HashSet::new();
        for task in self.tasks.values() {
            for transition in &task.transitions {
                targeted.extend(transition.destinations.iter().map(|d| d.as_str()));
            }
        }

        let mut starts: Vec<String> = self
            .tasks
            .keys()
            .filter(|name| !targeted.contains(name.as_str()))
            .cloned()
            .collect();
        starts.sort();
        starts
    }

    /// Returns true if the task has a join policy.
    pub fn is_join(&self, task: &str) -> bool {
        self.tasks
            .get(task)
            .map(|task| task.join.is_some())
            .unwrap_or(false)
    }

    /// Returns true if the task is reached from more than one task and
    /// does not join them.
    pub fn is_split(&self, task: &str) -> bool {
        if !self.has_task(task) || self.is_join(task) {
            return false;
        }
        let sources: HashSet<String> = self.get_prev(task).into_iter().map(|link| link.task).collect();
        sources.len() > 1
    }

    /// Returns true if the task can reach itself.
    pub fn in_cycle(&self, task: &str) -> bool {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = self.get_next(task).into_iter().map(|link| link.task).collect();

        while let Some(current) = queue.pop_front() {
            if current == task {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            queue.extend(
                self.get_next(&current)
                    .into_iter()
                    .map(|link| link.task)
                    .filter(|next| !visited.contains(next)),
            );
        }

        false
    }
}

impl From<&WorkflowDefinition> for TaskTransitionModel {
    fn from(definition: &WorkflowDefinition) -> Self {
        let tasks = definition
            .tasks
            .iter()
            .map(|(name, spec)| (name.clone(), resolve_task(name, spec)))
            .collect();

        Self {
            tasks,
            inputs: resolve_bindings(&definition.input, "input", "properties.input"),
            vars: resolve_bindings(&definition.vars, "vars", "properties.vars"),
            outputs: resolve_bindings(&definition.output, "output", "properties.output"),
        }
    }
}

fn resolve_task(name: &str, spec: &TaskSpec) -> Task {
    let base = format!("tasks.{}", name);
    let mut sites = Vec::new();

    if let Some(action) = &spec.action {
        sites.push(ExpressionSite::new(
            format!("{}.action", base),
            format!("{}.properties.action", TASK_SCHEMA),
            action.as_str(),
        ));
    }

    for (key, value) in &spec.input {
        collect_sites(
            value,
            &format!("{}.input.{}", base, key),
            &format!("{}.properties.input", TASK_SCHEMA),
            &mut sites,
        );
    }

    if let Some(items) = &spec.items {
        sites.push(ExpressionSite::new(
            format!("{}.with.items", base),
            format!("{}.properties.with.properties.items", TASK_SCHEMA),
            items.items.as_str(),
        ));
        if let Some(concurrency) = &items.concurrency {
            collect_sites(
                concurrency,
                &format!("{}.with.concurrency", base),
                &format!("{}.properties.with.properties.concurrency", TASK_SCHEMA),
                &mut sites,
            );
        }
    }

    if let Some(when) = spec.retry.as_ref().and_then(|retry| retry.when.as_ref()) {
        sites.push(ExpressionSite::new(
            format!("{}.retry.when", base),
            format!("{}.properties.retry.properties.when", TASK_SCHEMA),
            when.as_str(),
        ));
    }

    let transitions = spec
        .next
        .iter()
        .enumerate()
        .map(|(reference, clause)| {
            let spec_path = format!("{}.next[{}]", base, reference);
            let schema_path = format!("{}.properties.next.items", TASK_SCHEMA);
            Transition {
                reference,
                when: clause.when.as_ref().map(|when| {
                    ExpressionSite::new(
                        format!("{}.when", spec_path),
                        format!("{}.properties.when", schema_path),
                        when.as_str(),
                    )
                }),
                publish: resolve_bindings(
                    &clause.publish,
                    &format!("{}.publish", spec_path),
                    &format!("{}.properties.publish", schema_path),
                ),
                destinations: clause.destinations.clone(),
                spec_path,
            }
        })
        .collect();

    Task {
        name: name.to_string(),
        transitions,
        join: spec.join,
        retry: spec.retry.clone(),
        items: spec.items.clone(),
        sites,
    }
}

fn resolve_bindings(parameters: &[Parameter], spec_path: &str, schema_path: &str) -> Vec<Binding> {
    parameters
        .iter()
        .enumerate()
        .map(|(i, parameter)| {
            let mut sites = Vec::new();
            if let Some(value) = &parameter.value {
                collect_sites(
                    value,
                    &format!("{}[{}].{}", spec_path, i, parameter.name),
                    schema_path,
                    &mut sites,
                );
            }
            Binding {
                name: parameter.name.clone(),
                sites,
            }
        })
        .collect()
}

/// Collects every string found in a value, walking arrays and objects.
fn collect_sites(value: &Value, spec_path: &str, schema_path: &str, sites: &mut Vec<ExpressionSite>) {
    let mut stack: Vec<(&Value, String)> = vec![(value, spec_path.to_string())];

    while let Some((value, path)) = stack.pop() {
        match value {
            Value::String(text) => {
                sites.push(ExpressionSite::new(path, schema_path.to_string(), text.as_str()))
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate().rev() {
                    stack.push((item, format!("{}[{}]", path, i)));
                }
            }
            Value::Object(map) => {
                let entries: Vec<_> = map.iter().collect();
                for (key, item) in entries.into_iter().rev() {
                    stack.push((item, format!("{}.{}", path, key)));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::load_definition_from_string;

    fn model(yaml: &str) -> TaskTransitionModel {
        TaskTransitionModel::from(&load_definition_from_string(yaml).unwrap())
    }

    const FAN_OUT_FAN_IN: &str = r#"
tasks:
  task1:
    next:
      - do: task2, task3
  task2:
    next:
      - when: <% succeeded() %>
        do: task4
  task3:
    next:
      - do: task4
  task4:
    join: all
"#;

    #[test]
    fn test_get_next_sorted_by_destination() {
        let model = model(FAN_OUT_FAN_IN);
        let next = model.get_next("task1");
        let names: Vec<&str> = next.iter().map(|l| l.task.as_str()).collect();
        assert_eq!(names, vec!["task2", "task3"]);
        assert!(next.iter().all(|l| l.reference == 0 && l.condition.is_none()));
        assert!(model.get_next("missing").is_empty());
    }

    #[test]
    fn test_get_prev_scans_all_tasks() {
        let model = model(FAN_OUT_FAN_IN);
        let prev = model.get_prev("task4");
        assert_eq!(prev.len(), 2);
        assert_eq!(prev[0].task, "task2");
        assert_eq!(prev[0].condition.as_deref(), Some("<% succeeded() %>"));
        assert_eq!(prev[1].task, "task3");
    }

    #[test]
    fn test_join_is_never_split() {
        let model = model(FAN_OUT_FAN_IN);
        assert!(model.is_join("task4"));
        assert!(!model.is_split("task4"));
        assert!(!model.is_split("task2"));
        assert!(!model.is_join("task2"));
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("noop"));
        assert!(is_reserved("fail"));
        assert!(!is_reserved("task1"));
    }

    #[test]
    fn test_in_cycle() {
        let model = model(
            r#"
tasks:
  prep:
    next: [{do: task1}]
  task1:
    next: [{do: task2}]
  task2:
    next: [{when: <% failed() %>, do: task1}, {do: done}]
  done: {}
"#,
        );
        assert!(model.in_cycle("task1"));
        assert!(model.in_cycle("task2"));
        assert!(!model.in_cycle("prep"));
        assert!(!model.in_cycle("done"));
        assert_eq!(model.get_start_tasks(), vec!["prep"]);
    }

    #[test]
    fn test_expression_sites_carry_paths() {
        let model = model(
            r#"
vars:
  - foo: <% ctx(bar) %>
tasks:
  task1:
    action: core.echo
    input:
      msg: <% ctx(foo) %>
      list: [a, <% ctx(x) %>]
    next:
      - when: <% ctx(ok) %>
        publish:
          - y: <% result() %>
        do: noop
"#,
        );
        let paths: Vec<&str> = model
            .expression_sites()
            .iter()
            .map(|site| site.spec_path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec![
                "vars[0].foo",
                "tasks.task1.action",
                "tasks.task1.input.msg",
                "tasks.task1.input.list[0]",
                "tasks.task1.input.list[1]",
                "tasks.task1.next[0].when",
                "tasks.task1.next[0].publish[0].y",
            ]
        );
    }
}
