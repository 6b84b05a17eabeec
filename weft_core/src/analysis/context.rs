//! Context dataflow analysis: variables referenced before assignment.

use crate::model::{is_reserved, ExpressionSite, TaskTransitionModel};
use indexmap::IndexSet;
use std::collections::{BTreeSet, HashMap, VecDeque};
use weft_expr::{Diagnostic, EvaluatorRegistry};

type Vocabulary = BTreeSet<String>;

/// Forward walk threading the set of defined variable names through
/// the workflow.
///
/// Inputs and vars seed the vocabulary, published entries extend it,
/// and join tasks take the union of every branch that reached them
/// before they were first processed. Every task keeps the union of the
/// vocabularies it has been visited with, and is revisited only when an
/// arrival brings a name it has not seen.
pub struct ContextAnalyzer<'a> {
    registry: &'a EvaluatorRegistry,
}

impl<'a> ContextAnalyzer<'a> {
    /// Creates an analyzer extracting references with the registry's dialects.
    pub fn new(registry: &'a EvaluatorRegistry) -> Self {
        Self { registry }
    }

    /// Returns one diagnostic per variable referenced before assignment.
    pub fn analyze(&self, model: &TaskTransitionModel) -> Vec<Diagnostic> {
        let mut diagnostics: IndexSet<Diagnostic> = IndexSet::new();

        let mut seeded = Vocabulary::new();
        for binding in model.inputs().iter().chain(model.vars()) {
            self.check(&binding.sites, &seeded, &mut diagnostics);
            seeded.insert(binding.name.clone());
        }

        let mut rolling = seeded.clone();
        let mut join_contexts: HashMap<String, Vocabulary> = HashMap::new();
        let mut visited: HashMap<String, Vocabulary> = HashMap::new();
        let mut queue: VecDeque<(String, Vocabulary)> = model
            .get_start_tasks()
            .into_iter()
            .map(|task| (task, seeded.clone()))
            .collect();

        while let Some((name, incoming)) = queue.pop_front() {
            // A join sees whatever its branches have contributed so far.
            let incoming = join_contexts.get(&name).cloned().unwrap_or(incoming);
            let vocabulary = match visited.get_mut(&name) {
                Some(known) if incoming.is_subset(known) => continue,
                Some(known) => {
                    known.extend(incoming);
                    known.clone()
                }
                None => {
                    visited.insert(name.clone(), incoming.clone());
                    incoming
                }
            };
            let Some(task) = model.get_task(&name) else {
                continue;
            };

            self.check(&task.sites, &vocabulary, &mut diagnostics);

            for transition in &task.transitions {
                if let Some(when) = &transition.when {
                    self.check(std::slice::from_ref(when), &vocabulary, &mut diagnostics);
                }

                let mut contribution = vocabulary.clone();
                for binding in &transition.publish {
                    self.check(&binding.sites, &contribution, &mut diagnostics);
                    contribution.insert(binding.name.clone());
                }
                rolling.extend(contribution.iter().cloned());

                for destination in &transition.destinations {
                    if is_reserved(destination) || !model.has_task(destination) {
                        continue;
                    }
                    if model.is_join(destination) {
                        let first_reach = !join_contexts.contains_key(destination);
                        join_contexts
                            .entry(destination.clone())
                            .or_default()
                            .extend(contribution.iter().cloned());
                        if first_reach {
                            queue.push_back((destination.clone(), contribution.clone()));
                        }
                    } else {
                        queue.push_back((destination.clone(), contribution.clone()));
                    }
                }
            }
        }

        for binding in model.outputs() {
            self.check(&binding.sites, &rolling, &mut diagnostics);
            rolling.insert(binding.name.clone());
        }

        diagnostics.into_iter().collect()
    }

    fn check(&self, sites: &[ExpressionSite], vocabulary: &Vocabulary, diagnostics: &mut IndexSet<Diagnostic>) {
        for site in sites {
            for reference in self.registry.extract_vars(&site.text) {
                if vocabulary.contains(&reference.name) {
                    continue;
                }
                diagnostics.insert(
                    Diagnostic::new(
                        reference.dialect,
                        format!(
                            "Variable \"{}\" is referenced before assignment.",
                            reference.name
                        ),
                    )
                    .with_expression(reference.source)
                    .at(site.spec_path.as_str(), site.schema_path.as_str()),
                );
            }
        }
    }
}
