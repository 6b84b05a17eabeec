//! Workflow definition document.
//!
//! These types mirror the YAML document one-to-one. They carry no
//! behavior beyond (de)serialization; the rest of the crate works on the
//! resolved [`TaskTransitionModel`](crate::model::TaskTransitionModel).

mod yaml;

pub use yaml::{load_definition_from_file, load_definition_from_string, DefinitionError};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A workflow definition: declarations plus named tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Definition format version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Workflow inputs, optionally with default values
    #[serde(default, deserialize_with = "deserialize_parameters")]
    pub input: Vec<Parameter>,
    /// Workflow variables, evaluated in order
    #[serde(default, deserialize_with = "deserialize_parameters")]
    pub vars: Vec<Parameter>,
    /// Workflow outputs, evaluated in order once the workflow completes
    #[serde(default, deserialize_with = "deserialize_parameters")]
    pub output: Vec<Parameter>,
    /// Tasks in declaration order
    #[serde(default)]
    pub tasks: IndexMap<String, TaskSpec>,
}

/// A single task of the workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Action reference, opaque to the compiler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Action input values
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub input: IndexMap<String, Value>,
    /// For-each metadata
    #[serde(default, rename = "with", skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsSpec>,
    /// Retry policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySpec>,
    /// Join policy, making the task a barrier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSpec>,
    /// Outgoing transitions in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<TransitionSpec>,
}

/// A guarded transition clause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Guard expression; absent means unconditional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Variables published when the transition is taken
    #[serde(
        default,
        deserialize_with = "deserialize_parameters",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub publish: Vec<Parameter>,
    /// Destination task names
    #[serde(default, rename = "do", deserialize_with = "deserialize_destinations")]
    pub destinations: Vec<String>,
}

/// Join policy of a barrier task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawJoin", into = "RawJoin")]
pub enum JoinSpec {
    /// Wait for every inbound branch
    All,
    /// Wait for this many inbound branches
    Count(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawJoin {
    Count(u32),
    Text(String),
}

impl TryFrom<RawJoin> for JoinSpec {
    type Error = String;

    fn try_from(raw: RawJoin) -> Result<Self, Self::Error> {
        match raw {
            RawJoin::Count(n) => Ok(JoinSpec::Count(n)),
            RawJoin::Text(text) if text == "all" => Ok(JoinSpec::All),
            RawJoin::Text(text) => Err(format!(
                "join must be \"all\" or a positive integer, found \"{}\"",
                text
            )),
        }
    }
}

impl From<JoinSpec> for RawJoin {
    fn from(join: JoinSpec) -> Self {
        match join {
            JoinSpec::All => RawJoin::Text("all".to_string()),
            JoinSpec::Count(n) => RawJoin::Count(n),
        }
    }
}

/// Retry policy of a task.
///
/// Carried through to composed graph nodes untouched; retry timing is a
/// runtime concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetrySpec {
    /// Condition under which the task is retried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Maximum number of retries
    #[serde(default)]
    pub count: u32,
    /// Delay between retries, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

/// For-each metadata of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsSpec {
    /// Expression producing the items to iterate
    pub items: String,
    /// Maximum number of items processed at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<Value>,
}

/// A named value: an input, a variable, an output or a published entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameter", into = "RawParameter")]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Value or default value, usually an expression string
    pub value: Option<Value>,
}

impl Parameter {
    /// Creates a parameter with a value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Creates a parameter that only declares a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawParameter {
    Name(String),
    Pair(IndexMap<String, Value>),
}

impl TryFrom<RawParameter> for Parameter {
    type Error = String;

    fn try_from(raw: RawParameter) -> Result<Self, Self::Error> {
        match raw {
            RawParameter::Name(name) => Ok(Parameter::named(name)),
            RawParameter::Pair(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "parameter must be a name or a single-key map, found {} keys",
                        map.len()
                    ));
                }
                let (name, value) = map.into_iter().next().ok_or("empty parameter")?;
                Ok(Parameter::new(name, value))
            }
        }
    }
}

impl From<Parameter> for RawParameter {
    fn from(parameter: Parameter) -> Self {
        match parameter.value {
            None => RawParameter::Name(parameter.name),
            Some(value) => RawParameter::Pair(IndexMap::from([(parameter.name, value)])),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterList {
    List(Vec<Parameter>),
    Map(IndexMap<String, Value>),
}

/// Accepts either a list of parameters or a plain name-to-value map.
fn deserialize_parameters<'de, D>(deserializer: D) -> Result<Vec<Parameter>, D::Error>
where
    D: Deserializer<'de>,
{
    let parameters = match Option::<ParameterList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ParameterList::List(list)) => list,
        Some(ParameterList::Map(map)) => map
            .into_iter()
            .map(|(name, value)| Parameter::new(name, value))
            .collect(),
    };
    Ok(parameters)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Destinations {
    Joined(String),
    List(Vec<String>),
}

/// Accepts either a comma separated string or a list of task names.
fn deserialize_destinations<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let destinations = match Option::<Destinations>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Destinations::Joined(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Destinations::List(list)) => list,
    };
    Ok(destinations)
}
