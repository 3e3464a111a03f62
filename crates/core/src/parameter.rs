//! Parameters: the named slots shared by every statement of one invocation.
//!
//! A fresh [`ParameterStore`] is created per invocation and threaded by
//! mutable reference through chain, unit, and statement execution. Statements
//! read it to resolve `${name}$` references in their inputs and write their
//! declared output into it when they complete. Later writes overwrite earlier
//! ones, which is how temporary variables chain split instructions together.

use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Grammar of a parameter reference: `${name}$`.
pub const PARAM_REF_PATTERN: &str = r"\$\{([^{}$]+?)\}\$";

static PARAM_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(PARAM_REF_PATTERN).expect("parameter reference pattern is valid")
});

/// Render a bare name as a parameter reference.
pub fn placeholder(name: &str) -> String {
    format!("${{{name}}}$")
}

/// Reduce `"${name}$"`, `${name}$` or `name` to `name`.
pub fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"').trim();
    match PARAM_REF.captures(trimmed) {
        Some(caps) if caps.get(0).is_some_and(|m| m.as_str() == trimmed) => {
            caps[1].trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Every parameter name referenced in `text`, in order of appearance.
pub fn referenced_names(text: &str) -> Vec<String> {
    PARAM_REF
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

/// A named slot visible to the whole chain for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Stable identifier
    #[serde(rename = "uuid", alias = "id")]
    pub id: String,

    /// Declared type (informational; values are always text)
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,

    /// The reference form, e.g. `${City}$`
    pub placeholder: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub value: String,
}

fn default_type() -> String {
    "string".into()
}

impl Parameter {
    /// Declare a string parameter with an empty value.
    pub fn new(name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: default_type(),
            placeholder: placeholder(name),
            description: String::new(),
            value: String::new(),
        }
    }

    /// The bare name this parameter is referenced by.
    pub fn name(&self) -> String {
        normalize_name(&self.placeholder)
    }
}

/// The per-invocation parameter table.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: HashMap<String, Parameter>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with declared parameters and their initial values.
    pub fn from_params<'a>(params: impl IntoIterator<Item = &'a Parameter>) -> Self {
        let mut store = Self::new();
        for param in params {
            store.declare(param.clone());
        }
        store
    }

    /// Declare a parameter, replacing any previous declaration of the same name.
    pub fn declare(&mut self, param: Parameter) {
        self.values.insert(param.name(), param);
    }

    /// Write a value, declaring the parameter if it is new.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = normalize_name(name);
        let value = value.into();
        match self.values.get_mut(&name) {
            Some(param) => param.value = value,
            None => {
                let mut param = Parameter::new(&name);
                param.value = value;
                self.values.insert(name, param);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&normalize_name(name))
            .map(|p| p.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Substitute every `${name}$` whose parameter exists.
    ///
    /// Verbatim lookup, no coercion. References to unknown names stay as
    /// written.
    pub fn resolve(&self, text: &str) -> String {
        PARAM_REF
            .replace_all(text, |caps: &Captures<'_>| match self.values.get(caps[1].trim()) {
                Some(param) => param.value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Substitute references inside every string (keys untouched) of a JSON value.
    pub fn resolve_json(&self, value: &serde_json::Value) -> serde_json::Value {
        use serde_json::Value;
        match value {
            Value::String(s) => Value::String(self.resolve(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_json(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_json(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// A name → value copy of the table, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(name, p)| (name.clone(), p.value.clone()))
            .collect()
    }
}
