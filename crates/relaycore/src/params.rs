use crate::{ContextData, NodeError, SharedContext, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The three lifecycle phases of an activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Prelude,
    Dispatch,
    Postlude,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prelude => "prelude",
            Phase::Dispatch => "dispatch",
            Phase::Postlude => "postlude",
        };
        f.write_str(name)
    }
}

/// Parameters a phase declares it needs from the resolved configuration
///
/// Only declared keys reach the phase. Required keys that are absent fail
/// the binding instead of defaulting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSchema {
    required: Vec<String>,
    optional: Vec<String>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.optional.push(name.into());
        self
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn optionals(&self) -> &[String] {
        &self.optional
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }
}

/// Parameter set handed to a single phase call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<String, Value>,
}

impl Params {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.values.get(name).cloned().unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn require(&self, name: &str) -> Result<&Value, NodeError> {
        self.values
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing parameter: {}", name)))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "string", value))
    }

    pub fn require_f64(&self, name: &str) -> Result<f64, NodeError> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| mismatch(name, "number", value))
    }

    pub fn require_i64(&self, name: &str) -> Result<i64, NodeError> {
        let value = self.require(name)?;
        value.as_i64().ok_or_else(|| mismatch(name, "integer", value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

fn mismatch(field: &str, expected: &str, actual: &Value) -> NodeError {
    NodeError::InvalidParam {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    }
}

/// Flattens general and component-scoped configuration for a phase call
pub struct ConfigResolver;

impl ConfigResolver {
    /// General config overlaid by the component's config; component entries
    /// win on collision. An unknown component contributes nothing.
    pub fn merge(data: &ContextData, component: Option<&str>) -> HashMap<String, Value> {
        let mut merged = data.config.clone();
        if let Some(id) = component {
            match data.components.get(id) {
                Some(scoped) => {
                    merged.extend(scoped.config.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                None => tracing::debug!("Component '{}' not present in context", id),
            }
        }
        merged
    }

    /// Keep only the keys declared by `schema`.
    pub fn project(
        merged: &HashMap<String, Value>,
        schema: &ParamSchema,
        phase: Phase,
    ) -> Result<Params, NodeError> {
        let mut values = HashMap::with_capacity(schema.required.len() + schema.optional.len());

        for name in &schema.required {
            let value = merged.get(name).ok_or_else(|| NodeError::MissingParam {
                phase,
                name: name.clone(),
            })?;
            values.insert(name.clone(), value.clone());
        }

        for name in &schema.optional {
            if let Some(value) = merged.get(name) {
                values.insert(name.clone(), value.clone());
            }
        }

        Ok(Params::new(values))
    }

    /// Resolve against the context as it is right now.
    pub async fn resolve(
        ctx: &SharedContext,
        component: Option<&str>,
        schema: &ParamSchema,
        phase: Phase,
    ) -> Result<Params, NodeError> {
        if schema.is_empty() {
            return Ok(Params::default());
        }
        let merged = {
            let data = ctx.read().await;
            Self::merge(&data, component)
        };
        Self::project(&merged, schema, phase)
    }
}
