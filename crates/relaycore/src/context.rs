use crate::{FlowError, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A named partition of configuration and mutable state
///
/// Besides its `config` sub-map a component carries arbitrary fields that
/// nodes use to hand data to later activations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub config: HashMap<String, Value>,

    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl Component {
    pub fn new(config: HashMap<String, Value>) -> Self {
        Self {
            config,
            fields: HashMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The data behind a [`SharedContext`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextData {
    pub config: HashMap<String, Value>,

    #[serde(default)]
    pub components: HashMap<String, Component>,

    /// Name of the step currently or most recently activated. Engine-managed.
    #[serde(default)]
    pub state: Option<String>,
}

impl ContextData {
    pub fn new(config: HashMap<String, Value>) -> Self {
        Self {
            config,
            components: HashMap::new(),
            state: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_component(mut self, id: impl Into<String>, component: Component) -> Self {
        self.components.insert(id.into(), component);
        self
    }

    pub fn component_mut(&mut self, id: &str) -> &mut Component {
        self.components.entry(id.to_string()).or_default()
    }
}

/// Handle to the context of one flow run
///
/// Cloning the handle does not copy the data: every clone reads and writes
/// the same [`ContextData`]. Locks are held only for the duration of a single
/// read or write, so concurrent race tasks interleave freely.
#[derive(Debug, Clone, Default)]
pub struct SharedContext {
    inner: Arc<RwLock<ContextData>>,
}

impl SharedContext {
    pub fn new(config: HashMap<String, Value>) -> Self {
        Self::from(ContextData::new(config))
    }

    /// Parse a context document; `config` is required, the rest defaults.
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        let data: ContextData = serde_json::from_str(json)?;
        Ok(Self::from(data))
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ContextData> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, ContextData> {
        self.inner.write().await
    }

    pub async fn state(&self) -> Option<String> {
        self.inner.read().await.state.clone()
    }

    pub async fn set_state(&self, name: impl Into<String>) {
        self.inner.write().await.state = Some(name.into());
    }

    /// Copy of the current data, e.g. for printing after a run.
    pub async fn snapshot(&self) -> ContextData {
        self.inner.read().await.clone()
    }

    pub async fn component_field(&self, component: &str, key: &str) -> Option<Value> {
        self.inner
            .read()
            .await
            .components
            .get(component)
            .and_then(|c| c.fields.get(key))
            .cloned()
    }

    /// Set a free-form component field, creating the component if needed.
    pub async fn set_component_field(
        &self,
        component: &str,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        let mut data = self.inner.write().await;
        data.component_mut(component)
            .fields
            .insert(key.into(), value.into());
    }

    /// Whether both handles refer to the same context.
    pub fn ptr_eq(&self, other: &SharedContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<ContextData> for SharedContext {
    fn from(data: ContextData) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }
}
