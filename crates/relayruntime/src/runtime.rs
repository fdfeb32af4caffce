use crate::{Flow, NodeRegistry, ParallelStep, StepRef, StragglerPolicy};
use relaycore::{EventBus, ExecutionEvent, FlowError, Node, Outcome, SharedContext, WorkflowError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Assembles flows against one node registry and one event bus
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    event_bus: EventBus,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(NodeRegistry::new()), config)
    }

    /// Create a new runtime around an existing registry
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            event_bus: EventBus::new(config.event_buffer_size),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The singleton instance of `N`
    pub fn node<N: Node + Default>(&self) -> Arc<N> {
        self.registry.get::<N>()
    }

    /// Graph handle for the singleton instance of `N`
    pub fn step<N: Node + Default>(&self) -> StepRef {
        self.registry.step::<N>()
    }

    /// Install an explicitly constructed node and return its graph handle
    pub fn register<N: Node>(&self, node: N) -> Result<StepRef, WorkflowError> {
        let node = self.registry.register(node)?;
        self.registry
            .step_of::<N>()
            .ok_or_else(|| WorkflowError::UnknownStep(node.name().to_string()))
    }

    /// An empty flow publishing on this runtime's event bus
    pub fn flow(&self, name: impl Into<String>) -> Flow {
        Flow::named(name).with_event_bus(self.event_bus.clone())
    }

    /// A race step using the configured straggler policy
    pub fn parallel(&self, tasks: impl IntoIterator<Item = StepRef>) -> ParallelStep {
        ParallelStep::new(tasks).with_stragglers(self.config.straggler_policy)
    }

    pub async fn run(&self, flow: &Flow, ctx: &SharedContext) -> Result<Outcome, FlowError> {
        flow.run(ctx).await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    pub straggler_policy: StragglerPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            straggler_policy: StragglerPolicy::Abort,
        }
    }
}
