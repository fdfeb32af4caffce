use crate::lifecycle;
use async_trait::async_trait;
use relaycore::{EventEmitter, FlowError, Node, Outcome, SharedContext};
use std::any::TypeId;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a step inside a transition graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    /// A node variant; there is one instance per variant.
    Variant(TypeId),
    /// A flow or race step instance.
    Instance(Uuid),
}

/// Anything a flow can activate: nodes, nested flows and race steps
#[async_trait]
pub trait Step: Send + Sync {
    fn id(&self) -> StepId;

    fn name(&self) -> &str;

    async fn activate(
        &self,
        ctx: &SharedContext,
        events: &EventEmitter,
    ) -> Result<Outcome, FlowError>;
}

pub type StepRef = Arc<dyn Step>;

/// Graph handle for a singleton node
pub struct NodeStep<N> {
    node: Arc<N>,
}

impl<N: Node> NodeStep<N> {
    pub(crate) fn new(node: Arc<N>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Arc<N> {
        &self.node
    }
}

#[async_trait]
impl<N: Node> Step for NodeStep<N> {
    fn id(&self) -> StepId {
        StepId::Variant(TypeId::of::<N>())
    }

    fn name(&self) -> &str {
        self.node.name()
    }

    async fn activate(
        &self,
        ctx: &SharedContext,
        events: &EventEmitter,
    ) -> Result<Outcome, FlowError> {
        lifecycle::activate(self.node.as_ref(), ctx, events).await
    }
}
