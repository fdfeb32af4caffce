use crate::step::{NodeStep, StepRef};
use parking_lot::Mutex;
use relaycore::{Node, WorkflowError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

struct Entry {
    node: Arc<dyn Any + Send + Sync>,
    step: StepRef,
    name: String,
}

impl Entry {
    fn new<N: Node>(node: Arc<N>) -> Self {
        Self {
            name: node.name().to_string(),
            step: Arc::new(NodeStep::new(Arc::clone(&node))),
            node,
        }
    }

    fn downcast<N: Node>(&self) -> Option<Arc<N>> {
        Arc::clone(&self.node).downcast::<N>().ok()
    }
}

type Slot = Arc<OnceLock<Entry>>;

/// Holds the single live instance of each node variant
///
/// Instances are created lazily on first access. Each variant has its own
/// slot: the registry lock only guards the slot table, and construction runs
/// inside the slot's `OnceLock`. Concurrent first access still yields one
/// instance, and a node's `Default` impl may use the registry for other
/// variants.
pub struct NodeRegistry {
    nodes: Mutex<HashMap<TypeId, Slot>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide registry for callers that do not thread one through.
    pub fn global() -> &'static NodeRegistry {
        static GLOBAL: OnceLock<NodeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(NodeRegistry::new)
    }

    fn slot<N: Node>(&self) -> Slot {
        Arc::clone(self.nodes.lock().entry(TypeId::of::<N>()).or_default())
    }

    fn existing<N: Node>(&self) -> Option<Slot> {
        self.nodes.lock().get(&TypeId::of::<N>()).cloned()
    }

    fn get_or_build<N: Node + Default>(slot: &Slot) -> &Entry {
        slot.get_or_init(|| {
            let node = Arc::new(N::default());
            tracing::debug!("Constructed node {}", node.name());
            Entry::new(node)
        })
    }

    /// The instance of `N`, constructing it on first use
    ///
    /// A `Default` impl of `N` must not ask for `N` itself.
    pub fn get<N: Node + Default>(&self) -> Arc<N> {
        let slot = self.slot::<N>();
        match Self::get_or_build::<N>(&slot).downcast::<N>() {
            Some(node) => node,
            None => unreachable!("slot of {} holds another type", std::any::type_name::<N>()),
        }
    }

    /// Install an explicitly constructed instance of `N`
    pub fn register<N: Node>(&self, node: N) -> Result<Arc<N>, WorkflowError> {
        let slot = self.slot::<N>();
        let node = Arc::new(node);
        match slot.set(Entry::new(Arc::clone(&node))) {
            Ok(()) => {
                tracing::info!("Registering node: {}", node.name());
                Ok(node)
            }
            Err(rejected) => Err(WorkflowError::AlreadyRegistered(rejected.name)),
        }
    }

    pub fn try_get<N: Node>(&self) -> Option<Arc<N>> {
        self.existing::<N>()?.get()?.downcast::<N>()
    }

    /// Graph handle for `N`, sharing the instance returned by [`get`](Self::get)
    pub fn step<N: Node + Default>(&self) -> StepRef {
        let slot = self.slot::<N>();
        Arc::clone(&Self::get_or_build::<N>(&slot).step)
    }

    /// Graph handle for an already constructed `N`
    pub fn step_of<N: Node>(&self) -> Option<StepRef> {
        self.existing::<N>()?
            .get()
            .map(|entry| Arc::clone(&entry.step))
    }

    fn entries(&self) -> Vec<Slot> {
        self.nodes.lock().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries()
            .iter()
            .filter_map(|slot| slot.get().map(|e| e.name.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries().iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
