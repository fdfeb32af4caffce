use crate::step::{Step, StepId, StepRef};
use async_trait::async_trait;
use chrono::Utc;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use relaycore::{
    Action, EventBus, EventEmitter, ExecutionEvent, ExecutionId, FlowError, Outcome,
    SharedContext, WorkflowError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Label on a transition edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Taken when no labeled edge matches the action.
    Default,
    OnAction(Action),
}

/// Transition graph over steps plus the sequential run loop
///
/// Each source step has at most one default edge and at most one edge per
/// action label. Labeled edges win over the default edge at lookup time.
pub struct Flow {
    id: Uuid,
    name: String,
    graph: DiGraph<StepRef, Transition>,
    index: HashMap<StepId, NodeIndex>,
    start: Option<NodeIndex>,
    events: EventBus,
}

impl Flow {
    pub fn new() -> Self {
        Self::named("Flow")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            graph: DiGraph::new(),
            index: HashMap::new(),
            start: None,
            events: EventBus::default(),
        }
    }

    /// Publish execution events of top-level runs on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = bus;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn set_start(&mut self, step: &StepRef) -> Connector<'_> {
        let idx = self.ensure(step);
        self.start = Some(idx);
        Connector {
            flow: self,
            current: Arc::clone(step),
        }
    }

    pub fn connect_default(&mut self, from: &StepRef, to: &StepRef) -> Connector<'_> {
        self.add_transition(from, Transition::Default, to);
        Connector {
            flow: self,
            current: Arc::clone(to),
        }
    }

    pub fn connect_on_action(
        &mut self,
        from: &StepRef,
        action: impl Into<Action>,
        to: &StepRef,
    ) -> Connector<'_> {
        self.add_transition(from, Transition::OnAction(action.into()), to);
        Connector {
            flow: self,
            current: Arc::clone(to),
        }
    }

    /// The step `from` hands over to after yielding `action`
    pub fn successor(&self, from: &StepRef, action: Option<&Action>) -> Option<&StepRef> {
        let idx = self.index.get(&from.id())?;
        self.next_index(*idx, action).map(|next| &self.graph[next])
    }

    pub fn step_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn transition_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn into_step(self) -> StepRef {
        Arc::new(self)
    }

    /// Run from the start step until an action has no outgoing transition
    ///
    /// Returns the outcome of the last activation. There is no iteration cap;
    /// a cycle ends only when some step yields an action without an edge.
    pub async fn run(&self, ctx: &SharedContext) -> Result<Outcome, FlowError> {
        let execution_id = ExecutionId::new_v4();
        let events = self.events.create_emitter(execution_id);
        let started = Instant::now();

        self.events.emit(ExecutionEvent::RunStarted {
            execution_id,
            flow: self.name.clone(),
            timestamp: Utc::now(),
        });
        info!("Starting flow {} ({})", self.name, execution_id);

        let result = self.run_with(ctx, &events).await;

        self.events.emit(ExecutionEvent::RunCompleted {
            execution_id,
            flow: self.name.clone(),
            success: result.is_ok(),
            action: result.as_ref().ok().cloned().flatten(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });

        result
    }

    async fn run_with(
        &self,
        ctx: &SharedContext,
        events: &EventEmitter,
    ) -> Result<Outcome, FlowError> {
        let mut current = self
            .start
            .ok_or_else(|| WorkflowError::NoStart(self.name.clone()))?;

        loop {
            let step = &self.graph[current];
            let name = step.name();
            ctx.set_state(name).await;

            debug!("Activating step {}", name);
            events.step_started(name);
            let started = Instant::now();

            let outcome = match step.activate(ctx, events).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    events.step_failed(name, &e);
                    return Err(e);
                }
            };
            events.step_completed(name, outcome.as_ref(), started.elapsed());

            match self.next_index(current, outcome.as_ref()) {
                Some(next) => {
                    debug!("Step {} -> {} on {:?}", name, self.graph[next].name(), outcome);
                    current = next;
                }
                None => {
                    debug!("Flow {} ends after {}: no transition for {:?}", self.name, name, outcome);
                    return Ok(outcome);
                }
            }
        }
    }

    fn ensure(&mut self, step: &StepRef) -> NodeIndex {
        if let Some(idx) = self.index.get(&step.id()) {
            return *idx;
        }
        let idx = self.graph.add_node(Arc::clone(step));
        self.index.insert(step.id(), idx);
        idx
    }

    fn add_transition(&mut self, from: &StepRef, transition: Transition, to: &StepRef) {
        let from_idx = self.ensure(from);
        let to_idx = self.ensure(to);

        if let Some(existing) = self.find_edge(from_idx, &transition) {
            warn!(
                "Overwriting {:?} transition from {}",
                transition,
                self.graph[from_idx].name()
            );
            self.graph.remove_edge(existing);
        }
        self.graph.add_edge(from_idx, to_idx, transition);
    }

    fn find_edge(&self, from: NodeIndex, transition: &Transition) -> Option<EdgeIndex> {
        self.graph
            .edges_directed(from, Direction::Outgoing)
            .find(|edge| edge.weight() == transition)
            .map(|edge| edge.id())
    }

    fn next_index(&self, from: NodeIndex, action: Option<&Action>) -> Option<NodeIndex> {
        let labeled = action.and_then(|action| {
            self.find_edge(from, &Transition::OnAction(action.clone()))
        });
        labeled
            .or_else(|| self.find_edge(from, &Transition::Default))
            .and_then(|edge| self.graph.edge_endpoints(edge))
            .map(|(_, target)| target)
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for Flow {
    fn id(&self) -> StepId {
        StepId::Instance(self.id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// Nested flows run inside the parent's execution.
    async fn activate(
        &self,
        ctx: &SharedContext,
        events: &EventEmitter,
    ) -> Result<Outcome, FlowError> {
        self.run_with(ctx, events).await
    }
}

/// Chaining handle returned by the edge-construction calls
///
/// Every call continues from the target of the previous edge, so
/// `flow.set_start(&a).then(&b).then(&c)` wires `a -> b -> c`.
pub struct Connector<'a> {
    flow: &'a mut Flow,
    current: StepRef,
}

impl<'a> Connector<'a> {
    pub fn then(self, next: &StepRef) -> Connector<'a> {
        self.flow.add_transition(&self.current, Transition::Default, next);
        Connector {
            flow: self.flow,
            current: Arc::clone(next),
        }
    }

    pub fn on_action(self, action: impl Into<Action>, next: &StepRef) -> Connector<'a> {
        self.flow
            .add_transition(&self.current, Transition::OnAction(action.into()), next);
        Connector {
            flow: self.flow,
            current: Arc::clone(next),
        }
    }

    pub fn step(&self) -> &StepRef {
        &self.current
    }
}
