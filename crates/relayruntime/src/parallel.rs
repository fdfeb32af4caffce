use crate::step::{Step, StepId, StepRef};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use relaycore::{EventEmitter, FlowError, Outcome, SharedContext, WorkflowError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

/// What happens to the tasks that lose a race
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StragglerPolicy {
    /// Abort losing tasks at their next await point.
    #[default]
    Abort,
    /// Let losing tasks run to completion; their results are dropped.
    Detach,
}

/// Progress of the most recent activation of a race step
///
/// A step shared by concurrent activations has one cell; it reports
/// whichever activation moved it last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceState {
    Idle,
    Running,
    Completed,
}

/// Starts every bound task at once and adopts the first one to finish
///
/// All tasks share the same context handle; nothing isolates their writes.
/// The winner's outcome, including a failure, becomes the outcome of the step.
pub struct ParallelStep {
    id: Uuid,
    name: String,
    tasks: Vec<StepRef>,
    stragglers: StragglerPolicy,
    state: Mutex<RaceState>,
}

impl ParallelStep {
    pub fn new(tasks: impl IntoIterator<Item = StepRef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "ParallelStep".to_string(),
            tasks: tasks.into_iter().collect(),
            stragglers: StragglerPolicy::default(),
            state: Mutex::new(RaceState::Idle),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stragglers(mut self, policy: StragglerPolicy) -> Self {
        self.stragglers = policy;
        self
    }

    pub fn tasks(&self) -> &[StepRef] {
        &self.tasks
    }

    pub fn stragglers(&self) -> StragglerPolicy {
        self.stragglers
    }

    pub fn state(&self) -> RaceState {
        *self.state.lock()
    }

    pub fn into_step(self) -> StepRef {
        Arc::new(self)
    }
}

#[async_trait]
impl Step for ParallelStep {
    fn id(&self) -> StepId {
        StepId::Instance(self.id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn activate(
        &self,
        ctx: &SharedContext,
        events: &EventEmitter,
    ) -> Result<Outcome, FlowError> {
        if self.tasks.is_empty() {
            return Err(WorkflowError::EmptyRace(self.name.clone()).into());
        }
        let mut running = RunningState::enter(&self.state);
        let abort_on_drop = self.stragglers == StragglerPolicy::Abort;

        let mut tasks = FuturesUnordered::new();
        for (index, task) in self.tasks.iter().enumerate() {
            let task = Arc::clone(task);
            let ctx = ctx.clone();
            let events = events.clone();
            debug!("Race {} starting task {} ({})", self.name, index, task.name());
            tasks.push(RaceTask {
                handle: tokio::spawn(async move {
                    let outcome = task.activate(&ctx, &events).await;
                    (index, outcome)
                }),
                abort_on_drop,
            });
        }

        let first = tasks.next().await;
        running.complete();

        // Dropping the losers aborts or detaches them according to the policy.
        // The same happens when this activation is itself cancelled.
        drop(tasks);

        let (index, outcome) = match first {
            Some(Ok(finished)) => finished,
            Some(Err(e)) => {
                return Err(FlowError::Execution(format!(
                    "Race {} task join error: {}",
                    self.name, e
                )))
            }
            None => return Err(WorkflowError::EmptyRace(self.name.clone()).into()),
        };

        let winner = self.tasks[index].name();
        info!(
            "Race {} decided by task {} ({}), stragglers: {:?}",
            self.name, index, winner, self.stragglers
        );
        events.race_decided(&self.name, index, winner);
        outcome
    }
}

/// Spawned race task that aborts itself when dropped under `Abort`
///
/// A bare `JoinHandle` detaches on drop, which would leave the tasks of a
/// cancelled nested race running.
struct RaceTask<T> {
    handle: JoinHandle<T>,
    abort_on_drop: bool,
}

impl<T> Future for RaceTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

impl<T> Drop for RaceTask<T> {
    fn drop(&mut self) {
        if self.abort_on_drop {
            self.handle.abort();
        }
    }
}

/// Marks a race `Running` and falls back to `Idle` if the activation is
/// dropped before a winner is known.
struct RunningState<'a> {
    state: &'a Mutex<RaceState>,
    decided: bool,
}

impl<'a> RunningState<'a> {
    fn enter(state: &'a Mutex<RaceState>) -> Self {
        *state.lock() = RaceState::Running;
        Self {
            state,
            decided: false,
        }
    }

    fn complete(&mut self) {
        *self.state.lock() = RaceState::Completed;
        self.decided = true;
    }
}

impl Drop for RunningState<'_> {
    fn drop(&mut self) {
        if !self.decided {
            *self.state.lock() = RaceState::Idle;
        }
    }
}
