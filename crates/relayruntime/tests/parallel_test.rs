// crates/relayruntime/tests/parallel_test.rs

use async_trait::async_trait;
use relaycore::{
    Action, Component, ContextData, ExecutionEvent, FlowError, Node, NodeError, Outcome,
    ParamSchema, Params, SharedContext, Value, WorkflowError,
};
use relayruntime::{FlowRuntime, ParallelStep, RaceState, RuntimeConfig, StepRef, StragglerPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

async fn bump(ctx: &SharedContext, key: &str) {
    let mut data = ctx.write().await;
    let fields = &mut data.component_mut("race").fields;
    let current = fields.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
    fields.insert(key.to_string(), Value::from(current + 1));
}

async fn count(ctx: &SharedContext, key: &str) -> i64 {
    ctx.component_field("race", key)
        .await
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

/// Sleeps `$secs` in dispatch, then bumps the shared `finished` counter.
macro_rules! sleeper {
    ($name:ident, $secs:expr, $action:expr) => {
        #[derive(Default)]
        struct $name;

        #[async_trait]
        impl Node for $name {
            async fn dispatch(&self, _prep: &Value, _params: &Params) -> Result<Value, NodeError> {
                sleep(secs($secs)).await;
                Ok(Value::from($action))
            }

            async fn postlude(
                &self,
                ctx: &SharedContext,
                _prep: &Value,
                exec: Value,
                _params: &Params,
            ) -> Result<Outcome, NodeError> {
                bump(ctx, "finished").await;
                Ok(exec.as_str().map(Action::from))
            }
        }
    };
}

sleeper!(Slow, 3, "slow");
sleeper!(Fast, 1, "fast");
sleeper!(Slower, 4, "slower");

#[derive(Default)]
struct FastFailure;

#[async_trait]
impl Node for FastFailure {
    async fn dispatch(&self, _prep: &Value, _params: &Params) -> Result<Value, NodeError> {
        sleep(secs(1)).await;
        Err(NodeError::failed("lost the connection"))
    }
}

#[derive(Default)]
struct SlowFailure;

#[async_trait]
impl Node for SlowFailure {
    async fn dispatch(&self, _prep: &Value, _params: &Params) -> Result<Value, NodeError> {
        sleep(secs(3)).await;
        Err(NodeError::failed("too late to matter"))
    }
}

#[derive(Default)]
struct Entry {
    activations: AtomicUsize,
}

#[async_trait]
impl Node for Entry {
    async fn prelude(&self, _ctx: &SharedContext, _params: &Params) -> Result<Value, NodeError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

/// Returns `again` until the race has been won `rounds` times.
#[derive(Default)]
struct Rounds;

#[async_trait]
impl Node for Rounds {
    fn component(&self) -> Option<&str> {
        Some("race")
    }

    fn postlude_params(&self) -> ParamSchema {
        ParamSchema::new().require("rounds")
    }

    async fn postlude(
        &self,
        ctx: &SharedContext,
        _prep: &Value,
        _exec: Value,
        params: &Params,
    ) -> Result<Outcome, NodeError> {
        let rounds = params.require_i64("rounds")?;
        if count(ctx, "finished").await >= rounds {
            Ok(Some(Action::from("finish")))
        } else {
            Ok(Some(Action::from("again")))
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_completion_wins() {
    let runtime = FlowRuntime::new();
    let race = runtime.parallel([runtime.step::<Slow>(), runtime.step::<Fast>()]);
    let race = Arc::new(race);
    let step: StepRef = race.clone();
    let mut flow = runtime.flow("race");
    flow.set_start(&step);
    assert_eq!(race.state(), RaceState::Idle);

    let started = Instant::now();
    let outcome = flow.run(&SharedContext::default()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, Some(Action::from("fast")));
    assert!(elapsed >= secs(1), "took {:?}", elapsed);
    assert!(elapsed < secs(2), "took {:?}", elapsed);
    assert_eq!(race.state(), RaceState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_winning_failure_propagates() {
    let runtime = FlowRuntime::new();
    let race = runtime
        .parallel([runtime.step::<Slow>(), runtime.step::<FastFailure>()])
        .into_step();
    let mut flow = runtime.flow("race");
    flow.set_start(&race);

    let err = flow.run(&SharedContext::default()).await.unwrap_err();

    match err {
        FlowError::Dispatch { step, source, .. } => {
            assert_eq!(step, "FastFailure");
            assert_eq!(source, NodeError::failed("lost the connection"));
        }
        other => panic!("expected the winner's dispatch failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_losing_failure_is_ignored() {
    let runtime = FlowRuntime::new();
    let race = runtime
        .parallel([runtime.step::<SlowFailure>(), runtime.step::<Fast>()])
        .with_stragglers(StragglerPolicy::Detach)
        .into_step();
    let mut flow = runtime.flow("race");
    flow.set_start(&race);

    let outcome = flow.run(&SharedContext::default()).await.unwrap();
    sleep(secs(5)).await;

    assert_eq!(outcome, Some(Action::from("fast")));
}

#[tokio::test(start_paused = true)]
async fn test_abort_policy_stops_stragglers() {
    let runtime = FlowRuntime::new();
    let race = runtime
        .parallel([runtime.step::<Slow>(), runtime.step::<Fast>()])
        .with_stragglers(StragglerPolicy::Abort)
        .into_step();
    let mut flow = runtime.flow("race");
    flow.set_start(&race);
    let ctx = SharedContext::default();

    flow.run(&ctx).await.unwrap();
    sleep(secs(5)).await;

    assert_eq!(count(&ctx, "finished").await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_detach_policy_lets_stragglers_write_shared_context() {
    let runtime = FlowRuntime::with_config(RuntimeConfig {
        straggler_policy: StragglerPolicy::Detach,
        ..RuntimeConfig::default()
    });
    let race = runtime
        .parallel([runtime.step::<Slow>(), runtime.step::<Fast>()])
        .into_step();
    let mut flow = runtime.flow("race");
    flow.set_start(&race);
    let ctx = SharedContext::default();

    let outcome = flow.run(&ctx).await.unwrap();
    assert_eq!(outcome, Some(Action::from("fast")));
    assert_eq!(count(&ctx, "finished").await, 1);

    sleep(secs(5)).await;

    assert_eq!(count(&ctx, "finished").await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_abort_reaches_tasks_of_a_losing_nested_race() {
    let runtime = FlowRuntime::new();
    let inner = Arc::new(
        runtime
            .parallel([runtime.step::<Slow>(), runtime.step::<Slower>()])
            .named("inner"),
    );
    let inner_step: StepRef = inner.clone();
    let outer = runtime
        .parallel([runtime.step::<Fast>(), inner_step])
        .named("outer")
        .into_step();
    let mut flow = runtime.flow("nested-abort");
    flow.set_start(&outer);
    let ctx = SharedContext::default();

    let outcome = flow.run(&ctx).await.unwrap();
    sleep(secs(10)).await;

    assert_eq!(outcome, Some(Action::from("fast")));
    assert_eq!(count(&ctx, "finished").await, 1);
    assert_eq!(inner.state(), RaceState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_race_tasks_report_their_own_state() {
    let runtime = FlowRuntime::new();
    let race = runtime
        .parallel([runtime.step::<Slow>(), runtime.step::<Fast>()])
        .into_step();
    let mut flow = runtime.flow("race-state");
    flow.set_start(&race);
    let ctx = SharedContext::default();

    flow.run(&ctx).await.unwrap();

    let state = ctx.state().await;
    assert!(
        matches!(state.as_deref(), Some("Slow") | Some("Fast")),
        "state after race: {:?}",
        state
    );
}

#[tokio::test(start_paused = true)]
async fn test_race_is_reused_across_loop_iterations() {
    let runtime = FlowRuntime::new();
    let entry = runtime.step::<Entry>();
    let rounds = runtime.step::<Rounds>();
    let race = Arc::new(runtime.parallel([runtime.step::<Slow>(), runtime.step::<Fast>()]));
    let race_step: StepRef = race.clone();

    let mut flow = runtime.flow("looping-race");
    flow.set_start(&entry).then(&race_step).then(&rounds);
    flow.connect_on_action(&rounds, "again", &entry);
    let ctx = SharedContext::from(
        ContextData::default().with_component("race", Component::default().with_config("rounds", 3)),
    );

    let outcome = flow.run(&ctx).await.unwrap();

    assert_eq!(outcome, Some(Action::from("finish")));
    assert_eq!(runtime.node::<Entry>().activations.load(Ordering::SeqCst), 3);
    assert_eq!(race.tasks().len(), 2);
    assert_eq!(race.state(), RaceState::Completed);
    assert_eq!(ctx.state().await.as_deref(), Some("Rounds"));
}

#[tokio::test(start_paused = true)]
async fn test_nested_flow_can_win_a_race() {
    let runtime = FlowRuntime::new();
    let mut quick = runtime.flow("quick");
    quick.set_start(&runtime.step::<Entry>()).then(&runtime.step::<Fast>());
    let race = runtime
        .parallel([runtime.step::<Slow>(), quick.into_step()])
        .named("flow-vs-node")
        .into_step();
    let mut events = runtime.subscribe_events();
    let mut flow = runtime.flow("outer");
    flow.set_start(&race);

    let outcome = flow.run(&SharedContext::default()).await.unwrap();

    assert_eq!(outcome, Some(Action::from("fast")));
    let decided = std::iter::from_fn(|| events.try_recv().ok()).find_map(|e| match e {
        ExecutionEvent::RaceDecided { step, winner_index, winner, .. } => {
            Some((step, winner_index, winner))
        }
        _ => None,
    });
    assert_eq!(
        decided,
        Some(("flow-vs-node".to_string(), 1, "quick".to_string()))
    );
}

#[tokio::test]
async fn test_empty_race_is_rejected() {
    let runtime = FlowRuntime::new();
    let race = ParallelStep::new(Vec::<StepRef>::new()).named("nothing").into_step();
    let mut flow = runtime.flow("empty-race");
    flow.set_start(&race);

    let err = flow.run(&SharedContext::default()).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::EmptyRace(ref name)) if name == "nothing"
    ));
}
