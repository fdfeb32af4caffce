// crates/relaycli/src/demo.rs

use async_trait::async_trait;
use relaycore::{
    Action, ConfigResolver, ContextData, Node, NodeError, Outcome, ParamSchema, Params, Phase,
    RetryPolicy, SharedContext, Value,
};
use relaynodes::{DelayNode, LogNode, LoopGuard};
use relayruntime::{Flow, FlowRuntime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Component holding the race counters
pub const RACE_COMPONENT: &str = "race";

/// A probe waits for its component's `delay_ms`, then records a win.
///
/// With `flaky` set, every other dispatch attempt fails so the retry
/// schedule gets exercised.
macro_rules! probe {
    ($name:ident, $component:expr) => {
        pub struct $name {
            delay: DelayNode,
            attempts: AtomicUsize,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    delay: DelayNode::for_component($component),
                    attempts: AtomicUsize::new(0),
                }
            }
        }

        #[async_trait]
        impl Node for $name {
            fn component(&self) -> Option<&str> {
                Some($component)
            }

            fn retry_policy(&self) -> RetryPolicy {
                RetryPolicy::fixed(2, Duration::from_millis(50))
            }

            fn dispatch_params(&self) -> ParamSchema {
                self.delay.dispatch_params().optional("flaky")
            }

            async fn dispatch(&self, prep: &Value, params: &Params) -> Result<Value, NodeError> {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                let flaky = params.get("flaky").and_then(|v| v.as_bool()).unwrap_or(false);
                if flaky && attempt % 2 == 0 {
                    return Err(NodeError::failed(format!("{} flaked", $component)));
                }
                self.delay.dispatch(prep, params).await
            }

            async fn postlude(
                &self,
                ctx: &SharedContext,
                _prep: &Value,
                _exec: Value,
                _params: &Params,
            ) -> Result<Outcome, NodeError> {
                let key = format!("{}_finished", $component);
                let done = ctx
                    .component_field(RACE_COMPONENT, &key)
                    .await
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                ctx.set_component_field(RACE_COMPONENT, &key, done + 1).await;
                Ok(Some(Action::from($component)))
            }
        }
    };
}

probe!(QuickProbe, "quick");
probe!(SlowProbe, "slow");

/// announce -> race(quick, slow) -> loop guard, looping back on `again`
pub fn build(runtime: &FlowRuntime) -> Flow {
    let announce = runtime.step::<LogNode>();
    let race = runtime
        .parallel([runtime.step::<QuickProbe>(), runtime.step::<SlowProbe>()])
        .named("probe-race")
        .into_step();
    let guard = runtime.step::<LoopGuard>();

    let mut flow = runtime.flow("demo");
    flow.set_start(&announce).then(&race).then(&guard);
    flow.connect_on_action(&guard, LoopGuard::AGAIN, &announce);
    flow
}

/// Report every required demo parameter that `data` cannot supply
pub fn check(runtime: &FlowRuntime, data: &ContextData) -> Vec<String> {
    let (announce, quick, slow, guard) = (
        runtime.node::<LogNode>(),
        runtime.node::<QuickProbe>(),
        runtime.node::<SlowProbe>(),
        runtime.node::<LoopGuard>(),
    );
    let nodes: [(&dyn Node, &str); 4] = [
        (announce.as_ref(), "announce"),
        (quick.as_ref(), "quick probe"),
        (slow.as_ref(), "slow probe"),
        (guard.as_ref(), "loop guard"),
    ];

    let mut problems = Vec::new();
    for (node, role) in nodes {
        let merged = ConfigResolver::merge(data, node.component());
        let phases = [
            (Phase::Prelude, node.prelude_params()),
            (Phase::Dispatch, node.dispatch_params()),
            (Phase::Postlude, node.postlude_params()),
        ];
        for (phase, schema) in phases {
            if let Err(err) = ConfigResolver::project(&merged, &schema, phase) {
                problems.push(format!("{} ({}): {}", role, node.name(), err));
            }
        }
    }
    problems
}

/// Context written by `relay init`
pub fn example_context() -> serde_json::Value {
    serde_json::json!({
        "config": {
            "message": "Probing both endpoints"
        },
        "components": {
            "quick": { "config": { "delay_ms": 50, "flaky": true } },
            "slow": { "config": { "delay_ms": 400 } },
            "loop": { "config": { "max_iterations": 3 }, "iterations": 0 }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> ContextData {
        serde_json::from_value(example_context()).unwrap()
    }

    #[test]
    fn example_context_satisfies_demo() {
        let runtime = FlowRuntime::new();
        assert!(check(&runtime, &example()).is_empty());
    }

    #[test]
    fn missing_limit_is_reported() {
        let runtime = FlowRuntime::new();
        let mut data = example();
        data.components.remove("loop");

        let problems = check(&runtime, &data);

        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("max_iterations"), "{:?}", problems);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_probe_wins_every_round() {
        let runtime = FlowRuntime::new();
        let flow = build(&runtime);
        let ctx = SharedContext::from(example());

        let outcome = runtime.run(&flow, &ctx).await.unwrap();

        assert_eq!(outcome, Some(Action::from(LoopGuard::FINISH)));
        assert_eq!(
            ctx.component_field(RACE_COMPONENT, "quick_finished").await,
            Some(Value::from(4))
        );
        assert_eq!(ctx.component_field(RACE_COMPONENT, "slow_finished").await, None);
    }
}
