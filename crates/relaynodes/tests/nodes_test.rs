// crates/relaynodes/tests/nodes_test.rs

use relaycore::{Action, Component, ContextData, FlowError, NodeError, SharedContext, Value};
use relaynodes::{catalog, register_all, DelayNode, LogNode, LoopGuard};
use relayruntime::{run_node, FlowRuntime, NodeRegistry};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn test_log_node_passes_message_through() {
    let ctx = SharedContext::from(ContextData::default().with_config("message", "hello"));

    let outcome = run_node(&LogNode, &ctx).await.unwrap();

    assert_eq!(outcome, None);
}

#[tokio::test]
async fn test_log_node_message_is_optional() {
    let runtime = FlowRuntime::new();
    let log = runtime.step::<LogNode>();
    let mut flow = runtime.flow("log");
    flow.set_start(&log);
    let ctx = SharedContext::default();

    flow.run(&ctx).await.unwrap();

    assert_eq!(ctx.state().await.as_deref(), Some("LogNode"));
}

#[tokio::test(start_paused = true)]
async fn test_delay_node_sleeps_for_configured_duration() {
    let node = DelayNode::for_component("timer");
    let ctx = SharedContext::from(
        ContextData::default()
            .with_config("delay_ms", 10)
            .with_component("timer", Component::default().with_config("delay_ms", 250)),
    );

    let started = Instant::now();
    run_node(&node, &ctx).await.unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(250), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(300), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_delay_node_requires_delay() {
    let err = run_node(&DelayNode::default(), &SharedContext::default())
        .await
        .unwrap_err();

    match err {
        FlowError::Binding { step, source } => {
            assert_eq!(step, "DelayNode");
            assert!(matches!(source, NodeError::MissingParam { ref name, .. } if name == "delay_ms"));
        }
        other => panic!("expected a binding failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delay_node_rejects_negative_delay() {
    let ctx = SharedContext::from(ContextData::default().with_config("delay_ms", -5));

    let err = run_node(&DelayNode::default(), &ctx).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Dispatch { source: NodeError::Configuration(_), .. }
    ));
}

#[tokio::test]
async fn test_loop_guard_counts_up_to_limit() {
    let guard = LoopGuard::default();
    let ctx = SharedContext::from(
        ContextData::default()
            .with_component("loop", Component::default().with_config("max_iterations", 2)),
    );

    let mut actions = Vec::new();
    for _ in 0..3 {
        actions.push(run_node(&guard, &ctx).await.unwrap());
    }

    assert_eq!(
        actions,
        vec![
            Some(Action::from(LoopGuard::AGAIN)),
            Some(Action::from(LoopGuard::AGAIN)),
            Some(Action::from(LoopGuard::FINISH)),
        ]
    );
    assert_eq!(
        ctx.component_field("loop", "iterations").await,
        Some(Value::from(2))
    );
}

#[tokio::test]
async fn test_loop_guard_rejects_non_integer_counter() {
    let guard = LoopGuard::for_component("retry-loop");
    let ctx = SharedContext::from(ContextData::default().with_component(
        "retry-loop",
        Component::default()
            .with_config("max_iterations", 3)
            .with_field("iterations", "three"),
    ));

    let err = run_node(&guard, &ctx).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Phase { source: NodeError::InvalidParam { ref field, .. }, .. } if field == "iterations"
    ));
}

#[tokio::test]
async fn test_loop_guard_drives_a_back_edge() {
    let runtime = FlowRuntime::new();
    let log = runtime.step::<LogNode>();
    let guard = runtime.step::<LoopGuard>();
    let mut flow = runtime.flow("loop");
    flow.set_start(&log).then(&guard);
    flow.connect_on_action(&guard, LoopGuard::AGAIN, &log);
    let ctx = SharedContext::from(
        ContextData::default()
            .with_component("loop", Component::default().with_config("max_iterations", 4)),
    );

    let outcome = flow.run(&ctx).await.unwrap();

    assert_eq!(outcome, Some(Action::from(LoopGuard::FINISH)));
    assert_eq!(
        ctx.component_field("loop", "iterations").await,
        Some(Value::from(4))
    );
    assert_eq!(ctx.state().await.as_deref(), Some("LoopGuard"));
}

#[test]
fn test_register_all_and_catalog_agree() {
    let registry = NodeRegistry::new();
    register_all(&registry);

    let mut listed: Vec<String> = catalog().into_iter().map(|info| info.name).collect();
    listed.sort();

    assert_eq!(registry.names(), listed);
    assert_eq!(listed, vec!["DelayNode", "LogNode", "LoopGuard"]);
}
