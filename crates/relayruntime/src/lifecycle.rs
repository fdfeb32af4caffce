use relaycore::{
    ConfigResolver, EventEmitter, FlowError, Node, Outcome, ParamSchema, Params, Phase,
    SharedContext, Value,
};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Run one full activation of `node`: prelude, dispatch with retry, postlude
///
/// The node's name is written to the context state first, whether the
/// activation comes from a flow, a race or [`run_node`]. Parameters are
/// resolved separately before each phase, so changes an earlier phase makes
/// to the context are visible to the later ones.
pub async fn activate(
    node: &dyn Node,
    ctx: &SharedContext,
    events: &EventEmitter,
) -> Result<Outcome, FlowError> {
    let name = node.name();
    ctx.set_state(name).await;

    let params = bind(node, ctx, &node.prelude_params(), Phase::Prelude).await?;
    let prep = node
        .prelude(ctx, &params)
        .await
        .map_err(|source| FlowError::Phase {
            step: name.to_string(),
            phase: Phase::Prelude,
            source,
        })?;

    let params = bind(node, ctx, &node.dispatch_params(), Phase::Dispatch).await?;
    let exec = dispatch_with_retry(node, &prep, &params, events).await?;

    let params = bind(node, ctx, &node.postlude_params(), Phase::Postlude).await?;
    let action = node
        .postlude(ctx, &prep, exec, &params)
        .await
        .map_err(|source| FlowError::Phase {
            step: name.to_string(),
            phase: Phase::Postlude,
            source,
        })?;

    debug!("Node {} yielded action {:?}", name, action);
    Ok(action)
}

/// Activate a node outside any flow; transitions are not consulted
pub async fn run_node(node: &dyn Node, ctx: &SharedContext) -> Result<Outcome, FlowError> {
    activate(node, ctx, &EventEmitter::detached()).await
}

async fn bind(
    node: &dyn Node,
    ctx: &SharedContext,
    schema: &ParamSchema,
    phase: Phase,
) -> Result<Params, FlowError> {
    ConfigResolver::resolve(ctx, node.component(), schema, phase)
        .await
        .map_err(|source| FlowError::Binding {
            step: node.name().to_string(),
            source,
        })
}

async fn dispatch_with_retry(
    node: &dyn Node,
    prep: &Value,
    params: &Params,
    events: &EventEmitter,
) -> Result<Value, FlowError> {
    let name = node.name();
    let policy = node.retry_policy();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let error = match node.dispatch(prep, params).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        match policy.wait_after(attempts) {
            Some(wait) => {
                warn!(
                    "Dispatch of {} failed (attempt {}/{}), retrying in {:?}: {}",
                    name,
                    attempts,
                    policy.max_attempts(),
                    wait,
                    error
                );
                events.retry_scheduled(name, attempts, wait, &error);
                sleep(wait).await;
            }
            None => {
                return node
                    .dispatch_fallback(prep, error)
                    .await
                    .map_err(|source| FlowError::Dispatch {
                        step: name.to_string(),
                        attempts,
                        source,
                    });
            }
        }
    }
}
