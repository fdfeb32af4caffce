use async_trait::async_trait;
use relaycore::{Node, NodeError, ParamSchema, Params, SharedContext, Value};

/// Simple debug node that logs its message and the flow state
#[derive(Debug, Default)]
pub struct LogNode;

#[async_trait]
impl Node for LogNode {
    fn prelude_params(&self) -> ParamSchema {
        ParamSchema::new().optional("message")
    }

    async fn prelude(&self, ctx: &SharedContext, params: &Params) -> Result<Value, NodeError> {
        let message = params
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)")
            .to_string();

        let data = ctx.read().await;
        tracing::info!(
            "DEBUG: {} (state: {})",
            message,
            data.state.as_deref().unwrap_or("-")
        );
        for (id, component) in &data.components {
            tracing::debug!("  component {}: {:?}", id, component.fields);
        }

        Ok(Value::from(message))
    }
}
