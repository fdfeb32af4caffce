use async_trait::async_trait;
use relaycore::{Node, NodeError, ParamSchema, Params, Value};
use tokio::time::{sleep, Duration};

/// Delay execution for a configured duration
///
/// The delay comes from the `delay_ms` parameter, looked up in the node's
/// component config first when one is set.
#[derive(Debug, Default)]
pub struct DelayNode {
    component: Option<String>,
}

impl DelayNode {
    pub fn for_component(component: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
        }
    }
}

#[async_trait]
impl Node for DelayNode {
    fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    fn dispatch_params(&self) -> ParamSchema {
        ParamSchema::new().require("delay_ms")
    }

    async fn dispatch(&self, prep: &Value, params: &Params) -> Result<Value, NodeError> {
        let delay_ms = params.require_f64("delay_ms")?;
        if !delay_ms.is_finite() || delay_ms < 0.0 {
            return Err(NodeError::Configuration(format!(
                "delay_ms must be a non-negative number, got {}",
                delay_ms
            )));
        }

        tracing::debug!("Delaying for {}ms", delay_ms);
        sleep(Duration::from_millis(delay_ms as u64)).await;

        // Pass through the prelude result
        Ok(prep.clone())
    }
}
