use async_trait::async_trait;
use relaycore::{Action, Node, NodeError, Outcome, ParamSchema, Params, SharedContext, Value};

/// Field of the component that counts completed iterations
pub const ITERATIONS_FIELD: &str = "iterations";

/// Loop guard - controlled iteration over a back-edge.
///
/// Each activation reads the `iterations` field of its component. Below the
/// `max_iterations` parameter it increments the field and yields `again`;
/// once the limit is reached it yields `finish`. The back-edge itself must
/// be wired in the flow, e.g. `flow.connect_on_action(&guard, "again", &body)`.
#[derive(Debug)]
pub struct LoopGuard {
    component: String,
}

impl LoopGuard {
    pub const AGAIN: &'static str = "again";
    pub const FINISH: &'static str = "finish";

    pub fn for_component(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::for_component("loop")
    }
}

#[async_trait]
impl Node for LoopGuard {
    fn component(&self) -> Option<&str> {
        Some(&self.component)
    }

    fn postlude_params(&self) -> ParamSchema {
        ParamSchema::new().require("max_iterations")
    }

    async fn postlude(
        &self,
        ctx: &SharedContext,
        _prep: &Value,
        _exec: Value,
        params: &Params,
    ) -> Result<Outcome, NodeError> {
        let max = params.require_i64("max_iterations")?;

        let mut data = ctx.write().await;
        let fields = &mut data.component_mut(&self.component).fields;
        let done = match fields.get(ITERATIONS_FIELD) {
            None => 0,
            Some(value) => value.as_i64().ok_or_else(|| NodeError::InvalidParam {
                field: ITERATIONS_FIELD.to_string(),
                expected: "integer".to_string(),
                actual: value.kind().to_string(),
            })?,
        };

        if done >= max {
            tracing::debug!("Loop over '{}' finished after {} iterations", self.component, done);
            return Ok(Some(Action::from(Self::FINISH)));
        }
        fields.insert(ITERATIONS_FIELD.to_string(), Value::from(done + 1));
        Ok(Some(Action::from(Self::AGAIN)))
    }
}
