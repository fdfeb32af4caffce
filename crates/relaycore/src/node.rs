use crate::{NodeError, ParamSchema, Params, RetryPolicy, SharedContext, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// String emitted by an activation to pick the next transition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    pub fn new(action: impl Into<String>) -> Self {
        Self(action.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Action {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Action {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Result of one activation; `None` follows the default transition
pub type Outcome = Option<Action>;

/// A unit of work with a prelude, a retried dispatch and a postlude
///
/// Each implementing type is one node variant. The runtime keeps a single
/// instance per variant, so any per-node state lives behind interior
/// mutability and is shared by every reference to the variant.
#[async_trait]
pub trait Node: Send + Sync + 'static {
    /// Identity reported in `SharedContext::state`
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Component whose config overlays the general config for this node
    fn component(&self) -> Option<&str> {
        None
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::none()
    }

    fn prelude_params(&self) -> ParamSchema {
        ParamSchema::new()
    }

    fn dispatch_params(&self) -> ParamSchema {
        ParamSchema::new()
    }

    fn postlude_params(&self) -> ParamSchema {
        ParamSchema::new()
    }

    async fn prelude(&self, _ctx: &SharedContext, _params: &Params) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    /// Core logic. Re-invoked from scratch on each retry.
    async fn dispatch(&self, prep: &Value, _params: &Params) -> Result<Value, NodeError> {
        Ok(prep.clone())
    }

    async fn postlude(
        &self,
        _ctx: &SharedContext,
        _prep: &Value,
        _exec: Value,
        _params: &Params,
    ) -> Result<Outcome, NodeError> {
        Ok(None)
    }

    /// Called once the retry schedule is exhausted. Returning `Ok` recovers
    /// the activation with that value as the dispatch result.
    async fn dispatch_fallback(&self, _prep: &Value, error: NodeError) -> Result<Value, NodeError> {
        Err(error)
    }
}

/// Strip module paths from a type name, keeping generic arguments intact.
///
/// `my_crate::nodes::Fetch<u8>` becomes `Fetch<u8>`.
pub fn short_type_name(full: &str) -> &str {
    let base_end = full.find('<').unwrap_or(full.len());
    let start = full[..base_end].rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}
