//! Core abstractions for the relay workflow engine
//!
//! This crate provides the shared context, the configuration resolver, the
//! node lifecycle contract and the error types that the runtime builds on.
//! It does no scheduling of its own.

mod context;
mod error;
pub mod events;
mod node;
mod params;
mod retry;
mod value;

pub use context::{Component, ContextData, SharedContext};
pub use error::{FlowError, NodeError, WorkflowError};
pub use events::{EventBus, EventEmitter, ExecutionEvent, ExecutionId};
pub use node::{short_type_name, Action, Node, Outcome};
pub use params::{ConfigResolver, ParamSchema, Params, Phase};
pub use retry::RetryPolicy;
pub use value::Value;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
