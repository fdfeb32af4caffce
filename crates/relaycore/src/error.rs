use crate::params::Phase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Binding error in {step}: {source}")]
    Binding {
        step: String,
        #[source]
        source: NodeError,
    },

    #[error("Dispatch of {step} failed after {attempts} attempt(s): {source}")]
    Dispatch {
        step: String,
        attempts: usize,
        #[source]
        source: NodeError,
    },

    #[error("{phase} of {step} failed: {source}")]
    Phase {
        step: String,
        phase: Phase,
        #[source]
        source: NodeError,
    },

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// The user-level error underneath a lifecycle failure, if any.
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            FlowError::Binding { source, .. }
            | FlowError::Dispatch { source, .. }
            | FlowError::Phase { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required parameter '{name}' for {phase}")]
    MissingParam { phase: Phase, name: String },

    #[error("Invalid parameter type for '{field}': expected {expected}, got {actual}")]
    InvalidParam {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Failed(String),
}

impl NodeError {
    pub fn failed(message: impl Into<String>) -> Self {
        NodeError::Failed(message.into())
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Flow '{0}' has no start step")]
    NoStart(String),

    #[error("Race step '{0}' has no tasks")]
    EmptyRace(String),

    #[error("Node already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Step not found: {0}")]
    UnknownStep(String),
}
