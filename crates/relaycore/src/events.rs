use crate::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted while a flow runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: ExecutionId,
        flow: String,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        execution_id: ExecutionId,
        flow: String,
        success: bool,
        action: Option<Action>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        execution_id: ExecutionId,
        step: String,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        execution_id: ExecutionId,
        step: String,
        action: Option<Action>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        execution_id: ExecutionId,
        step: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RetryScheduled {
        execution_id: ExecutionId,
        step: String,
        attempt: usize,
        wait_ms: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RaceDecided {
        execution_id: ExecutionId,
        step: String,
        winner_index: usize,
        winner: String,
        timestamp: DateTime<Utc>,
    },
}

/// Emitter bound to one execution, handed down through nested steps
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(execution_id: ExecutionId, sender: broadcast::Sender<ExecutionEvent>) -> Self {
        Self {
            execution_id,
            sender,
        }
    }

    /// An emitter nobody listens to.
    pub fn detached() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self::new(ExecutionId::new_v4(), sender)
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn step_started(&self, step: &str) {
        self.emit(ExecutionEvent::StepStarted {
            execution_id: self.execution_id,
            step: step.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_completed(&self, step: &str, action: Option<&Action>, duration: Duration) {
        self.emit(ExecutionEvent::StepCompleted {
            execution_id: self.execution_id,
            step: step.to_string(),
            action: action.cloned(),
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    pub fn step_failed(&self, step: &str, error: impl ToString) {
        self.emit(ExecutionEvent::StepFailed {
            execution_id: self.execution_id,
            step: step.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn retry_scheduled(&self, step: &str, attempt: usize, wait: Duration, error: impl ToString) {
        self.emit(ExecutionEvent::RetryScheduled {
            execution_id: self.execution_id,
            step: step.to_string(),
            attempt,
            wait_ms: wait.as_millis() as u64,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn race_decided(&self, step: &str, winner_index: usize, winner: &str) {
        self.emit(ExecutionEvent::RaceDecided {
            execution_id: self.execution_id,
            step: step.to_string(),
            winner_index,
            winner: winner.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Broadcast bus for execution events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, execution_id: ExecutionId) -> EventEmitter {
        EventEmitter::new(execution_id, self.sender.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
