//! Workflow execution runtime
//!
//! This crate keeps the singleton node instances, runs their lifecycle with
//! retry, drives flows over the transition graph and races concurrent
//! sub-flows.

mod flow;
mod lifecycle;
mod parallel;
mod registry;
mod runtime;
mod step;

pub use flow::{Connector, Flow, Transition};
pub use lifecycle::{activate, run_node};
pub use parallel::{ParallelStep, RaceState, StragglerPolicy};
pub use registry::NodeRegistry;
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use step::{NodeStep, Step, StepId, StepRef};
