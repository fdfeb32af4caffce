//! Standard node library
//!
//! Collection of built-in nodes for common flow plumbing

mod debug;
mod loop_guard;
mod time;

pub use debug::LogNode;
pub use loop_guard::LoopGuard;
pub use time::DelayNode;
use relaycore::Node;
use relayruntime::NodeRegistry;

/// Catalog entry for a built-in node
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub description: String,
    pub category: String,
}

impl NodeInfo {
    fn of(node: &dyn Node, category: &str, description: &str) -> Self {
        Self {
            name: node.name().to_string(),
            description: description.to_string(),
            category: category.to_string(),
        }
    }
}

/// Construct the default instance of every built-in node in `registry`
pub fn register_all(registry: &NodeRegistry) {
    registry.get::<LogNode>();
    registry.get::<DelayNode>();
    registry.get::<LoopGuard>();
}

/// Descriptions of the built-in nodes
pub fn catalog() -> Vec<NodeInfo> {
    vec![
        NodeInfo::of(
            &LogNode,
            "debug",
            "Logs its `message` parameter and the current context state",
        ),
        NodeInfo::of(
            &DelayNode::default(),
            "time",
            "Sleeps for `delay_ms` milliseconds during dispatch",
        ),
        NodeInfo::of(
            &LoopGuard::default(),
            "flow",
            "Returns `again` until `iterations` reaches `max_iterations`, then `finish`",
        ),
    ]
}
