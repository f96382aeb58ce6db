//! Graph Snapshots
//!
//! A snapshot is a detached copy of the scheduler's bookkeeping, taken under
//! the graph lock. It is meant for debugging tools and tests.

use serde::Serialize;

use crate::binding::BindingId;

use super::node::NodeId;

/// Point-in-time view of a graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    /// Frames evaluated so far.
    pub frame_count: u64,

    /// Active bindings in registration order.
    pub bindings: Vec<BindingId>,

    /// Cached evaluation order.
    pub sorted_nodes: Vec<NodeId>,

    /// Whether the order is stale and will be rebuilt on the next tick.
    pub dirty: bool,

    /// Live nodes, ordered by handle.
    pub nodes: Vec<NodeSnapshot>,
}

/// State of one live node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: &'static str,
    pub value: f32,
    pub ref_count: u32,
    pub finished: bool,
    pub inputs: Vec<(String, NodeId)>,
}

impl GraphSnapshot {
    /// Look up a live node.
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Render the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
