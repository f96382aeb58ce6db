//! Error Types
//!
//! Every failure the engine reports is a contract violation by the code that
//! built the graph, such as a cycle or a missing input. None of them are
//! retried or suppressed internally: the operation that hit the fault stops
//! and the error surfaces to its caller.

use std::fmt;

use thiserror::Error;

use crate::binding::BindingId;
use crate::graph::NodeId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Which check of the topological sort found the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    /// Nodes with outputs exist but no node is a leaf.
    NoLeaves,
    /// A node's pending output count went below zero while draining.
    NegativeOutputCount,
    /// Some nodes were never reached from the leaves.
    UnreachableNodes,
}

impl fmt::Display for CycleTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CycleTrigger::NoLeaves => "no leaf nodes to start from",
            CycleTrigger::NegativeOutputCount => "output count went negative",
            CycleTrigger::UnreachableNodes => "nodes unreachable from the leaves",
        };
        f.write_str(text)
    }
}

/// Errors raised by the dataflow graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {node} has no input named '{name}'")]
    MissingInput { node: NodeId, name: String },

    #[error("node {node} has {count} inputs, the default input is ambiguous")]
    AmbiguousInput { node: NodeId, count: usize },

    #[error("node {node} was computed twice for frame {frame_time}")]
    DoubleComputeInSameFrame { node: NodeId, frame_time: i64 },

    #[error("binding {0} has already been activated")]
    BindingAlreadyActivated(BindingId),

    #[error("binding {0} already has a finish listener")]
    ListenerAlreadySet(BindingId),

    #[error("binding {0} was registered while inactive")]
    InactiveBindingRegistered(BindingId),

    #[error("binding {0} is not registered with this graph")]
    UnknownBindingUnregistered(BindingId),

    #[error("cycle detected in the node graph: {0}")]
    CycleDetected(CycleTrigger),

    #[error("{remaining} node states leaked after the last binding was removed")]
    LeakedNodeState { remaining: usize },

    #[error("broken graph invariant: {0}")]
    BrokenInvariant(String),

    #[error("node {0} does not exist in this graph")]
    UnknownNode(NodeId),

    #[error("node {0} is still referenced by a binding")]
    NodeInUse(NodeId),
}

/// Errors raised while loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
