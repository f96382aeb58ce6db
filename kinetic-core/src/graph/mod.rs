//! Dataflow Graph
//!
//! This module implements the frame-driven value graph that evaluates every
//! active animation once per display frame.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes hold one `f32` value, recomputed every frame from named inputs
//! - Edges run from a producer to the input slot of a consumer
//!
//! Nodes only take part in a frame while at least one active
//! [`Binding`](crate::binding::Binding) mentions them. The graph keeps a
//! reference count per live node, so bindings can share nodes and come and
//! go independently.
//!
//! # Frame Evaluation
//!
//! Each tick:
//!
//! 1. Rebuilds the topological order if edges changed since the last tick
//! 2. Computes every node exactly once, producers before consumers
//! 3. Marks nodes whose inputs (and own finish predicate) are done
//! 4. Deactivates every binding whose nodes are all finished and runs its
//!    listener
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena addressed by generational handles. Edges are
//!    adjacency lists keyed by handle, so there are no ownership cycles.
//!
//! 2. One mutex guards the whole graph state, arena included.
//!
//! 3. Finish listeners run after the lock is released and may call back into
//!    the graph.

mod arena;
mod node;
mod scheduler;
mod snapshot;
mod sort;

pub use arena::ComputeContext;
pub use node::{Finishable, InputName, Node, NodeId, ValueNode, DEFAULT_INPUT};
pub use scheduler::Graph;
pub use snapshot::{GraphSnapshot, NodeSnapshot};

#[cfg(test)]
pub(crate) use arena::NodeArena;
pub(crate) use scheduler::{BindingRecord, GraphState};
