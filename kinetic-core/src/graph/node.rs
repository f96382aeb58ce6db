//! Graph Nodes
//!
//! This module defines the node type stored in the graph arena and the
//! traits node variants implement.
//!
//! A [`Node`] is the bookkeeping half of a computation unit: its current
//! value, the frame it was last computed for, its named inputs and the list
//! of nodes consuming it. The behavior half is a boxed [`ValueNode`] that
//! turns input values into a new value once per frame.

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{GraphError, Result};

use super::arena::ComputeContext;

/// Name of the input used by single-input nodes.
pub const DEFAULT_INPUT: &str = "default";

/// Name of an input slot on a node.
pub type InputName = Cow<'static, str>;

/// Handle to a node in a graph arena.
///
/// Handles are generational: once a node is destroyed its slot may be
/// reused, but the stale handle keeps the old generation and no longer
/// resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Capability of a node to decide when it stops producing new values.
///
/// Nodes without this capability are finished as soon as all of their
/// inputs are finished.
pub trait Finishable {
    /// Whether the node will produce no further new values.
    fn is_finished(&self) -> bool;

    /// Called once, on the first frame all of the node's inputs are finished.
    fn on_inputs_finished(&mut self);
}

/// Per-frame behavior of a node variant.
pub trait ValueNode: Send {
    /// Short name of the variant, used in snapshots and debug output.
    fn kind(&self) -> &'static str;

    /// Compute the node's value for `cx.frame_time()`.
    ///
    /// Reads only the node's inputs through `cx`.
    fn compute(&mut self, cx: &ComputeContext<'_>) -> Result<f32>;

    /// The node's finish capability, if it has one.
    fn as_finishable(&mut self) -> Option<&mut dyn Finishable> {
        None
    }
}

/// A node living in the graph arena.
pub struct Node {
    /// Handle of this node.
    id: NodeId,

    /// Variant behavior. Only `None` while the node is computing.
    behavior: Option<Box<dyn ValueNode>>,

    /// Value produced by the last compute.
    value: f32,

    /// Frame timestamp (ns) of the last compute.
    last_computed_frame: Option<i64>,

    /// Producers feeding this node, by input name.
    inputs: IndexMap<InputName, NodeId>,

    /// Consumers of this node. One entry per bound edge.
    outputs: SmallVec<[NodeId; 4]>,

    /// Number of bindings (pending or active) that mention this node.
    holds: u32,
}

impl Node {
    pub(crate) fn new(id: NodeId, behavior: Box<dyn ValueNode>) -> Self {
        Self {
            id,
            behavior: Some(behavior),
            value: 0.0,
            last_computed_frame: None,
            inputs: IndexMap::new(),
            outputs: SmallVec::new(),
            holds: 0,
        }
    }

    /// Get the node's handle.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Variant name, or `"computing"` while the behavior is checked out.
    pub fn kind(&self) -> &'static str {
        self.behavior.as_ref().map_or("computing", |b| b.kind())
    }

    /// Value produced by the last compute (0 before the first one).
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Frame timestamp of the last compute.
    pub fn last_computed_frame(&self) -> Option<i64> {
        self.last_computed_frame
    }

    /// Look up the producer bound to the named input.
    pub fn input(&self, name: &str) -> Result<NodeId> {
        self.inputs
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::MissingInput {
                node: self.id,
                name: name.to_string(),
            })
    }

    /// Producer bound to the default input.
    ///
    /// Fails with `AmbiguousInput` when the node has more than one input.
    pub fn default_input(&self) -> Result<NodeId> {
        if self.inputs.len() > 1 {
            return Err(GraphError::AmbiguousInput {
                node: self.id,
                count: self.inputs.len(),
            });
        }
        self.input(DEFAULT_INPUT)
    }

    /// Iterate over all inputs.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.inputs.iter().map(|(name, id)| (name.as_ref(), *id))
    }

    /// Number of bound inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Consumers of this node.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Bind `node` to the named input, returning the producer it replaced.
    pub(crate) fn set_input(&mut self, name: InputName, node: NodeId) -> Option<NodeId> {
        self.inputs.insert(name, node)
    }

    pub(crate) fn remove_input(&mut self, name: &str) -> Option<NodeId> {
        self.inputs.shift_remove(name)
    }

    pub(crate) fn add_output(&mut self, node: NodeId) {
        self.outputs.push(node);
    }

    /// Remove one output entry for `node`.
    ///
    /// A missing entry means the graph's edge bookkeeping is corrupt.
    pub(crate) fn remove_output(&mut self, node: NodeId) -> Result<()> {
        match self.outputs.iter().position(|&out| out == node) {
            Some(pos) => {
                self.outputs.remove(pos);
                Ok(())
            }
            None => Err(GraphError::BrokenInvariant(format!(
                "node {} has no output to {}",
                self.id, node
            ))),
        }
    }

    pub(crate) fn has_edges(&self) -> bool {
        !self.inputs.is_empty() || !self.outputs.is_empty()
    }

    pub(crate) fn holds(&self) -> u32 {
        self.holds
    }

    pub(crate) fn hold(&mut self) {
        self.holds += 1;
    }

    /// Drop one hold, returning the remaining count.
    pub(crate) fn release(&mut self) -> Result<u32> {
        self.holds = self.holds.checked_sub(1).ok_or_else(|| {
            GraphError::BrokenInvariant(format!("node {} released more often than held", self.id))
        })?;
        Ok(self.holds)
    }

    pub(crate) fn take_behavior(&mut self) -> Result<Box<dyn ValueNode>> {
        self.behavior.take().ok_or_else(|| {
            GraphError::BrokenInvariant(format!("node {} re-entered while computing", self.id))
        })
    }

    pub(crate) fn restore_behavior(&mut self, behavior: Box<dyn ValueNode>) {
        self.behavior = Some(behavior);
    }

    pub(crate) fn behavior_mut(&mut self) -> Option<&mut (dyn ValueNode + 'static)> {
        self.behavior.as_deref_mut()
    }

    pub(crate) fn store(&mut self, value: f32, frame_time: i64) {
        self.value = value;
        self.last_computed_frame = Some(frame_time);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("value", &self.value)
            .field("last_computed_frame", &self.last_computed_frame)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
