//! Node Arena
//!
//! Nodes are stored in a slot arena and addressed by generational
//! [`NodeId`] handles. Edges are adjacency entries keyed by handle: the
//! consumer records the producer under an input name, the producer records
//! the consumer in its output list.

use crate::error::{GraphError, Result};

use super::node::{Finishable, InputName, Node, NodeId, ValueNode};

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Slot storage for every node created in a graph.
#[derive(Default)]
pub(crate) struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store a new node and return its handle.
    pub(crate) fn insert(&mut self, behavior: Box<dyn ValueNode>) -> NodeId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let id = NodeId::new(index, slot.generation);
                slot.node = Some(Node::new(id, behavior));
                id
            }
            None => {
                let index = self.slots.len() as u32;
                let id = NodeId::new(index, 0);
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(Node::new(id, behavior)),
                });
                id
            }
        };
        self.len += 1;
        id
    }

    /// Destroy a node. The slot's generation is bumped so stale handles fail.
    pub(crate) fn remove(&mut self, id: NodeId) -> Result<Node> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .ok_or(GraphError::UnknownNode(id))?;
        let node = slot.node.take().ok_or(GraphError::UnknownNode(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        Ok(node)
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
            .ok_or(GraphError::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
            .ok_or(GraphError::UnknownNode(id))
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Bind `from` to the `name` input of `to`.
    ///
    /// If the input is already bound, the previous producer loses its output
    /// entry first, so the newest edge owns the slot.
    pub(crate) fn bind(&mut self, from: NodeId, to: NodeId, name: InputName) -> Result<()> {
        self.get(from)?;
        let previous = self.get_mut(to)?.set_input(name, from);
        if let Some(previous) = previous {
            self.get_mut(previous)?.remove_output(to)?;
        }
        self.get_mut(from)?.add_output(to);
        Ok(())
    }

    /// Remove the edge `from -> to.name`, but only while it is still the
    /// live binding of that input. Returns whether an edge was removed.
    pub(crate) fn unbind_if_current(&mut self, from: NodeId, to: NodeId, name: &str) -> Result<bool> {
        let target = self.get_mut(to)?;
        if target.input(name).ok() != Some(from) {
            return Ok(false);
        }
        target.remove_input(name);
        self.get_mut(from)?.remove_output(to)?;
        Ok(true)
    }

    /// Run one node's compute for `frame_time` and store the result.
    pub(crate) fn compute(&mut self, id: NodeId, frame_time: i64) -> Result<f32> {
        let node = self.get_mut(id)?;
        if node.last_computed_frame() == Some(frame_time) {
            return Err(GraphError::DoubleComputeInSameFrame { node: id, frame_time });
        }
        let mut behavior = node.take_behavior()?;

        let result = {
            let cx = ComputeContext {
                node: self.get(id)?,
                frame_time,
                arena: self,
            };
            behavior.compute(&cx)
        };

        let node = self.get_mut(id)?;
        node.restore_behavior(behavior);
        let value = result?;
        node.store(value, frame_time);
        Ok(value)
    }

    /// The finish capability of a node, if its variant has one.
    pub(crate) fn finishable(&mut self, id: NodeId) -> Result<Option<&mut dyn Finishable>> {
        Ok(self
            .get_mut(id)?
            .behavior_mut()
            .and_then(|behavior| behavior.as_finishable()))
    }
}

/// Read access to a node's inputs while it computes.
pub struct ComputeContext<'a> {
    node: &'a Node,
    frame_time: i64,
    arena: &'a NodeArena,
}

impl<'a> ComputeContext<'a> {
    /// Handle of the node being computed.
    pub fn node(&self) -> NodeId {
        self.node.id()
    }

    /// Timestamp of the frame being computed, in nanoseconds.
    pub fn frame_time(&self) -> i64 {
        self.frame_time
    }

    /// Whether the named input is bound.
    pub fn has_input(&self, name: &str) -> bool {
        self.node.input(name).is_ok()
    }

    /// Number of bound inputs.
    pub fn input_count(&self) -> usize {
        self.node.input_count()
    }

    /// Current value of the producer bound to the named input.
    pub fn input(&self, name: &str) -> Result<f32> {
        let producer = self.node.input(name)?;
        Ok(self.arena.get(producer)?.value())
    }

    /// Current value of the default input.
    pub fn default_input(&self) -> Result<f32> {
        let producer = self.node.default_input()?;
        Ok(self.arena.get(producer)?.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DEFAULT_INPUT;
    use crate::nodes::{Constant, PassThrough};

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut arena = NodeArena::new();
        let first = arena.insert(Box::new(Constant::new(1.0)));
        arena.remove(first).unwrap();

        let second = arena.insert(Box::new(Constant::new(2.0)));
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(matches!(arena.get(first), Err(GraphError::UnknownNode(_))));
        assert!(arena.contains(second));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn bind_moves_input_to_newest_producer() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Box::new(Constant::new(1.0)));
        let b = arena.insert(Box::new(Constant::new(2.0)));
        let sink = arena.insert(Box::new(PassThrough::new()));

        arena.bind(a, sink, DEFAULT_INPUT.into()).unwrap();
        arena.bind(b, sink, DEFAULT_INPUT.into()).unwrap();

        assert!(arena.get(a).unwrap().outputs().is_empty());
        assert_eq!(arena.get(b).unwrap().outputs(), &[sink]);
        assert_eq!(arena.get(sink).unwrap().default_input(), Ok(b));

        // The superseded edge is no longer live, so it is left alone.
        assert_eq!(arena.unbind_if_current(a, sink, DEFAULT_INPUT), Ok(false));
        assert_eq!(arena.unbind_if_current(b, sink, DEFAULT_INPUT), Ok(true));
        assert!(!arena.get(sink).unwrap().has_edges());
        assert!(!arena.get(b).unwrap().has_edges());
    }

    #[test]
    fn compute_reads_inputs_and_rejects_same_frame() {
        let mut arena = NodeArena::new();
        let source = arena.insert(Box::new(Constant::new(4.0)));
        let sink = arena.insert(Box::new(PassThrough::new()));
        arena.bind(source, sink, DEFAULT_INPUT.into()).unwrap();

        assert_eq!(arena.compute(source, 10), Ok(4.0));
        assert_eq!(arena.compute(sink, 10), Ok(4.0));
        assert_eq!(arena.get(sink).unwrap().last_computed_frame(), Some(10));
        assert_eq!(
            arena.compute(sink, 10),
            Err(GraphError::DoubleComputeInSameFrame { node: sink, frame_time: 10 })
        );
        assert_eq!(arena.compute(sink, 20), Ok(4.0));
    }

    #[test]
    fn failed_compute_restores_behavior() {
        let mut arena = NodeArena::new();
        let sink = arena.insert(Box::new(PassThrough::new()));

        assert!(matches!(
            arena.compute(sink, 1),
            Err(GraphError::MissingInput { .. })
        ));
        assert_eq!(arena.get(sink).unwrap().kind(), "pass_through");
        assert_eq!(arena.get(sink).unwrap().last_computed_frame(), None);
    }
}
