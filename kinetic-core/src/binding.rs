//! Bindings
//!
//! A binding is the edge list of one logical animation. It is assembled
//! while inactive, then activated to join the graph's frame loop.
//!
//! # Lifecycle
//!
//! 1. Edges are added with [`Binding::add_edge`] / [`Binding::add_named_edge`].
//!    Every node mentioned is kept alive in the arena from this point on.
//!
//! 2. [`Binding::activate`] binds the edges (taking over input slots that
//!    other bindings bound earlier) and registers the binding with the graph.
//!    The edge list is frozen from here on.
//!
//! 3. The binding leaves the graph either explicitly through
//!    [`Binding::deactivate`] or automatically once all of its nodes are
//!    finished, in which case the finish listener runs.
//!
//! Deactivation is terminal: a binding cannot be activated twice.
//!
//! Leaving the graph releases the binding's hold on its nodes but does not
//! destroy them, so their final values stay readable and they can be bound
//! again. [`Binding::dispose`] destroys the nodes once they are no longer
//! needed.
//!
//! Dropping an active `Binding` handle does not deactivate it. The animation
//! keeps running and leaves the graph when it finishes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::Serialize;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::graph::{BindingRecord, Graph, InputName, NodeId, DEFAULT_INPUT};

/// Callback run once when a binding finishes.
pub type FinishListener = Box<dyn FnOnce() + Send + 'static>;

/// Unique identifier for a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BindingId(u64);

impl BindingId {
    /// Generate a new unique binding ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// A directed edge from a producer to a named input of a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub input: InputName,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, input: impl Into<InputName>) -> Self {
        Self {
            from,
            to,
            input: input.into(),
        }
    }
}

/// The edges of one animation and its membership in a graph.
pub struct Binding {
    id: BindingId,
    graph: Graph,
    edges: Vec<Edge>,
    nodes: IndexSet<NodeId>,
    listener: Option<FinishListener>,
    has_listener: bool,
    activated: bool,
}

impl Binding {
    pub(crate) fn new(graph: Graph) -> Self {
        Self {
            id: BindingId::new(),
            graph,
            edges: Vec::new(),
            nodes: IndexSet::new(),
            listener: None,
            has_listener: false,
            activated: false,
        }
    }

    /// Get the binding's unique ID.
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Every node mentioned by an edge, in first-mention order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Connect `from` to the default input of `to`.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.add_named_edge(from, to, DEFAULT_INPUT)
    }

    /// Connect `from` to the named input of `to`.
    pub fn add_named_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        input: impl Into<InputName>,
    ) -> Result<()> {
        if self.activated {
            return Err(GraphError::BindingAlreadyActivated(self.id));
        }

        let mut state = self.graph.lock();
        for node in [from, to] {
            if !self.nodes.contains(&node) {
                state.hold_node(node)?;
                self.nodes.insert(node);
            }
        }
        self.edges.push(Edge::new(from, to, input));
        Ok(())
    }

    /// Set the callback run when all of this binding's nodes are finished.
    ///
    /// The callback runs after the binding has been deactivated, outside the
    /// graph lock.
    pub fn set_listener<F>(&mut self, listener: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.has_listener {
            return Err(GraphError::ListenerAlreadySet(self.id));
        }
        if self.activated {
            let id = self.id;
            self.graph
                .update(|state| state.set_listener(id, Box::new(listener)))?;
        } else {
            self.listener = Some(Box::new(listener));
        }
        self.has_listener = true;
        Ok(())
    }

    /// Bind the edges and register the binding with the graph.
    pub fn activate(&mut self) -> Result<()> {
        if self.activated {
            return Err(GraphError::BindingAlreadyActivated(self.id));
        }

        let mut state = self.graph.lock();
        let record = BindingRecord::new(self.edges.clone(), self.nodes.clone());
        state.activate(self.id, record)?;
        if let Some(listener) = self.listener.take() {
            // Freshly registered, so the slot is empty.
            state.set_listener(self.id, listener)?;
        }
        drop(state);
        self.activated = true;
        debug!(binding = %self.id, edges = self.edges.len(), "binding activated");
        Ok(())
    }

    /// Leave the graph without running the finish listener.
    ///
    /// Does nothing if the binding is not active.
    pub fn deactivate(&self) -> Result<()> {
        let id = self.id;
        let deactivated = self.graph.update(|state| {
            if !state.is_registered(id) {
                return Ok(false);
            }
            state.deactivate(id)?;
            Ok(true)
        })?;
        if deactivated {
            debug!(binding = %id, "binding deactivated");
        }
        Ok(())
    }

    /// Leave the graph if still active, then destroy every node of this
    /// binding that no other binding mentions.
    ///
    /// Nodes shared with another binding survive; the last binding to be
    /// disposed takes them with it.
    pub fn dispose(mut self) -> Result<()> {
        let id = self.id;
        let activated = self.activated;
        let nodes = std::mem::take(&mut self.nodes);
        self.graph.update(|state| {
            if state.is_registered(id) {
                state.deactivate(id)?;
            } else if !activated {
                state.release_nodes(&nodes)?;
            }
            state.remove_unheld(&nodes)
        })?;
        debug!(binding = %id, nodes = nodes.len(), "binding disposed");
        Ok(())
    }

    /// Whether the binding is currently registered with the graph.
    pub fn is_active(&self) -> bool {
        self.graph.lock().is_registered(self.id)
    }

    /// Whether [`activate`](Self::activate) has succeeded before.
    pub fn has_been_activated(&self) -> bool {
        self.activated
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if self.activated || self.nodes.is_empty() {
            return;
        }
        // Never activated: the graph has no record, so the holds are ours.
        let released = self.graph.lock().release_nodes(&self.nodes);
        if let Err(err) = released {
            debug!(binding = %self.id, %err, "failed to release nodes of dropped binding");
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("edges", &self.edges)
            .field("activated", &self.activated)
            .field("has_listener", &self.has_listener)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::nodes::{Constant, PassThrough};

    #[test]
    fn binding_ids_are_unique() {
        let a = BindingId::new();
        let b = BindingId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn edges_are_frozen_after_activation() {
        let graph = Graph::new(ManualClock::new());
        let source = graph.add_node(Constant::new(1.0));
        let sink = graph.add_node(PassThrough::new());

        let mut binding = graph.binding();
        binding.add_edge(source, sink).unwrap();
        binding.activate().unwrap();

        assert_eq!(
            binding.add_edge(source, sink),
            Err(GraphError::BindingAlreadyActivated(binding.id()))
        );
        assert_eq!(
            binding.activate(),
            Err(GraphError::BindingAlreadyActivated(binding.id()))
        );
    }

    #[test]
    fn second_listener_is_rejected() {
        let graph = Graph::new(ManualClock::new());
        let mut binding = graph.binding();
        binding.set_listener(|| {}).unwrap();
        assert_eq!(
            binding.set_listener(|| {}),
            Err(GraphError::ListenerAlreadySet(binding.id()))
        );
    }

    #[test]
    fn deactivate_twice_is_a_no_op() {
        let clock = ManualClock::new();
        let graph = Graph::new(clock.clone());
        let source = graph.add_node(Constant::new(1.0));
        let sink = graph.add_node(PassThrough::new());

        let mut binding = graph.binding();
        binding.add_edge(source, sink).unwrap();
        binding.activate().unwrap();
        assert!(binding.is_active());

        binding.deactivate().unwrap();
        assert!(!binding.is_active());
        assert!(!clock.is_running());

        binding.deactivate().unwrap();
        assert_eq!(graph.binding_count(), 0);
    }

    #[test]
    fn dropping_unactivated_binding_releases_its_nodes() {
        let graph = Graph::new(ManualClock::new());
        let source = graph.add_node(Constant::new(1.0));
        let sink = graph.add_node(PassThrough::new());

        {
            let mut binding = graph.binding();
            binding.add_edge(source, sink).unwrap();
            assert_eq!(graph.remove_node(source), Err(GraphError::NodeInUse(source)));
        }

        assert!(graph.contains_node(source));
        assert_eq!(graph.remove_node(source), Ok(()));
        assert_eq!(graph.remove_node(sink), Ok(()));
    }

    #[test]
    fn finished_binding_keeps_its_nodes() {
        let clock = ManualClock::new();
        let graph = Graph::new(clock.clone());
        let source = graph.add_node(Constant::new(4.0));
        let sink = graph.add_node(PassThrough::new());

        let mut binding = graph.binding();
        binding.add_edge(source, sink).unwrap();
        binding.activate().unwrap();
        clock.step(1).unwrap();

        assert!(!binding.is_active());
        assert_eq!(graph.value(sink), Ok(4.0));
        assert_eq!(graph.ref_count(sink), None);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn dispose_spares_nodes_of_other_bindings() {
        let graph = Graph::new(ManualClock::new());
        let source = graph.add_node(Constant::new(1.0));
        let first_sink = graph.add_node(PassThrough::new());
        let second_sink = graph.add_node(PassThrough::new());

        let mut first = graph.binding();
        first.add_edge(source, first_sink).unwrap();
        first.activate().unwrap();
        let mut second = graph.binding();
        second.add_edge(source, second_sink).unwrap();

        first.dispose().unwrap();
        assert_eq!(graph.binding_count(), 0);
        assert!(!graph.contains_node(first_sink));
        assert!(graph.contains_node(source));

        second.dispose().unwrap();
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn discarded_listener_owning_a_binding_drops_outside_the_lock() {
        let graph = Graph::new(ManualClock::new());
        let source = graph.add_node(Constant::new(1.0));
        let sink = graph.add_node(PassThrough::new());

        let mut binding = graph.binding();
        binding.add_edge(source, sink).unwrap();
        binding.activate().unwrap();
        binding.deactivate().unwrap();

        // Dropping `pending` locks the graph to release its holds.
        let mut pending = graph.binding();
        pending.add_edge(source, sink).unwrap();
        binding.set_listener(move || drop(pending)).unwrap();

        assert_eq!(graph.remove_node(sink), Ok(()));
    }

    #[test]
    fn edges_to_dead_nodes_are_rejected() {
        let graph = Graph::new(ManualClock::new());
        let source = graph.add_node(Constant::new(1.0));
        let sink = graph.add_node(PassThrough::new());
        graph.remove_node(source).unwrap();

        let mut binding = graph.binding();
        assert_eq!(
            binding.add_edge(source, sink),
            Err(GraphError::UnknownNode(source))
        );
        assert_eq!(binding.edges().len(), 0);
    }
}
