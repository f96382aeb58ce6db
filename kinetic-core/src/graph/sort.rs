//! Topological Sort
//!
//! Evaluation order is computed with Kahn's algorithm run backwards from the
//! leaves:
//!
//! 1. Nodes without outputs are leaves and seed the work queue.
//! 2. Every other node starts with a counter equal to its output count.
//! 3. Popping a node decrements the counter of each of its inputs. An input
//!    whose counter reaches zero has had all its consumers visited and is
//!    queued.
//! 4. The visit order lists consumers before producers, so it is reversed to
//!    give a root-first order.
//!
//! Any of the three cycle checks aborts the sort without touching the caller's
//! cached order.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexSet;

use crate::error::{CycleTrigger, GraphError, Result};

use super::arena::NodeArena;
use super::node::NodeId;

/// Sort `nodes` so every node comes after all of its inputs.
pub(crate) fn topological_sort(nodes: &IndexSet<NodeId>, arena: &NodeArena) -> Result<Vec<NodeId>> {
    let mut pending: HashMap<NodeId, isize> = HashMap::with_capacity(nodes.len());
    let mut queue = VecDeque::new();

    for &id in nodes {
        let outputs = arena.get(id)?.outputs().len();
        if outputs == 0 {
            queue.push_back(id);
        } else {
            pending.insert(id, outputs as isize);
        }
    }

    if queue.is_empty() && !pending.is_empty() {
        return Err(GraphError::CycleDetected(CycleTrigger::NoLeaves));
    }

    let mut result = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        result.push(id);

        for (_, input) in arena.get(id)?.inputs() {
            let count = pending.get_mut(&input).ok_or_else(|| {
                GraphError::BrokenInvariant(format!(
                    "input {} of node {} is not a live producer",
                    input, id
                ))
            })?;
            *count -= 1;
            if *count == 0 {
                queue.push_back(input);
            } else if *count < 0 {
                return Err(GraphError::CycleDetected(CycleTrigger::NegativeOutputCount));
            }
        }
    }

    if result.len() != nodes.len() {
        return Err(GraphError::CycleDetected(CycleTrigger::UnreachableNodes));
    }

    result.reverse();
    Ok(result)
}
