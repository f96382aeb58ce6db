//! Frame Clocks
//!
//! A clock decides when frames happen. The graph starts its clock when the
//! first binding is registered and stops it when the last one leaves; while
//! running, the clock calls [`TickTarget::tick`] once per frame with a
//! monotonic timestamp in nanoseconds.
//!
//! Two clocks ship with the crate:
//!
//! - [`ManualClock`] advances a fake time by a fixed frame interval whenever
//!   [`ManualClock::step`] is called. Tests use it for deterministic frames.
//! - [`IntervalClock`] ticks from a tokio interval task, standing in for a
//!   platform vsync callback.
//!
//! A clock must never call `tick` again while a previous `tick` is still
//! running on the same graph.

mod interval;
mod manual;

use std::fmt;
use std::sync::Weak;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::Result;
use crate::graph::{Graph, GraphState};

pub use interval::IntervalClock;
pub use manual::ManualClock;

/// Source of frame callbacks for a graph.
pub trait Clock: Send {
    /// Begin delivering frames to `target`.
    fn start(&mut self, target: TickTarget);

    /// Stop delivering frames.
    fn stop(&mut self);
}

/// The graph a running clock delivers frames to.
///
/// Holds a weak reference: once every [`Graph`] handle is gone, ticks become
/// no-ops.
#[derive(Clone)]
pub struct TickTarget {
    graph: Weak<Mutex<GraphState>>,
}

impl TickTarget {
    pub(crate) fn new(graph: Weak<Mutex<GraphState>>) -> Self {
        Self { graph }
    }

    /// Evaluate one frame on the target graph.
    pub fn tick(&self, frame_time_ns: i64) -> Result<()> {
        match self.graph.upgrade() {
            Some(inner) => Graph::from_inner(inner).tick(frame_time_ns),
            None => {
                trace!(frame_time_ns, "tick target dropped, skipping frame");
                Ok(())
            }
        }
    }

    /// Whether the target graph still exists.
    pub fn is_attached(&self) -> bool {
        self.graph.strong_count() > 0
    }
}

impl fmt::Debug for TickTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickTarget")
            .field("attached", &self.is_attached())
            .finish()
    }
}
