//! Animation Recipes
//!
//! Builders that wire up the node graphs of common animations. Each recipe
//! adds fresh nodes to the graph and returns an [`Animation`]: an inactive
//! binding plus the node whose value is the animated output. Set a listener
//! if needed, then activate the binding.
//!
//! The recipe's nodes outlive the animation, so the output can be read after
//! it finishes. Call [`Animation::dispose`] once the value is no longer
//! needed.
//!
//! ```ignore
//! let mut fade = TimingAnimation::new(0.0, 1.0, Duration::from_millis(250))
//!     .with_curve(Curve::EaseOut)
//!     .build(&graph)?;
//! fade.binding.activate()?;
//! ```

use std::time::Duration;

use crate::binding::Binding;
use crate::config::SpringConfig;
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::nodes::{
    Constant, Curve, Interpolator, LinearMap, Spring, TimingRamp, END_INPUT, INITIAL_INPUT,
};

/// A binding ready to activate, and the node carrying its output.
#[derive(Debug)]
pub struct Animation {
    pub binding: Binding,
    pub output: NodeId,
}

impl Animation {
    /// Stop the animation if it is running and destroy its nodes.
    pub fn dispose(self) -> Result<()> {
        self.binding.dispose()
    }
}

/// Moves from `from` to `to` over a fixed duration.
///
/// Graph: `TimingRamp -> [Interpolator] -> LinearMap`, with constants on the
/// map's `initial` and `end` inputs.
#[derive(Debug, Clone)]
pub struct TimingAnimation {
    from: f32,
    to: f32,
    duration: Duration,
    curve: Option<Curve>,
}

impl TimingAnimation {
    pub fn new(from: f32, to: f32, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration,
            curve: None,
        }
    }

    /// Ease the ramp through `curve` before mapping it.
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn build(self, graph: &Graph) -> Result<Animation> {
        let ramp = graph.add_node(TimingRamp::new(self.duration));
        let initial = graph.add_node(Constant::new(self.from));
        let end = graph.add_node(Constant::new(self.to));
        let map = graph.add_node(LinearMap::new());

        let mut binding = graph.binding();
        match self.curve {
            Some(curve) => {
                let eased = graph.add_node(Interpolator::new(curve));
                binding.add_edge(ramp, eased)?;
                binding.add_edge(eased, map)?;
            }
            None => binding.add_edge(ramp, map)?,
        }
        binding.add_named_edge(initial, map, INITIAL_INPUT)?;
        binding.add_named_edge(end, map, END_INPUT)?;

        Ok(Animation {
            binding,
            output: map,
        })
    }
}

/// Springs from `from` to `to`.
///
/// The output is the spring node itself, so it can later be handed to
/// [`retarget_spring`].
#[derive(Debug, Clone, Copy)]
pub struct SpringAnimation {
    from: f32,
    to: f32,
    config: SpringConfig,
}

impl SpringAnimation {
    pub fn new(from: f32, to: f32) -> Self {
        Self {
            from,
            to,
            config: SpringConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SpringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self, graph: &Graph) -> Result<Animation> {
        let spring = graph.add_node(Spring::new(self.config));
        let initial = graph.add_node(Constant::new(self.from));
        let end = graph.add_node(Constant::new(self.to));

        let mut binding = graph.binding();
        binding.add_named_edge(initial, spring, INITIAL_INPUT)?;
        binding.add_named_edge(end, spring, END_INPUT)?;

        Ok(Animation {
            binding,
            output: spring,
        })
    }
}

/// Send a live spring toward a new target without resetting its motion.
///
/// Activates a binding that takes over the spring's `end` input. The binding
/// that started the spring stays registered and finishes together with this
/// one.
pub fn retarget_spring(graph: &Graph, spring: NodeId, to: f32) -> Result<Binding> {
    let end = graph.add_node(Constant::new(to));
    let mut binding = graph.binding();
    binding.add_named_edge(end, spring, END_INPUT)?;
    binding.activate()?;
    Ok(binding)
}
