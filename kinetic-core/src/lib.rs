//! Kinetic Core
//!
//! A frame-driven dataflow engine for animation values. Animations are small
//! graphs of value nodes (constants, ramps, easing curves, springs) wired
//! together by bindings. A clock calls the graph once per frame; every node
//! taking part in an active binding is evaluated exactly once, after all of
//! its inputs, and a binding leaves the graph on its own once all of its
//! nodes are finished.
//!
//! # Architecture
//!
//! - `graph`: node arena, topological sort and the per-frame scheduler
//! - `nodes`: built-in node variants and the spring integrator
//! - `binding`: edge sets describing one animation, with a finish listener
//! - `clock`: frame sources driving the graph
//! - `animations`: ready-made bindings for common animations
//! - `config`: spring and clock tunables
//!
//! # Example
//!
//! ```rust,ignore
//! use kinetic_core::{Graph, ManualClock, SpringAnimation};
//!
//! let clock = ManualClock::new();
//! let graph = Graph::new(clock.clone());
//!
//! let mut slide = SpringAnimation::new(0.0, 100.0).build(&graph)?;
//! slide.binding.set_listener(|| println!("settled"))?;
//! slide.binding.activate()?;
//!
//! // Advance ten frames and read the spring.
//! clock.step(10)?;
//! println!("x = {}", graph.value(slide.output)?);
//! ```

pub mod animations;
pub mod binding;
pub mod clock;
pub mod config;
mod error;
pub mod graph;
pub mod nodes;

pub use animations::{retarget_spring, Animation, SpringAnimation, TimingAnimation};
pub use binding::{Binding, BindingId, Edge};
pub use clock::{Clock, IntervalClock, ManualClock, TickTarget};
pub use config::{ClockConfig, EngineConfig, SpringConfig};
pub use error::{ConfigError, CycleTrigger, GraphError, Result};
pub use graph::{Graph, GraphSnapshot, NodeId, ValueNode};
