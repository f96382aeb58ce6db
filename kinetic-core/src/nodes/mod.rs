//! Node Variants
//!
//! The built-in node behaviors:
//!
//! | Variant | Inputs | Value |
//! |---|---|---|
//! | [`Constant`] | none | fixed at construction |
//! | [`PassThrough`] | default | the input's value |
//! | [`Interpolator`] | default | a [`Curve`] applied to the input |
//! | [`LinearMap`] | `initial`, `end`, default | `initial + fraction * (end - initial)` |
//! | [`TimingRamp`] | none | 0 to 1 over a fixed duration |
//! | [`Spring`] | `initial`, `end` | damped spring position |
//!
//! Only [`TimingRamp`] and [`Spring`] decide for themselves when they are
//! finished. Every other variant is finished once its inputs are.

mod constant;
mod interpolator;
mod linear_map;
mod pass_through;
mod simulation;
mod spring;
mod timing;

pub use constant::Constant;
pub use interpolator::{Curve, Interpolator};
pub use linear_map::LinearMap;
pub use pass_through::PassThrough;
pub use simulation::{SpringSimulation, SpringState};
pub use spring::Spring;
pub use timing::TimingRamp;

/// Input holding the start value of [`LinearMap`] and [`Spring`].
pub const INITIAL_INPUT: &str = "initial";

/// Input holding the end value of [`LinearMap`] and [`Spring`].
pub const END_INPUT: &str = "end";
