use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::graph::{ComputeContext, ValueNode};

/// Easing curve mapping a fraction onto an eased fraction.
///
/// Curves are not clamped: inputs outside `0..=1` extrapolate.
#[derive(Clone, Default)]
pub enum Curve {
    #[default]
    Linear,
    /// `x²`
    EaseIn,
    /// `1 - (1 - x)²`
    EaseOut,
    /// Half a cosine wave.
    EaseInOut,
    /// Any user-supplied mapping.
    Custom(Arc<dyn Fn(f32) -> f32 + Send + Sync>),
}

impl Curve {
    pub fn custom<F>(curve: F) -> Self
    where
        F: Fn(f32) -> f32 + Send + Sync + 'static,
    {
        Curve::Custom(Arc::new(curve))
    }

    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Curve::Linear => x,
            Curve::EaseIn => x * x,
            Curve::EaseOut => {
                let inv = 1.0 - x;
                1.0 - inv * inv
            }
            Curve::EaseInOut => ((x + 1.0) * PI).cos() / 2.0 + 0.5,
            Curve::Custom(curve) => curve(x),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Curve::Linear => "linear",
            Curve::EaseIn => "ease_in",
            Curve::EaseOut => "ease_out",
            Curve::EaseInOut => "ease_in_out",
            Curve::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Applies a [`Curve`] to its default input.
#[derive(Debug, Clone, Default)]
pub struct Interpolator {
    curve: Curve,
}

impl Interpolator {
    pub fn new(curve: Curve) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }
}

impl ValueNode for Interpolator {
    fn kind(&self) -> &'static str {
        "interpolator"
    }

    fn compute(&mut self, cx: &ComputeContext<'_>) -> Result<f32> {
        Ok(self.curve.apply(cx.default_input()?))
    }
}
