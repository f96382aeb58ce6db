use crate::error::Result;
use crate::graph::{ComputeContext, ValueNode, DEFAULT_INPUT};

use super::{END_INPUT, INITIAL_INPUT};

/// Maps a fraction onto the range between its `initial` and `end` inputs.
///
/// The fraction comes from the input named `default` and is not clamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearMap;

impl LinearMap {
    pub fn new() -> Self {
        Self
    }
}

impl ValueNode for LinearMap {
    fn kind(&self) -> &'static str {
        "linear_map"
    }

    fn compute(&mut self, cx: &ComputeContext<'_>) -> Result<f32> {
        let initial = cx.input(INITIAL_INPUT)?;
        let end = cx.input(END_INPUT)?;
        let fraction = cx.input(DEFAULT_INPUT)?;
        Ok(initial + fraction * (end - initial))
    }
}
