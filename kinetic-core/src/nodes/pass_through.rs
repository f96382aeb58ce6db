use crate::error::Result;
use crate::graph::{ComputeContext, ValueNode};

/// Forwards its default input unchanged.
///
/// Typically the consumer end of a binding, read by whatever draws the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl PassThrough {
    pub fn new() -> Self {
        Self
    }
}

impl ValueNode for PassThrough {
    fn kind(&self) -> &'static str {
        "pass_through"
    }

    fn compute(&mut self, cx: &ComputeContext<'_>) -> Result<f32> {
        cx.default_input()
    }
}
