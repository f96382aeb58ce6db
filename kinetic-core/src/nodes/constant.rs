use crate::error::Result;
use crate::graph::{ComputeContext, ValueNode};

/// A node that always produces the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

impl ValueNode for Constant {
    fn kind(&self) -> &'static str {
        "constant"
    }

    fn compute(&mut self, _cx: &ComputeContext<'_>) -> Result<f32> {
        Ok(self.value)
    }
}
