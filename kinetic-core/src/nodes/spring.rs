use crate::config::SpringConfig;
use crate::error::Result;
use crate::graph::{ComputeContext, Finishable, ValueNode};

use super::simulation::SpringSimulation;
use super::{END_INPUT, INITIAL_INPUT};

/// Spring-driven value chasing its `end` input.
///
/// The first compute places the spring at rest on `initial`. After that
/// `initial` is never read again: rebinding it has no effect, while
/// rebinding `end` retargets the spring from wherever it currently is.
#[derive(Debug, Clone)]
pub struct Spring {
    simulation: SpringSimulation,
    last_frame: Option<i64>,
    inputs_finished: bool,
}

impl Spring {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            simulation: SpringSimulation::new(config),
            last_frame: None,
            inputs_finished: false,
        }
    }

    pub fn simulation(&self) -> &SpringSimulation {
        &self.simulation
    }
}

impl Default for Spring {
    fn default() -> Self {
        Self::new(SpringConfig::default())
    }
}

impl ValueNode for Spring {
    fn kind(&self) -> &'static str {
        "spring"
    }

    fn compute(&mut self, cx: &ComputeContext<'_>) -> Result<f32> {
        let now = cx.frame_time();
        let end = f64::from(cx.input(END_INPUT)?);
        match self.last_frame {
            None => {
                let initial = f64::from(cx.input(INITIAL_INPUT)?);
                self.simulation.reset(initial, end);
            }
            Some(last) => {
                self.simulation.set_end(end);
                self.simulation.advance((now - last) as f64 / 1e9);
            }
        }
        self.last_frame = Some(now);
        Ok(self.simulation.position() as f32)
    }

    fn as_finishable(&mut self) -> Option<&mut dyn Finishable> {
        Some(self)
    }
}

impl Finishable for Spring {
    fn is_finished(&self) -> bool {
        self.inputs_finished && self.last_frame.is_some() && self.simulation.is_at_rest()
    }

    fn on_inputs_finished(&mut self) {
        self.inputs_finished = true;
    }
}
