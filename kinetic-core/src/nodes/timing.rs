use std::time::Duration;

use crate::error::Result;
use crate::graph::{ComputeContext, Finishable, ValueNode};

/// Ramps from 0 to 1 over a fixed duration, starting at its first compute.
///
/// Finished once the duration has elapsed and its (empty) input set has been
/// reported finished by the graph.
#[derive(Debug, Clone)]
pub struct TimingRamp {
    duration_ns: i64,
    window: Option<(i64, i64)>,
    last_frame: Option<i64>,
    inputs_finished: bool,
}

impl TimingRamp {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration_ns: i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX),
            window: None,
            last_frame: None,
            inputs_finished: false,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_ns as u64)
    }

    /// Frame time at which the ramp reaches 1, once started.
    pub fn end_time(&self) -> Option<i64> {
        self.window.map(|(_, end)| end)
    }

    fn progress(&self, start: i64, now: i64) -> f32 {
        if self.duration_ns == 0 {
            return 1.0;
        }
        let elapsed = (now - start) as f64 / self.duration_ns as f64;
        elapsed.clamp(0.0, 1.0) as f32
    }
}

impl ValueNode for TimingRamp {
    fn kind(&self) -> &'static str {
        "timing_ramp"
    }

    fn compute(&mut self, cx: &ComputeContext<'_>) -> Result<f32> {
        let now = cx.frame_time();
        let (start, _) = *self
            .window
            .get_or_insert((now, now.saturating_add(self.duration_ns)));
        self.last_frame = Some(now);
        Ok(self.progress(start, now))
    }

    fn as_finishable(&mut self) -> Option<&mut dyn Finishable> {
        Some(self)
    }
}

impl Finishable for TimingRamp {
    fn is_finished(&self) -> bool {
        match (self.window, self.last_frame) {
            (Some((_, end)), Some(last)) => self.inputs_finished && last >= end,
            _ => false,
        }
    }

    fn on_inputs_finished(&mut self) {
        self.inputs_finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::testing::Harness;

    const MS: i64 = 1_000_000;

    #[test]
    fn ramps_linearly_from_first_frame() {
        let mut harness = Harness::new(TimingRamp::from_millis(100), &[]);
        assert_eq!(harness.compute(16 * MS), 0.0);
        assert!((harness.compute(66 * MS) - 0.5).abs() < 1e-6);
        assert!((harness.compute(112 * MS) - 0.96).abs() < 1e-6);
        assert_eq!(harness.compute(128 * MS), 1.0);
        assert_eq!(harness.compute(400 * MS), 1.0);
    }

    #[test]
    fn finishes_only_after_end_and_inputs_finished() {
        let mut harness = Harness::new(TimingRamp::from_millis(100), &[]);
        assert!(!harness.is_finished());

        harness.compute(0);
        harness.inputs_finished();
        assert!(!harness.is_finished());

        harness.compute(99 * MS);
        assert!(!harness.is_finished());

        harness.compute(100 * MS);
        assert!(harness.is_finished());
    }

    #[test]
    fn elapsed_ramp_waits_for_inputs_finished() {
        let mut harness = Harness::new(TimingRamp::from_millis(10), &[]);
        harness.compute(0);
        harness.compute(20 * MS);
        assert!(!harness.is_finished());
        harness.inputs_finished();
        assert!(harness.is_finished());
    }

    #[test]
    fn zero_duration_is_complete_immediately() {
        let mut harness = Harness::new(TimingRamp::new(Duration::ZERO), &[]);
        assert_eq!(harness.compute(5 * MS), 1.0);
        harness.inputs_finished();
        assert!(harness.is_finished());
    }
}
