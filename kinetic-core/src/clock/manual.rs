//! Manually stepped clock for tests and offline evaluation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::ClockConfig;
use crate::error::Result;

use super::{Clock, TickTarget};

#[derive(Debug)]
struct ManualClockState {
    now_ns: i64,
    frame_interval_ns: i64,
    target: Option<TickTarget>,
    starts: u32,
}

/// A clock that only advances when told to.
///
/// Clones share the same state, so a test keeps one handle and gives the
/// other to the graph.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualClockState>>,
}

impl ManualClock {
    /// Clock stepping 16 ms per frame, starting at time zero.
    pub fn new() -> Self {
        Self::from_config(&ClockConfig::default())
    }

    /// Clock stepping by the configured frame interval.
    pub fn from_config(config: &ClockConfig) -> Self {
        Self::with_frame_interval(config.frame_interval())
    }

    /// Clock stepping by `interval` per frame.
    pub fn with_frame_interval(interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualClockState {
                now_ns: 0,
                frame_interval_ns: interval.as_nanos() as i64,
                target: None,
                starts: 0,
            })),
        }
    }

    /// Advance `frames` frames, ticking the graph on each one while running.
    ///
    /// Time advances even while stopped. Stops at the first failing tick.
    pub fn step(&self, frames: u32) -> Result<()> {
        for _ in 0..frames {
            let (target, now) = {
                let mut state = self.state.lock();
                state.now_ns += state.frame_interval_ns;
                match state.target.clone() {
                    Some(target) => (target, state.now_ns),
                    None => continue,
                }
            };
            // The lock is released: the tick may stop this clock.
            target.tick(now)?;
        }
        Ok(())
    }

    /// Current fake time in nanoseconds.
    pub fn now(&self) -> i64 {
        self.state.lock().now_ns
    }

    /// Frame interval in nanoseconds.
    pub fn frame_interval_ns(&self) -> i64 {
        self.state.lock().frame_interval_ns
    }

    /// Whether a graph is currently attached.
    pub fn is_running(&self) -> bool {
        self.state.lock().target.is_some()
    }

    /// How many times the clock has been started.
    pub fn start_count(&self) -> u32 {
        self.state.lock().starts
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn start(&mut self, target: TickTarget) {
        let mut state = self.state.lock();
        state.target = Some(target);
        state.starts += 1;
        debug!(now_ns = state.now_ns, "manual clock started");
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.target = None;
        debug!(now_ns = state.now_ns, "manual clock stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_advances_while_stopped() {
        let clock = ManualClock::new();
        clock.step(3).unwrap();
        assert_eq!(clock.now(), 3 * 16_000_000);
        assert!(!clock.is_running());
    }

    #[test]
    fn custom_frame_interval() {
        let clock = ManualClock::with_frame_interval(Duration::from_millis(8));
        clock.step(2).unwrap();
        assert_eq!(clock.now(), 16_000_000);
        assert_eq!(clock.frame_interval_ns(), 8_000_000);
    }

    #[test]
    fn detached_target_ticks_are_ignored() {
        let mut clock = ManualClock::new();
        clock.start(TickTarget::new(std::sync::Weak::new()));
        assert!(clock.is_running());
        clock.step(1).unwrap();
        assert_eq!(clock.start_count(), 1);
        clock.stop();
        assert!(!clock.is_running());
    }
}
