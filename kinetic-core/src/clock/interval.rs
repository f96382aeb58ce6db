//! Clock driven by a tokio interval.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, trace};

use crate::config::ClockConfig;
use crate::error::GraphError;

use super::{Clock, TickTarget};

/// Failed frames buffered per error subscriber.
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Production clock ticking on a tokio runtime at a fixed frame interval.
///
/// Frame timestamps are the interval's scheduled deadlines, measured from
/// the clock's creation. Late frames are skipped rather than bunched up.
///
/// A failing tick does not stop the clock: the next frame tries again, so
/// the graph recovers once the offending binding is removed. Every failure
/// is published to [`IntervalClock::errors`] subscribers.
pub struct IntervalClock {
    runtime: Handle,
    interval: Duration,
    origin: Instant,
    errors: broadcast::Sender<GraphError>,
    task: Option<JoinHandle<()>>,
}

impl IntervalClock {
    /// Create a stopped clock that will spawn its frame task on `runtime`.
    pub fn new(runtime: Handle, config: &ClockConfig) -> Self {
        Self {
            runtime,
            interval: config.frame_interval(),
            origin: Instant::now(),
            errors: broadcast::channel(ERROR_CHANNEL_CAPACITY).0,
            task: None,
        }
    }

    /// Receive the errors of failing frames.
    ///
    /// Subscribe before handing the clock to a graph. A receiver that falls
    /// behind loses the oldest errors.
    pub fn errors(&self) -> broadcast::Receiver<GraphError> {
        self.errors.subscribe()
    }

    /// Whether the frame task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl Clock for IntervalClock {
    fn start(&mut self, target: TickTarget) {
        self.stop();

        let interval = self.interval;
        let origin = self.origin;
        let errors = self.errors.clone();
        debug!(?interval, "interval clock started");
        self.task = Some(self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failing = false;
            loop {
                let deadline = ticker.tick().await;
                if !target.is_attached() {
                    debug!("graph dropped, interval clock exiting");
                    break;
                }
                let frame_time = deadline.saturating_duration_since(origin).as_nanos() as i64;
                match target.tick(frame_time) {
                    Ok(()) if failing => {
                        debug!(frame_time, "frame ticks recovered");
                        failing = false;
                    }
                    Ok(()) => {}
                    Err(err) => {
                        if failing {
                            trace!(%err, frame_time, "frame tick failed again");
                        } else {
                            error!(%err, frame_time, "frame tick failed");
                            failing = true;
                        }
                        // No subscribers is fine.
                        let _ = errors.send(err);
                    }
                }
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("interval clock stopped");
        }
    }
}

impl Drop for IntervalClock {
    fn drop(&mut self) {
        self.stop();
    }
}
