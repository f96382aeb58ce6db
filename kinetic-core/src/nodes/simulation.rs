//! Damped spring integrator.
//!
//! Fourth-order Runge-Kutta in fixed 1 ms sub-steps. A frame delta is capped
//! at 64 ms so a stalled frame cannot launch the spring, and any remainder
//! shorter than one sub-step is carried into the next call.

use serde::Serialize;

use crate::config::SpringConfig;

/// Length of one integration sub-step, in seconds.
const SOLVER_TIMESTEP: f64 = 0.001;

/// Longest frame delta integrated in one call, in seconds.
const MAX_DELTA_TIME: f64 = 0.064;

/// Position and velocity of a spring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpringState {
    pub position: f64,
    pub velocity: f64,
}

/// A one-dimensional damped harmonic oscillator moving toward `end`.
#[derive(Debug, Clone)]
pub struct SpringSimulation {
    config: SpringConfig,
    current: SpringState,
    start: f64,
    end: f64,
    accumulator: f64,
}

impl SpringSimulation {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            config,
            current: SpringState::default(),
            start: 0.0,
            end: 0.0,
            accumulator: 0.0,
        }
    }

    pub fn config(&self) -> &SpringConfig {
        &self.config
    }

    /// Place the spring at rest at `position`, heading for `end`.
    pub fn reset(&mut self, position: f64, end: f64) {
        self.current = SpringState {
            position,
            velocity: 0.0,
        };
        self.start = position;
        self.end = end;
        self.accumulator = 0.0;
    }

    /// Move the target, keeping position and velocity.
    pub fn set_end(&mut self, end: f64) {
        if end == self.end {
            return;
        }
        self.start = self.current.position;
        self.end = end;
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        self.current.velocity = velocity;
    }

    pub fn position(&self) -> f64 {
        self.current.position
    }

    pub fn velocity(&self) -> f64 {
        self.current.velocity
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn state(&self) -> SpringState {
        self.current
    }

    pub fn is_at_rest(&self) -> bool {
        self.current.velocity.abs() <= self.config.rest_speed_threshold
            && ((self.end - self.current.position).abs() <= self.config.rest_displacement_threshold
                || self.config.tension == 0.0)
    }

    /// Whether the spring has moved past its target since the last retarget.
    pub fn is_overshooting(&self) -> bool {
        self.config.tension > 0.0
            && ((self.start < self.end && self.current.position > self.end)
                || (self.start > self.end && self.current.position < self.end))
    }

    /// Integrate `dt` seconds of motion.
    ///
    /// Returns whether the spring is at rest afterwards. At rest the position
    /// snaps onto the target and the velocity is zeroed.
    pub fn advance(&mut self, dt: f64) -> bool {
        if self.is_at_rest() {
            self.settle();
            return true;
        }

        self.accumulator += dt.clamp(0.0, MAX_DELTA_TIME);
        while self.accumulator >= SOLVER_TIMESTEP {
            self.accumulator -= SOLVER_TIMESTEP;
            self.current = self.step(self.current, SOLVER_TIMESTEP);
        }

        if self.config.overshoot_clamping && self.is_overshooting() {
            self.start = self.end;
            self.settle();
            return true;
        }

        if self.is_at_rest() {
            self.settle();
            return true;
        }
        false
    }

    fn settle(&mut self) {
        if self.config.tension > 0.0 {
            self.current.position = self.end;
        }
        self.current.velocity = 0.0;
        self.accumulator = 0.0;
    }

    fn acceleration(&self, position: f64, velocity: f64) -> f64 {
        self.config.tension * (self.end - position) - self.config.friction * velocity
    }

    fn step(&self, s: SpringState, h: f64) -> SpringState {
        let a_v = s.velocity;
        let a_a = self.acceleration(s.position, s.velocity);

        let b_x = s.position + a_v * h * 0.5;
        let b_v = s.velocity + a_a * h * 0.5;
        let b_a = self.acceleration(b_x, b_v);

        let c_x = s.position + b_v * h * 0.5;
        let c_v = s.velocity + b_a * h * 0.5;
        let c_a = self.acceleration(c_x, c_v);

        let d_x = s.position + c_v * h;
        let d_v = s.velocity + c_a * h;
        let d_a = self.acceleration(d_x, d_v);

        SpringState {
            position: s.position + h / 6.0 * (a_v + 2.0 * (b_v + c_v) + d_v),
            velocity: s.velocity + h / 6.0 * (a_a + 2.0 * (b_a + c_a) + d_a),
        }
    }
}
