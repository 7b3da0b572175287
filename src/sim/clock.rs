// src/sim/clock.rs
// Fixed-step time accumulator draining wall-clock frame durations into
// whole simulation steps, with a catch-up cap and drop reporting
// RELEVANT FILES: src/sim/driver.rs, tests/test_fixed_step.rs

use log::warn;

/// Default fixed step of 1/60 s, the common display-locked simulation rate
pub const DEFAULT_STEP_SECONDS: f32 = 1.0 / 60.0;
/// Default bound on steps drained by a single `advance` call
pub const DEFAULT_MAX_CATCH_UP_STEPS: u32 = 8;

/// Fixed-step clock configuration
#[derive(Debug, Clone)]
pub struct FixedStepConfig {
    /// Simulation step size in seconds
    pub step_seconds: f32,
    /// Maximum steps drained per advance; whole steps beyond this are dropped
    pub max_catch_up_steps: u32,
}

impl Default for FixedStepConfig {
    fn default() -> Self {
        Self {
            step_seconds: DEFAULT_STEP_SECONDS,
            max_catch_up_steps: DEFAULT_MAX_CATCH_UP_STEPS,
        }
    }
}

impl FixedStepConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if !self.step_seconds.is_finite() || self.step_seconds <= 0.0 {
            return Err(format!(
                "step_seconds must be positive and finite, got {}",
                self.step_seconds
            ));
        }
        if self.max_catch_up_steps == 0 {
            return Err("max_catch_up_steps must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Result of draining accumulated time in one `advance` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drain {
    /// Whole simulation steps to execute this frame
    pub steps: u32,
    /// Simulated seconds discarded because the catch-up cap was hit
    pub dropped_seconds: f32,
}

/// Accumulator turning variable frame durations into fixed simulation steps
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    step: f32,
    max_catch_up_steps: u32,
    accumulated: f32,
}

impl FixedStepClock {
    /// Create a clock from a validated configuration
    pub fn new(config: FixedStepConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            step: config.step_seconds,
            max_catch_up_steps: config.max_catch_up_steps,
            accumulated: 0.0,
        })
    }

    /// Add a frame duration and drain whole steps.
    ///
    /// Always leaves `accumulated() < step()`. An exact multiple drains
    /// completely, so a frame of precisely one step leaves zero behind.
    /// At most `max_catch_up_steps` are returned; whole steps beyond the
    /// cap are discarded and reported in `Drain::dropped_seconds` so the
    /// caller can tell simulated time diverged from wall time.
    pub fn advance(&mut self, dt: f32) -> Drain {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.accumulated += dt;

        let mut steps = 0;
        while self.accumulated >= self.step && steps < self.max_catch_up_steps {
            self.accumulated -= self.step;
            steps += 1;
        }

        let mut dropped_seconds = 0.0;
        if self.accumulated >= self.step {
            let remainder = self.accumulated % self.step;
            dropped_seconds = self.accumulated - remainder;
            self.accumulated = remainder;
            warn!(
                "simulation fell behind: dropped {:.4}s ({} steps) of simulated time",
                dropped_seconds,
                (dropped_seconds / self.step).round() as u32
            );
        }

        Drain {
            steps,
            dropped_seconds,
        }
    }

    /// Blend factor in [0, 1) for interpolating between the last two
    /// simulation states when rendering.
    pub fn alpha(&self) -> f32 {
        self.accumulated / self.step
    }

    /// Seconds currently accumulated below one step
    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    /// Fixed step size in seconds
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Discard any accumulated remainder
    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}
