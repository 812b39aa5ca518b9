//! Fixed-timestep accumulator with adaptive physics frequency
//!
//! The host measures real frame time and feeds it into the clock; the clock
//! decides how many fixed steps to run and how large they are. When physics
//! steps take longer than their own budget the frequency is walked down one
//! hertz at a time (never below a floor), and walked back up once steps are
//! comfortably cheap again. The leftover accumulator fraction is exposed for
//! render interpolation.

/// Physics frequency never drops below this, no matter how slow steps get
const MIN_PHYSICS_HZ: f64 = 10.0;

/// Frame times above this are clamped before accumulation so a long stall
/// cannot queue up an unbounded number of catch-up steps
const MAX_FRAME_TIME: f64 = 0.25;

/// Drives the fixed-step loop for a real-time host
#[derive(Debug, Clone)]
pub struct StepClock {
    configured_hz: f64,
    actual_hz: f64,
    fixed_step: f64,
    accumulator: f64,
    scale_physics: bool,
}

impl StepClock {
    /// Create a clock stepping at `physics_hz`, optionally allowed to adapt
    pub fn new(physics_hz: f64, scale_physics: bool) -> Self {
        let configured_hz = physics_hz.max(1.0);
        Self {
            configured_hz,
            actual_hz: configured_hz,
            fixed_step: 1.0 / configured_hz,
            accumulator: 0.0,
            scale_physics,
        }
    }

    /// Add a frame of real time to the accumulator, capped at 0.25 s
    pub fn advance(&mut self, frame_time: f64) {
        self.accumulator += frame_time.min(MAX_FRAME_TIME);
    }

    /// True while enough time is banked for another fixed step
    #[inline]
    pub fn should_step(&self) -> bool {
        self.accumulator >= self.fixed_step
    }

    /// Step size to pass into the engine for the upcoming step
    #[inline]
    pub fn fixed_step(&self) -> f64 {
        self.fixed_step
    }

    /// Current physics frequency in hertz
    #[inline]
    pub fn actual_hz(&self) -> f64 {
        self.actual_hz
    }

    /// Record the measured wall time of the step just taken and drain the
    /// accumulator
    ///
    /// If scaling is enabled the frequency drops by one hertz when the step
    /// overran its budget and climbs by one when it used less than half of
    /// it. The accumulator is drained by the adjusted step size, matching the
    /// step the host will take next.
    pub fn complete_step(&mut self, step_time: f64) {
        if self.scale_physics {
            if self.actual_hz > MIN_PHYSICS_HZ && step_time > self.fixed_step {
                self.actual_hz -= 1.0;
                self.fixed_step = 1.0 / self.actual_hz;
            } else if self.actual_hz < self.configured_hz && step_time < self.fixed_step / 2.0 {
                self.actual_hz += 1.0;
                self.fixed_step = 1.0 / self.actual_hz;
            }
        }
        self.accumulator -= self.fixed_step;
    }

    /// Leftover accumulator fraction in [0, 1), for render interpolation
    pub fn alpha(&self) -> f64 {
        (self.accumulator / self.fixed_step).clamp(0.0, 1.0)
    }
}
