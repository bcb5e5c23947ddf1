//! Discrete PID compute step.
//!
//! The controller is stateful across cycles through `i_term` and `last_y`
//! inside [`ControlState`]; exactly one `compute` runs per sample. Callers
//! invoke everything here under the state lock.

use crate::conversions::{ADC_FULL_SCALE, DAC_FULL_SCALE};
use crate::state::ControlState;

/// Raw (unscaled) PID gains as supplied by configuration or a remote update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl ControlState {
    /// Startup initialization: zero the dynamic terms, park the setpoint at
    /// 50 % of full scale, then apply the initial tunings.
    pub fn init_controller(&mut self, gains: Gains) {
        self.u = 0.0;
        self.y = 0.0;
        self.i_term = 0.0;
        self.last_y = 0.0;
        self.sp = 0.5 * ADC_FULL_SCALE;
        self.set_tunings(gains);
    }

    /// Re-tune the loop. `ki`/`kd` are pre-scaled by the sample period here
    /// so the per-cycle compute never divides. Deliberately does NOT reset
    /// `i_term`: accumulated windup carries across a gain change.
    pub fn set_tunings(&mut self, gains: Gains) {
        let dt_s = self.sample_time.as_secs_f64();
        self.kp = gains.kp;
        self.ki = gains.ki * dt_s;
        self.kd = gains.kd / dt_s;
    }

    /// One discrete PID step over the current `sp`/`y`.
    ///
    /// The error lives on the 0..=4095 sensor scale while `i_term` and `u`
    /// clamp on the 0..=255 actuator scale; this mismatch sets the effective
    /// loop gain and must not be normalized away. The derivative acts on the
    /// measurement, not the error, so a setpoint step produces no derivative
    /// kick.
    pub fn compute(&mut self) {
        let error = self.sp - self.y;

        self.i_term += self.ki * error;
        self.i_term = self.i_term.clamp(0.0, DAC_FULL_SCALE);

        let d_y = self.y - self.last_y;

        self.u = self.kp * error + self.i_term - self.kd * d_y;
        self.u = self.u.clamp(0.0, DAC_FULL_SCALE);

        self.last_y = self.y;
    }
}
