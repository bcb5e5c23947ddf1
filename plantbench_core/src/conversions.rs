//! Boundary conversions between volts and the internal integer scales.
//!
//! The PID hot path never converts; these helpers run only where the loop
//! touches hardware or a transport.

pub use plantbench_traits::{ADC_FULL_SCALE, DAC_FULL_SCALE, VCC};

/// Sensor boundary: measured volts to the 0..=4095 internal scale.
#[inline]
pub fn volts_to_code(volts: f64) -> f64 {
    volts / VCC * ADC_FULL_SCALE
}

/// Transport boundary: internal 0..=4095 code back to volts.
#[inline]
pub fn code_to_volts(code: f64) -> f64 {
    code / ADC_FULL_SCALE * VCC
}

/// Actuator boundary: clamp the control signal into the 8-bit duty range.
/// Truncates like the original converter write did, so 254.9 becomes 254.
#[inline]
pub fn duty_from_control(u: f64) -> u8 {
    u.clamp(0.0, DAC_FULL_SCALE) as u8
}
