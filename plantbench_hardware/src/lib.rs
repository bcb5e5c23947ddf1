//! Plant and mux implementations.
//!
//! The simulated variants model the bench's two RC plants well enough to
//! close the loop end to end on a desk with no wiring. Real mux lines are
//! available on Linux behind the `hardware` feature.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio_mux;

pub use error::HwError;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio_mux::GpioMux;

use plantbench_traits::{DAC_FULL_SCALE, MuxPins, PlantId, PlantIo, VCC};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default, Clone, Copy)]
struct PlantChannel {
    /// Current output voltage of the RC network.
    y_volts: f64,
    /// Voltage currently driven into it by the DAC.
    drive_volts: f64,
}

#[derive(Debug)]
struct SimPlantInner {
    channels: [PlantChannel; 2],
    /// First-order response per sample: y += alpha * (drive - y).
    alpha: f64,
}

/// Two first-order RC-style plant channels responding to the written duty.
///
/// Each `read_voltage` advances the addressed channel one step toward its
/// drive voltage, so a loop sampling at a fixed period sees a plausible
/// exponential response. Clones share the same channels, which lets a test
/// or a demo keep a probe while the control task owns the I/O.
#[derive(Debug, Clone)]
pub struct SimPlant {
    inner: Arc<Mutex<SimPlantInner>>,
}

impl SimPlant {
    pub fn new() -> Self {
        Self::with_alpha(0.35)
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimPlantInner {
                channels: [PlantChannel::default(); 2],
                alpha: alpha.clamp(0.0, 1.0),
            })),
        }
    }

    /// Last voltage observed on a channel without advancing the simulation.
    pub fn output_volts(&self, plant: PlantId) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.channels[channel_index(plant)].y_volts
    }

    /// Voltage currently driven into a channel.
    pub fn drive_volts(&self, plant: PlantId) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.channels[channel_index(plant)].drive_volts
    }
}

impl Default for SimPlant {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn channel_index(plant: PlantId) -> usize {
    match plant {
        PlantId::Plant1 => 0,
        PlantId::Plant2 => 1,
    }
}

impl PlantIo for SimPlant {
    fn read_voltage(
        &mut self,
        plant: PlantId,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let alpha = inner.alpha;
        let ch = &mut inner.channels[channel_index(plant)];
        ch.y_volts += alpha * (ch.drive_volts - ch.y_volts);
        tracing::trace!(%plant, y_volts = ch.y_volts, "sim plant sample");
        Ok(ch.y_volts)
    }

    fn write_control(
        &mut self,
        plant: PlantId,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let ch = &mut inner.channels[channel_index(plant)];
        ch.drive_volts = f64::from(duty) / DAC_FULL_SCALE * VCC;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SimMuxInner {
    last_lines: Option<(bool, bool)>,
    set_count: usize,
}

/// Mux stand-in that records the line levels it was driven to.
#[derive(Debug, Clone, Default)]
pub struct SimMux {
    inner: Arc<Mutex<SimMuxInner>>,
}

impl SimMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_lines(&self) -> Option<(bool, bool)> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.last_lines
    }

    pub fn set_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.set_count
    }
}

impl MuxPins for SimMux {
    fn set_lines(
        &mut self,
        in_a: bool,
        in_b: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.last_lines = Some((in_a, in_b));
        inner.set_count += 1;
        tracing::trace!(in_a, in_b, "sim mux lines");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_plant_rises_toward_drive_voltage() {
        let mut plant = SimPlant::new();
        plant.write_control(PlantId::Plant1, 255).expect("write");
        let mut last = 0.0;
        for _ in 0..20 {
            let v = plant.read_voltage(PlantId::Plant1).expect("read");
            assert!(v >= last, "response must be monotonic toward the drive");
            last = v;
        }
        assert!(last > 0.9 * VCC, "should approach VCC, got {last}");
    }

    #[test]
    fn sim_plant_channels_are_independent() {
        let mut plant = SimPlant::new();
        plant.write_control(PlantId::Plant1, 255).expect("write");
        let _ = plant.read_voltage(PlantId::Plant1).expect("read");
        let v2 = plant.read_voltage(PlantId::Plant2).expect("read");
        assert_eq!(v2, 0.0, "plant 2 was never driven");
    }

    #[test]
    fn sim_mux_records_levels_and_count() {
        let mut mux = SimMux::new();
        let probe = mux.clone();
        mux.set_lines(true, false).expect("set");
        mux.set_lines(false, true).expect("set");
        assert_eq!(probe.last_lines(), Some((false, true)));
        assert_eq!(probe.set_count(), 2);
    }
}
