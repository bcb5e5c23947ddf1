//! Real mux select lines on two GPIO outputs (Linux, `rppal`).

use crate::error::HwError;
use plantbench_traits::MuxPins;
use rppal::gpio::{Gpio, OutputPin};

pub struct GpioMux {
    in_a: OutputPin,
    in_b: OutputPin,
}

impl GpioMux {
    pub fn new(in_a_pin: u8, in_b_pin: u8) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut in_a = gpio
            .get(in_a_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        let mut in_b = gpio
            .get(in_b_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        in_a.set_low();
        in_b.set_low();
        Ok(Self { in_a, in_b })
    }
}

impl MuxPins for GpioMux {
    fn set_lines(
        &mut self,
        in_a: bool,
        in_b: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if in_a {
            self.in_a.set_high();
        } else {
            self.in_a.set_low();
        }
        if in_b {
            self.in_b.set_high();
        } else {
            self.in_b.set_low();
        }
        tracing::debug!(in_a, in_b, "mux lines driven");
        Ok(())
    }
}
