pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Supply rail of the bench; full-scale voltage on both converters.
pub const VCC: f64 = 3.3;
/// Full scale of the 12-bit sensor path (`sp`, `y` live on 0..=4095).
pub const ADC_FULL_SCALE: f64 = 4095.0;
/// Full scale of the 8-bit actuator path (`u`, integral term live on 0..=255).
pub const DAC_FULL_SCALE: f64 = 255.0;

/// Identity of one of the two controllable plants.
///
/// The wire side of the system speaks raw integers (1 or 2); everything past
/// the boundary uses this closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantId {
    Plant1,
    Plant2,
}

impl PlantId {
    /// Decode a raw wire id. Anything other than 1 or 2 is unknown.
    pub fn from_raw(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Plant1),
            2 => Some(Self::Plant2),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u8 {
        match self {
            Self::Plant1 => 1,
            Self::Plant2 => 2,
        }
    }
}

impl core::fmt::Display for PlantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "plant {}", self.as_raw())
    }
}

/// One telemetry sample, already converted to volts at the boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    /// Monotonic milliseconds since system start.
    pub timestamp_ms: u64,
    pub sp_volts: f64,
    pub y_volts: f64,
}

/// Analog I/O of the two plants: sensor voltage in, 8-bit control duty out.
pub trait PlantIo {
    fn read_voltage(
        &mut self,
        plant: PlantId,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>>;

    fn write_control(
        &mut self,
        plant: PlantId,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// The two digital select lines of the analog multiplexer.
pub trait MuxPins {
    fn set_lines(
        &mut self,
        in_a: bool,
        in_b: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Consumer of periodic telemetry frames.
pub trait TelemetrySink {
    fn publish(
        &mut self,
        frame: &TelemetryFrame,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Number of parties currently listening. Publishers skip their output
    /// step entirely while this is zero.
    fn subscriber_count(&self) -> usize {
        1
    }
}

// Boxed collaborators behave like the collaborator they hold, so generic
// task types also accept dynamic dispatch.
impl<T: PlantIo + ?Sized> PlantIo for Box<T> {
    fn read_voltage(
        &mut self,
        plant: PlantId,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_voltage(plant)
    }

    fn write_control(
        &mut self,
        plant: PlantId,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_control(plant, duty)
    }
}

impl<T: MuxPins + ?Sized> MuxPins for Box<T> {
    fn set_lines(
        &mut self,
        in_a: bool,
        in_b: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_lines(in_a, in_b)
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn publish(
        &mut self,
        frame: &TelemetryFrame,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).publish(frame)
    }

    fn subscriber_count(&self) -> usize {
        (**self).subscriber_count()
    }
}
