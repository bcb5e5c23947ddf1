#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the plant bench.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `UpdateRecord` is the wire schema for remote reconfiguration: every
//!   field is independently optional, mirroring the partial-update contract
//!   of the control core.

use serde::Deserialize;

/// Control-loop configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Fixed sample period of the control loop in milliseconds.
    pub sample_time_ms: u64,
    /// Initial PID gains (raw, unscaled).
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            sample_time_ms: 200,
            kp: 0.05,
            ki: 0.1,
            kd: 0.0,
        }
    }
}

/// Startup sequencing and initial plant selection.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StartupCfg {
    /// Time to hold both plant inputs at zero so the capacitors discharge.
    pub discharge_ms: u64,
    /// Initially selected plant id (1 or 2).
    pub plant: u8,
    /// Initial mux combination for that plant.
    pub combination: u8,
}

impl Default for StartupCfg {
    fn default() -> Self {
        Self {
            discharge_ms: 8_000,
            plant: 1,
            combination: 0,
        }
    }
}

/// Cadences of the telemetry reader tasks.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryCfg {
    /// Period of the plotter-style reader (CSV lines).
    pub plotter_period_ms: u64,
    /// Period of the broadcast-style reader (skips when nobody listens).
    pub broadcast_period_ms: u64,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            plotter_period_ms: 150,
            broadcast_period_ms: 250,
        }
    }
}

/// One step of the optional setpoint profile.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SetpointStep {
    /// Milliseconds since system start at which the step takes effect.
    pub at_ms: u64,
    /// Setpoint as a fraction of full scale, in [0, 1].
    pub fraction: f64,
}

/// Time-based setpoint schedule (off unless enabled).
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SetpointCfg {
    pub enabled: bool,
    pub steps: Vec<SetpointStep>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    /// Path to a .log file (JSON lines); stderr only when absent.
    pub file: Option<String>,
    /// "info", "debug", ...
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub control: ControlCfg,
    pub startup: StartupCfg,
    pub telemetry: TelemetryCfg,
    pub setpoint: SetpointCfg,
    pub logging: Logging,
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        let c = &self.control;
        if c.sample_time_ms == 0 {
            eyre::bail!("control.sample_time_ms must be >= 1");
        }
        for (name, g) in [("kp", c.kp), ("ki", c.ki), ("kd", c.kd)] {
            if !g.is_finite() {
                eyre::bail!("control.{name} must be finite");
            }
            if g < 0.0 {
                eyre::bail!("control.{name} must be >= 0");
            }
        }
        match self.startup.plant {
            1 => {
                if self.startup.combination > 3 {
                    eyre::bail!("startup.combination must be 0..=3 for plant 1");
                }
            }
            2 => {
                if self.startup.combination > 1 {
                    eyre::bail!("startup.combination must be 0..=1 for plant 2");
                }
            }
            other => eyre::bail!("startup.plant must be 1 or 2, got {other}"),
        }
        if self.telemetry.plotter_period_ms == 0 || self.telemetry.broadcast_period_ms == 0 {
            eyre::bail!("telemetry periods must be >= 1 ms");
        }
        for step in &self.setpoint.steps {
            if !(0.0..=1.0).contains(&step.fraction) {
                eyre::bail!(
                    "setpoint step at {} ms has fraction {} outside [0, 1]",
                    step.at_ms,
                    step.fraction
                );
            }
        }
        Ok(())
    }
}

/// Parse and validate a TOML config document.
pub fn from_toml_str(text: &str) -> eyre::Result<Config> {
    let cfg: Config = toml::from_str(text)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Remote reconfiguration record as it arrives off the wire.
///
/// Field groups are applied all-or-nothing by the core: gains need all of
/// kp/ki/kd, a selection change needs both plant and combination. Absent
/// fields are skipped silently.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct UpdateRecord {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub plant: Option<u8>,
    pub combination: Option<u8>,
    #[serde(alias = "setpoint")]
    pub setpoint_volts: Option<f64>,
}
