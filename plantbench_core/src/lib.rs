#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Concurrent PID control core (hardware-agnostic).
//!
//! This crate holds the control loop of the dual-plant bench. All hardware
//! interactions go through the `plantbench_traits::PlantIo` and
//! `plantbench_traits::MuxPins` traits.
//!
//! ## Architecture
//!
//! - **State**: one guarded record shared by every task (`state` module)
//! - **PID**: discrete compute step with anti-windup and
//!   derivative-on-measurement (`pid` module)
//! - **Selection**: plant/mux line mapping and reporting (`mux` module)
//! - **Scheduling**: fixed-period timer feeding a coalescing single-slot
//!   wakeup (`timer` module)
//! - **Tasks**: control loop, telemetry readers, setpoint profile
//!   (`control_task`, `telemetry`, `setpoint` modules)
//! - **Reconfiguration**: partial remote updates (`update` module)
//! - **Bring-up**: builder, discharge sequence, task spawning (`runner`)
//!
//! ## Scale convention
//!
//! Setpoint and measurement live on the 12-bit sensor scale (0..=4095);
//! control output and the integral accumulator live on the 8-bit actuator
//! scale (0..=255). The mismatch is part of the loop's tuned behavior and is
//! preserved as-is; conversion to volts happens only at the I/O boundaries
//! (`conversions` module).

pub mod control_task;
pub mod conversions;
pub mod error;
pub mod mocks;
pub mod mux;
pub mod pid;
pub mod runner;
pub mod setpoint;
pub mod state;
pub mod telemetry;
pub mod timer;
pub mod update;

mod hw_error;

pub use control_task::{ControlLoop, ControlTask, SETTLE_DELAY};
pub use error::{BuildError, ControlError, Result};
pub use mux::{LineLevels, advance_selection, line_levels, report_selection, select_lines};
pub use pid::Gains;
pub use runner::{System, SystemBuilder};
pub use setpoint::{SetpointProfile, SetpointTask};
pub use state::{ControlState, PlantSelection, SharedState};
pub use telemetry::{ChannelBroadcast, TelemetryTask};
pub use timer::{SampleTimer, TickNotifier, TickWaiter, tick_slot};
pub use update::{ConfigUpdate, apply_update};
