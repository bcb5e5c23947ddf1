use clap::Parser;
use std::path::PathBuf;

/// Dual-plant PID bench: fixed-period control loop with telemetry readers
/// and stdin JSON reconfiguration.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file (falls back to ./plantbench.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stop after this many milliseconds (runs until ctrl-c when absent)
    #[arg(long)]
    pub run_ms: Option<u64>,

    /// Override control.sample_time_ms
    #[arg(long)]
    pub sample_time_ms: Option<u64>,

    /// Override startup.discharge_ms
    #[arg(long)]
    pub discharge_ms: Option<u64>,

    /// Append broadcast telemetry as JSON lines to this file
    #[arg(long)]
    pub telemetry_json: Option<PathBuf>,

    /// Suppress the CSV plotter on stdout
    #[arg(long)]
    pub quiet: bool,

    /// Enable the time-based setpoint profile
    #[arg(long)]
    pub profile: bool,

    /// Walk through every plant/mux selection periodically
    #[arg(long)]
    pub cycle_selection: bool,

    /// Period of the selection cycler in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub cycle_period_ms: u64,

    /// Lock memory and raise the process to SCHED_FIFO (needs privileges)
    #[arg(long)]
    pub rt: bool,

    /// SCHED_FIFO priority (default: platform maximum)
    #[arg(long)]
    pub rt_prio: Option<i32>,

    /// GPIO pin driving mux line A
    #[cfg(feature = "hardware")]
    #[arg(long)]
    pub mux_pin_a: Option<u8>,

    /// GPIO pin driving mux line B
    #[cfg(feature = "hardware")]
    #[arg(long)]
    pub mux_pin_b: Option<u8>,
}
