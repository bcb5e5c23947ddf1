//! CLI-side telemetry sinks.

use plantbench_traits::{TelemetryFrame, TelemetrySink};
use std::io::Write;

/// Serial-plotter style CSV on stdout: `sp_volts,y_volts` with four
/// decimals, one line per sample.
#[derive(Debug, Default)]
pub struct CsvStdoutSink;

impl CsvStdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for CsvStdoutSink {
    fn publish(
        &mut self,
        frame: &TelemetryFrame,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{:.4},{:.4}", frame.sp_volts, frame.y_volts)?;
        Ok(())
    }
}

/// Render one broadcast frame as the wire JSON line.
pub fn frame_to_json(frame: &TelemetryFrame) -> String {
    serde_json::json!({
        "time": frame.timestamp_ms,
        "sp_v": frame.sp_volts,
        "y_v": frame.y_volts,
    })
    .to_string()
}
