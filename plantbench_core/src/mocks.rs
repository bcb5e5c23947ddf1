//! Test and helper mocks for plantbench_core.

use plantbench_traits::{Clock, MuxPins, PlantId, PlantIo, TelemetryFrame, TelemetrySink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Deterministic clock whose time only moves when asked. `sleep` advances
/// virtual time instead of blocking, so control cycles run instantly in
/// tests while elapsed-time logic still observes the delays.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut off = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *off = off.saturating_add(d);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let off = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + *off
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[derive(Debug, Default)]
struct ScriptedPlantInner {
    readings: Vec<f64>,
    idx: usize,
    writes: Vec<(PlantId, u8)>,
    reads: Vec<PlantId>,
}

/// Plant that returns a fixed voltage sequence (repeating the last value)
/// and records every read and write. Clones share the script and the log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlant {
    inner: Arc<Mutex<ScriptedPlantInner>>,
}

impl ScriptedPlant {
    pub fn new(readings: impl Into<Vec<f64>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedPlantInner {
                readings: readings.into(),
                ..ScriptedPlantInner::default()
            })),
        }
    }

    pub fn writes(&self) -> Vec<(PlantId, u8)> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.writes.clone()
    }

    pub fn reads(&self) -> Vec<PlantId> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.reads.clone()
    }
}

impl PlantIo for ScriptedPlant {
    fn read_voltage(
        &mut self,
        plant: PlantId,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.reads.push(plant);
        let v = if inner.idx < inner.readings.len() {
            let v = inner.readings[inner.idx];
            inner.idx += 1;
            v
        } else {
            inner.readings.last().copied().unwrap_or(0.0)
        };
        Ok(v)
    }

    fn write_control(
        &mut self,
        plant: PlantId,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.writes.push((plant, duty));
        Ok(())
    }
}

/// A plant whose sensor always errors; writes succeed. Useful for driving
/// the failure path of a control cycle.
pub struct NoopPlant;

impl PlantIo for NoopPlant {
    fn read_voltage(
        &mut self,
        _plant: PlantId,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop plant")))
    }

    fn write_control(
        &mut self,
        _plant: PlantId,
        _duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Mux that records every line-level pair it was driven to.
#[derive(Debug, Clone, Default)]
pub struct RecordingMux {
    sets: Arc<Mutex<Vec<(bool, bool)>>>,
}

impl RecordingMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sets(&self) -> Vec<(bool, bool)> {
        let sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        sets.clone()
    }
}

impl MuxPins for RecordingMux {
    fn set_lines(
        &mut self,
        in_a: bool,
        in_b: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        sets.push((in_a, in_b));
        Ok(())
    }
}

/// Sink collecting frames, with an adjustable subscriber count so tests can
/// exercise the skip-when-nobody-listens gate.
#[derive(Debug, Clone)]
pub struct CollectingSink {
    frames: Arc<Mutex<Vec<TelemetryFrame>>>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new(1)
    }
}

impl CollectingSink {
    pub fn new(subscribers: usize) -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            subscribers: Arc::new(AtomicUsize::new(subscribers)),
        }
    }

    pub fn set_subscribers(&self, n: usize) {
        self.subscribers.store(n, Ordering::Relaxed);
    }

    pub fn frames(&self) -> Vec<TelemetryFrame> {
        let frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.clone()
    }
}

impl TelemetrySink for CollectingSink {
    fn publish(
        &mut self,
        frame: &TelemetryFrame,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.push(*frame);
        Ok(())
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }
}
