//! Time-based setpoint profile.
//!
//! An optional demo task that steps the setpoint through a schedule of
//! `(at_ms, fraction)` points: at each poll the latest step whose time has
//! passed wins. Before the first step the setpoint is left alone.

use crate::conversions::ADC_FULL_SCALE;
use crate::state::SharedState;
use plantbench_config::SetpointStep;
use plantbench_traits::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How often the profile is evaluated against elapsed time.
pub const PROFILE_POLL_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct SetpointProfile {
    steps: Vec<SetpointStep>,
}

impl SetpointProfile {
    pub fn new(mut steps: Vec<SetpointStep>) -> Self {
        steps.sort_by_key(|s| s.at_ms);
        Self { steps }
    }

    /// The bench's classic demo schedule: 80 % of full scale five seconds
    /// after discharge, 20 % ten seconds after.
    pub fn demo(discharge_ms: u64) -> Self {
        Self::new(vec![
            SetpointStep {
                at_ms: discharge_ms + 5_000,
                fraction: 0.8,
            },
            SetpointStep {
                at_ms: discharge_ms + 10_000,
                fraction: 0.2,
            },
        ])
    }

    /// Setpoint code active at `now_ms`, or `None` before the first step.
    pub fn target_code_at(&self, now_ms: u64) -> Option<f64> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.at_ms <= now_ms)
            .map(|s| s.fraction * ADC_FULL_SCALE)
    }
}

/// Thread applying the profile to the shared setpoint every poll period.
pub struct SetpointTask {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl SetpointTask {
    pub fn spawn<C: Clock + Send + Sync + 'static>(
        state: Arc<SharedState>,
        profile: SetpointProfile,
        clock: C,
        epoch: Instant,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                clock.sleep(PROFILE_POLL_PERIOD);
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                if let Some(code) = profile.target_code_at(clock.ms_since(epoch)) {
                    state.with(|s| s.sp = code);
                }
            }
            tracing::trace!("setpoint task exiting");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for SetpointTask {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "setpoint task thread panicked during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn before_first_step_nothing_applies() {
        let p = SetpointProfile::demo(8_000);
        assert_eq!(p.target_code_at(0), None);
        assert_eq!(p.target_code_at(12_999), None);
    }

    #[test]
    fn latest_passed_step_wins() {
        let p = SetpointProfile::demo(8_000);
        let high = p.target_code_at(13_000).expect("first step active");
        assert!((high - 0.8 * ADC_FULL_SCALE).abs() < 1e-9);
        let low = p.target_code_at(60_000).expect("second step active");
        assert!((low - 0.2 * ADC_FULL_SCALE).abs() < 1e-9);
    }

    #[test]
    fn unsorted_steps_are_ordered_on_construction() {
        let p = SetpointProfile::new(vec![
            SetpointStep {
                at_ms: 200,
                fraction: 0.5,
            },
            SetpointStep {
                at_ms: 100,
                fraction: 0.9,
            },
        ]);
        let code = p.target_code_at(150).expect("first step active");
        assert!((code - 0.9 * ADC_FULL_SCALE).abs() < 1e-9);
    }
}
