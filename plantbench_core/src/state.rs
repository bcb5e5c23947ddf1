//! The shared control record and its locking discipline.
//!
//! One `SharedState` exists per process. Every cross-task access goes
//! through `snapshot`/`with`, so no call site can touch the record outside
//! the lock. Critical sections must stay short and free of I/O: the lock is
//! an unbounded wait for everyone, and a task that stalls while holding it
//! stalls the whole system.

use crate::conversions::ADC_FULL_SCALE;
use crate::mux::max_combination;
use plantbench_traits::PlantId;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Which plant is wired in, and through which mux combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantSelection {
    pub plant: PlantId,
    pub combination: u8,
}

impl PlantSelection {
    /// Validate a raw wire pair. `None` when the plant id is unknown or the
    /// combination is out of range for that plant.
    pub fn from_raw(plant: u8, combination: u8) -> Option<Self> {
        let plant = PlantId::from_raw(plant)?;
        (combination <= max_combination(plant)).then_some(Self { plant, combination })
    }
}

/// The single control record. See the crate docs for the scale convention.
///
/// The control task writes `y`, `u`, `i_term`, `last_y`; the remote update
/// handler writes `sp`, the gains, and `selection`. Both only ever do so
/// through [`SharedState`].
#[derive(Debug, Clone, Copy)]
pub struct ControlState {
    /// Control output, 0..=255, always clamped.
    pub u: f64,
    /// Measured process value, 0..=4095.
    pub y: f64,
    /// Setpoint, 0..=4095.
    pub sp: f64,
    /// Integral accumulator, 0..=255, clamped (anti-windup).
    pub i_term: f64,
    /// Previous measurement, for the derivative-on-measurement term.
    pub last_y: f64,
    /// Proportional gain, raw.
    pub kp: f64,
    /// Integral gain, pre-scaled by the sample period.
    pub ki: f64,
    /// Derivative gain, pre-scaled by the sample period.
    pub kd: f64,
    pub selection: PlantSelection,
    /// Fixed sample period of the loop; captured once so re-tuning can
    /// pre-scale without a global constant.
    pub sample_time: Duration,
}

impl ControlState {
    /// Fresh startup state: dynamics zeroed, setpoint at 50 % of full scale,
    /// gains left at zero until the initial tunings are applied.
    pub fn new(sample_time: Duration, selection: PlantSelection) -> Self {
        Self {
            u: 0.0,
            y: 0.0,
            sp: 0.5 * ADC_FULL_SCALE,
            i_term: 0.0,
            last_y: 0.0,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            selection,
            sample_time,
        }
    }
}

/// Mutex-guarded owner of the control record.
#[derive(Debug)]
pub struct SharedState {
    inner: Mutex<ControlState>,
}

impl SharedState {
    pub fn new(state: ControlState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Run a short mutation (or read) under the lock. The closure must not
    /// perform I/O or block.
    pub fn with<R>(&self, f: impl FnOnce(&mut ControlState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Copy of the whole record for lock-free use afterwards.
    pub fn snapshot(&self) -> ControlState {
        self.with(|s| *s)
    }

    /// Copy of just the plant selection (the control cycle's first touch).
    pub fn selection(&self) -> PlantSelection {
        self.with(|s| s.selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_state_matches_contract() {
        let sel = PlantSelection::from_raw(1, 0).expect("valid");
        let s = ControlState::new(Duration::from_millis(200), sel);
        assert_eq!(s.sp, 0.5 * ADC_FULL_SCALE);
        assert_eq!(s.u, 0.0);
        assert_eq!(s.y, 0.0);
        assert_eq!(s.i_term, 0.0);
        assert_eq!(s.last_y, 0.0);
    }

    #[test]
    fn raw_selection_validation() {
        assert!(PlantSelection::from_raw(1, 3).is_some());
        assert!(PlantSelection::from_raw(1, 4).is_none());
        assert!(PlantSelection::from_raw(2, 1).is_some());
        assert!(PlantSelection::from_raw(2, 2).is_none());
        assert!(PlantSelection::from_raw(0, 0).is_none());
        assert!(PlantSelection::from_raw(3, 0).is_none());
    }

    #[test]
    fn with_sees_previous_mutations() {
        let sel = PlantSelection::from_raw(2, 1).expect("valid");
        let shared = SharedState::new(ControlState::new(Duration::from_millis(200), sel));
        shared.with(|s| s.y = 1234.0);
        assert_eq!(shared.snapshot().y, 1234.0);
        assert_eq!(shared.selection().combination, 1);
    }
}
