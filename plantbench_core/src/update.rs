//! Remote reconfiguration: partial updates applied under the state lock.

use crate::conversions::{VCC, volts_to_code};
use crate::mux::report_selection;
use crate::pid::Gains;
use crate::state::{PlantSelection, SharedState};
use plantbench_config::UpdateRecord;

/// A parsed reconfiguration request. Field groups apply all-or-nothing:
/// gains need all of `kp`/`ki`/`kd`, a selection change needs both `plant`
/// and `combination`. Absent fields are skipped without any failure signal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigUpdate {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub plant: Option<u8>,
    pub combination: Option<u8>,
    pub setpoint_volts: Option<f64>,
}

impl ConfigUpdate {
    /// The complete gain triple, if all three fields arrived.
    pub fn gains(&self) -> Option<Gains> {
        Some(Gains {
            kp: self.kp?,
            ki: self.ki?,
            kd: self.kd?,
        })
    }
}

impl From<UpdateRecord> for ConfigUpdate {
    fn from(rec: UpdateRecord) -> Self {
        Self {
            kp: rec.kp,
            ki: rec.ki,
            kd: rec.kd,
            plant: rec.plant,
            combination: rec.combination,
            setpoint_volts: rec.setpoint_volts,
        }
    }
}

/// Apply one update. Everything lands in a single lock acquisition; the
/// selection report is emitted afterwards, outside the lock.
///
/// An update may land between any two steps of a control cycle: its gain and
/// setpoint changes are visible to that cycle's compute, while a selection
/// change only takes effect on the next cycle's snapshot.
pub fn apply_update(state: &SharedState, update: &ConfigUpdate) {
    let gains = update.gains();

    let selection = match (update.plant, update.combination) {
        (Some(plant), Some(combination)) => match PlantSelection::from_raw(plant, combination) {
            Some(sel) => Some(sel),
            None => {
                tracing::debug!(plant, combination, "ignoring invalid selection update");
                None
            }
        },
        _ => None,
    };

    let sp = update
        .setpoint_volts
        .map(|v| volts_to_code(v.clamp(0.0, VCC)));

    state.with(|s| {
        if let Some(g) = gains {
            s.set_tunings(g);
        }
        if let Some(sel) = selection {
            s.selection = sel;
        }
        if let Some(code) = sp {
            s.sp = code;
        }
    });

    if let Some(sel) = selection
        && let Some(line) = report_selection(sel.plant.as_raw(), sel.combination)
    {
        tracing::info!("{line}");
    }
}
