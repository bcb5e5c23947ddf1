//! Plant/mux selection: line mapping, selection, reporting, demo cycling.

use crate::error::Result;
use crate::hw_error::map_hw_error_dyn;
use crate::state::PlantSelection;
use eyre::WrapErr;
use plantbench_traits::{MuxPins, PlantId};

/// Levels of the two mux select lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLevels {
    pub in_a: bool,
    pub in_b: bool,
}

/// Highest valid mux combination for a plant.
pub fn max_combination(plant: PlantId) -> u8 {
    match plant {
        PlantId::Plant1 => 3,
        PlantId::Plant2 => 1,
    }
}

/// Map a raw `(plant id, combination)` pair to select-line levels.
///
/// Plant 1 uses both bits of the combination (A = bit 1, B = bit 0); plant 2
/// holds A low and raises B only for combination 1. An unknown plant id maps
/// to `None`, which callers treat as a silent no-op. Out-of-range
/// combinations are not rejected here: their bit semantics are part of the
/// preserved behavior.
pub fn line_levels(plant_id: u8, combination: u8) -> Option<LineLevels> {
    match PlantId::from_raw(plant_id) {
        Some(PlantId::Plant1) => Some(LineLevels {
            in_a: combination & 0b10 != 0,
            in_b: combination & 0b01 != 0,
        }),
        Some(PlantId::Plant2) => Some(LineLevels {
            in_a: false,
            in_b: combination == 1,
        }),
        None => None,
    }
}

/// Drive the mux lines for a selection. Unknown plant ids change nothing.
pub fn select_lines<M: MuxPins>(mux: &mut M, plant_id: u8, combination: u8) -> Result<()> {
    if let Some(levels) = line_levels(plant_id, combination) {
        mux.set_lines(levels.in_a, levels.in_b)
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("mux select")?;
    }
    Ok(())
}

/// Render the selection report line, or nothing for an unknown plant id or
/// an out-of-range combination.
pub fn report_selection(plant_id: u8, combination: u8) -> Option<String> {
    let plant = PlantId::from_raw(plant_id)?;
    if combination > max_combination(plant) {
        return None;
    }
    let levels = line_levels(plant_id, combination)?;
    let level = |high: bool| if high { "HIGH" } else { "LOW" };
    Some(format!(
        ">> {plant} | combination {combination} (mux: IN_A={}, IN_B={})",
        level(levels.in_a),
        level(levels.in_b)
    ))
}

/// Demo state machine: walk plant 1 through combinations 0..=3, then plant 2
/// through 0..=1, then wrap back to plant 1 combination 0.
pub fn advance_selection(sel: PlantSelection) -> PlantSelection {
    match sel.plant {
        PlantId::Plant1 if sel.combination < 3 => PlantSelection {
            plant: PlantId::Plant1,
            combination: sel.combination + 1,
        },
        PlantId::Plant1 => PlantSelection {
            plant: PlantId::Plant2,
            combination: 0,
        },
        PlantId::Plant2 if sel.combination < 1 => PlantSelection {
            plant: PlantId::Plant2,
            combination: sel.combination + 1,
        },
        PlantId::Plant2 => PlantSelection {
            plant: PlantId::Plant1,
            combination: 0,
        },
    }
}
