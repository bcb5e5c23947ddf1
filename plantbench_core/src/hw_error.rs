//! Mapping of boxed collaborator errors to typed core errors.

use crate::error::ControlError;

/// Map any error surfaced by a hardware collaborator to a typed
/// `ControlError`, downcasting to the hardware crate's error when enabled.
pub(crate) fn map_hw_error_dyn(e: &(dyn std::error::Error + 'static)) -> ControlError {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = e.downcast_ref::<plantbench_hardware::HwError>() {
        return ControlError::HardwareFault(hw.to_string());
    }
    ControlError::Hardware(e.to_string())
}
