use thiserror::Error;

/// Typed hardware faults surfaced by plant and mux implementations.
#[derive(Debug, Error, Clone)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("plant {0} is not wired")]
    NotWired(u8),
    #[error("hardware fault: {0}")]
    Fault(String),
}
