use thiserror::Error;

use crate::calibration::FingerId;

/// Per-finger fault classes. None of them is fatal to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerFault {
    /// Sensor unplugged or reading unusable.
    SensorFault,
    /// Finger stopped away from every known position.
    PositionFault,
    /// Velocity beyond what the actuator can physically do.
    SpeedFault,
    /// Actuator driven but the shaft did not move.
    StallFault,
}

impl core::fmt::Display for FingerFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::SensorFault => "sensor fault",
            Self::PositionFault => "position fault",
            Self::SpeedFault => "speed fault",
            Self::StallFault => "stall",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone)]
pub enum HandError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{finger}: {fault}")]
    Fault { finger: FingerId, fault: FingerFault },
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing analog input")]
    MissingInput,
    #[error("missing direction lines")]
    MissingLines,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Recover the typed error behind a report, falling back to its message.
pub fn hand_error_of(report: &eyre::Report) -> HandError {
    report
        .downcast_ref::<HandError>()
        .cloned()
        .unwrap_or_else(|| HandError::Hardware(report.to_string()))
}
