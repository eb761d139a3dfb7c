//! Per-pass reports of the control loop and the observer.

use crate::calibration::FingerId;
use crate::error::{FingerFault, HandError};
use crate::types::{FingerState, PlannedCommand};

/// What the control loop did with one finger during one pass.
#[derive(Debug, Clone)]
pub enum FingerOutcome {
    /// No instruction received yet; state estimated only.
    Estimated(FingerState),
    /// Finger already satisfies its instruction.
    Holding(FingerState),
    /// A pulse was issued.
    Commanded(PlannedCommand),
    /// A pulse toward the same instruction is still running.
    InFlight,
    /// Skipped because of a per-finger fault.
    Faulted(FingerFault),
    /// Hardware access failed; retried next pass.
    Failed(HandError),
}

/// What the observer did with one finger during one pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverOutcome {
    Idle,
    /// Pulse in flight; first sample of this stroke recorded.
    Watching,
    /// Pulse in flight and the shaft moved.
    Moving,
    /// Pulse in flight but the shaft did not move; aborted.
    Stalled,
    /// Idle drift corrected by a bounded pulse.
    Corrected(PlannedCommand),
    /// Sensor disconnected; finger skipped.
    Disconnected,
    /// Both direction lines read high (or unreadable); forced low.
    LineConflict,
    /// Hardware access failed.
    Failed(String),
}

/// Outcomes of one pass, in processing order.
#[derive(Debug, Clone)]
pub struct CycleReport<T> {
    pub outcomes: Vec<(FingerId, T)>,
}

impl<T> CycleReport<T> {
    pub fn get(&self, id: FingerId) -> Option<&T> {
        self.outcomes
            .iter()
            .find_map(|(fid, o)| (*fid == id).then_some(o))
    }
}
