//! Shared per-finger records and their access discipline.
//!
//! Every finger owns one mutex covering its runtime record and its actuator
//! driver. `with_finger` is the only way in; the closure is the critical
//! section for "sample, classify, plan, act". The analog input is a separate
//! mutex, always taken after a finger lock and never the other way round.
use std::sync::{Mutex, MutexGuard, PoisonError};

use hand_traits::AnalogInput;

use crate::actuator::ActuatorDriver;
use crate::calibration::{FingerCalibration, FingerId};
use crate::types::FingerRuntime;

/// The ADC shared by every finger's sensor.
pub type SharedInput = Mutex<Box<dyn AnalogInput + Send>>;

pub(crate) fn lock_input(input: &SharedInput) -> MutexGuard<'_, Box<dyn AnalogInput + Send>> {
    input.lock().unwrap_or_else(PoisonError::into_inner)
}

struct FingerRecord {
    runtime: FingerRuntime,
    driver: ActuatorDriver,
}

struct FingerSlot {
    calibration: FingerCalibration,
    record: Mutex<FingerRecord>,
}

/// Everything a unit of work on one finger may touch.
pub struct FingerCtx<'a> {
    pub calibration: &'a FingerCalibration,
    pub runtime: &'a mut FingerRuntime,
    pub driver: &'a ActuatorDriver,
    pub input: &'a SharedInput,
}

pub struct FingerRegistry {
    fingers: [FingerSlot; 4],
    input: SharedInput,
}

impl core::fmt::Debug for FingerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FingerRegistry")
            .field("fingers", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl FingerRegistry {
    /// Assemble the registry; `fingers` must be in `FingerId::ALL` order.
    pub(crate) fn new(
        fingers: [(FingerCalibration, ActuatorDriver); 4],
        input: Box<dyn AnalogInput + Send>,
        initial_set_pos_mm: f64,
    ) -> Self {
        let fingers = fingers.map(|(calibration, driver)| FingerSlot {
            calibration,
            record: Mutex::new(FingerRecord {
                runtime: FingerRuntime::new(initial_set_pos_mm),
                driver,
            }),
        });
        Self {
            fingers,
            input: Mutex::new(input),
        }
    }

    pub fn calibration(&self, id: FingerId) -> &FingerCalibration {
        &self.fingers[id.index()].calibration
    }

    /// Run `f` with exclusive access to finger `id`.
    pub fn with_finger<R>(&self, id: FingerId, f: impl FnOnce(FingerCtx<'_>) -> R) -> R {
        let slot = &self.fingers[id.index()];
        let mut guard = slot.record.lock().unwrap_or_else(PoisonError::into_inner);
        let record = &mut *guard;
        f(FingerCtx {
            calibration: &slot.calibration,
            runtime: &mut record.runtime,
            driver: &record.driver,
            input: &self.input,
        })
    }

    /// Copy of every runtime record, in processing order.
    pub fn snapshot(&self) -> Vec<(FingerId, FingerRuntime)> {
        FingerId::ALL
            .iter()
            .map(|&id| (id, self.with_finger(id, |ctx| ctx.runtime.clone())))
            .collect()
    }

    /// Global stalling condition: raised while any finger is stalled.
    pub fn any_stalling(&self) -> bool {
        FingerId::ALL
            .iter()
            .any(|&id| self.with_finger(id, |ctx| ctx.runtime.stalling))
    }

    /// Abort every finger's pulse. Used on shutdown.
    pub fn release_all(&self) {
        for id in FingerId::ALL {
            self.with_finger(id, |ctx| {
                if let Err(e) = ctx.driver.abort() {
                    tracing::warn!(finger = %id, error = %e, "abort failed during release");
                }
            });
        }
    }
}
