//! Memoryless state classification from three timed position samples.

use std::sync::Arc;
use std::time::Instant;

use hand_traits::Clock;

use crate::calibration::FingerCalibration;
use crate::config::EstimatorCfg;
use crate::error::{FingerFault, Result};
use crate::registry::{SharedInput, lock_input};
use crate::sensor::{PositionSensor, SensorReading};
use crate::types::{FingerRuntime, FingerState};

/// Smallest time base used for a velocity; identical timestamps never divide by zero.
const MIN_DT_S: f64 = 1e-6;

/// Result of one estimation, already written back into the runtime record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub state: FingerState,
    /// Latest sample; `None` when the sensor is disconnected.
    pub position_mm: Option<f64>,
    /// Average of the two sample-to-sample velocities.
    pub velocity_mm_s: Option<f64>,
    pub fault: Option<FingerFault>,
}

pub struct StateEstimator {
    sensor: PositionSensor,
    cfg: EstimatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for StateEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateEstimator")
            .field("sensor", &self.sensor)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl StateEstimator {
    pub fn new(
        sensor: PositionSensor,
        cfg: EstimatorCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self { sensor, cfg, clock }
    }

    pub fn sensor(&self) -> &PositionSensor {
        &self.sensor
    }

    /// Sample the finger three times, classify it and store state and position.
    ///
    /// A disconnected sensor on any sample yields `Weird` immediately and leaves
    /// the stored position untouched.
    pub fn estimate(
        &self,
        calib: &FingerCalibration,
        runtime: &mut FingerRuntime,
        input: &SharedInput,
    ) -> Result<Estimate> {
        let mut samples: [(Instant, f64); 3] = [(self.clock.now(), 0.0); 3];
        for i in 0..samples.len() {
            if i > 0 {
                let since = self.clock.now().saturating_duration_since(samples[i - 1].0);
                if since < self.cfg.sample_spacing {
                    self.clock.sleep(self.cfg.sample_spacing - since);
                }
            }
            let t = self.clock.now();
            let reading = {
                let mut guard = lock_input(input);
                self.sensor.read_position(&mut **guard, calib.adc_channel)?
            };
            match reading {
                SensorReading::Position(mm) => samples[i] = (t, mm),
                SensorReading::Disconnected => {
                    tracing::error!(finger = %calib.id, sample = i, "position sensor disconnected");
                    runtime.state = FingerState::Weird;
                    return Ok(Estimate {
                        state: FingerState::Weird,
                        position_mm: None,
                        velocity_mm_s: None,
                        fault: Some(FingerFault::SensorFault),
                    });
                }
            }
        }

        let velocity = average_velocity(&samples);
        let position = samples[2].1;
        let state = classify(&self.cfg, calib, velocity, position, runtime.last_set_pos_mm);
        let fault = match state {
            FingerState::Weird => {
                tracing::warn!(
                    finger = %calib.id,
                    velocity_mm_s = velocity,
                    position_mm = position,
                    "implausible finger speed"
                );
                Some(FingerFault::SpeedFault)
            }
            FingerState::Invalid => {
                tracing::warn!(
                    finger = %calib.id,
                    position_mm = position,
                    last_set_pos_mm = runtime.last_set_pos_mm,
                    "finger stopped at an unplanned position"
                );
                Some(FingerFault::PositionFault)
            }
            _ => None,
        };
        tracing::trace!(
            finger = %calib.id,
            state = %state,
            position_mm = position,
            velocity_mm_s = velocity,
            "estimate"
        );

        runtime.position_mm = position;
        runtime.state = state;
        Ok(Estimate {
            state,
            position_mm: Some(position),
            velocity_mm_s: Some(velocity),
            fault,
        })
    }
}

fn average_velocity(samples: &[(Instant, f64); 3]) -> f64 {
    let v = |a: (Instant, f64), b: (Instant, f64)| {
        let dt = b.0.saturating_duration_since(a.0).as_secs_f64().max(MIN_DT_S);
        (b.1 - a.1) / dt
    };
    (v(samples[0], samples[1]) + v(samples[1], samples[2])) / 2.0
}

/// Classify a finger from its velocity and latest position.
///
/// While stopped, the open bound wins over the closed bound, which wins over
/// the last commanded target.
pub fn classify(
    cfg: &EstimatorCfg,
    calib: &FingerCalibration,
    velocity_mm_s: f64,
    position_mm: f64,
    last_set_pos_mm: f64,
) -> FingerState {
    let speed = velocity_mm_s.abs();
    if !speed.is_finite() || speed >= cfg.implausible_from_mm_s {
        return FingerState::Weird;
    }
    if speed >= cfg.stopped_below_mm_s {
        return if velocity_mm_s > 0.0 {
            FingerState::Opening
        } else {
            FingerState::Closing
        };
    }
    if position_mm >= calib.max_position_mm - cfg.opened_tolerance_mm {
        FingerState::Opened
    } else if position_mm <= calib.min_position_mm + cfg.closed_tolerance_mm {
        FingerState::Closed
    } else if (position_mm - last_set_pos_mm).abs() < cfg.set_pos_tolerance_mm {
        FingerState::SetPos
    } else {
        FingerState::Invalid
    }
}
