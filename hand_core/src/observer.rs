//! Stall and drift supervision, scheduled independently of the control loop.
//!
//! Each pass reads the direction actually asserted on every finger's lines
//! and its sensed position:
//!
//! - driving, same stroke as last pass, shaft moved less than epsilon: stall,
//!   abort the pulse and flag the finger;
//! - driving and moving: clear the finger's stall flag;
//! - idle while no finger is stalled: nudge back toward the last target with a
//!   bounded pulse when the drift exceeds tolerance.
use std::sync::Arc;

use hand_traits::Clock;

use crate::calibration::FingerId;
use crate::config::ObserverCfg;
use crate::error::Result;
use crate::planner::MovementPlanner;
use crate::registry::{FingerCtx, FingerRegistry, lock_input};
use crate::sensor::{PositionSensor, SensorReading};
use crate::status::{CycleReport, ObserverOutcome};
use crate::types::{Direction, FingerState};
use crate::worker::Worker;

/// Rounding slack when comparing travel against epsilon; a move of exactly
/// epsilon counts as motion.
const TRAVEL_SLACK_MM: f64 = 1e-9;

/// What the observer saw on a finger during its previous pass.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    stroke: u64,
    position_mm: f64,
}

#[derive(Debug)]
pub struct StallObserver {
    registry: Arc<FingerRegistry>,
    sensor: PositionSensor,
    cfg: ObserverCfg,
    memory: [Option<Observation>; 4],
}

impl StallObserver {
    pub fn new(registry: Arc<FingerRegistry>, sensor: PositionSensor, cfg: ObserverCfg) -> Self {
        Self {
            registry,
            sensor,
            cfg,
            memory: [None; 4],
        }
    }

    /// Global stalling condition.
    pub fn is_stalling(&self) -> bool {
        self.registry.any_stalling()
    }

    pub fn observe_cycle(&mut self) -> CycleReport<ObserverOutcome> {
        let mut stalling = self.registry.any_stalling();
        let mut outcomes = Vec::with_capacity(FingerId::ALL.len());
        for id in FingerId::ALL {
            let memory = &mut self.memory[id.index()];
            let outcome = self.registry.with_finger(id, |ctx| {
                observe_finger(&self.sensor, &self.cfg, ctx, stalling, memory)
            });
            match outcome {
                ObserverOutcome::Stalled => stalling = true,
                ObserverOutcome::Moving if stalling => stalling = self.registry.any_stalling(),
                _ => {}
            }
            outcomes.push((id, outcome));
        }
        CycleReport { outcomes }
    }

    /// Run passes on a dedicated thread at the configured cadence.
    pub fn spawn(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Result<Worker> {
        let period = self.cfg.period;
        Worker::spawn("observer", period, clock, move || {
            let report = self.observe_cycle();
            tracing::trace!(?report, "observer pass");
        })
    }
}

fn observe_finger(
    sensor: &PositionSensor,
    cfg: &ObserverCfg,
    ctx: FingerCtx<'_>,
    stalling: bool,
    memory: &mut Option<Observation>,
) -> ObserverOutcome {
    let FingerCtx {
        calibration,
        runtime,
        driver,
        input,
    } = ctx;
    let id = calibration.id;

    let (direction, conflict) = match driver.live_direction() {
        Ok(d) => (d, false),
        Err(e) => {
            tracing::error!(finger = %id, error = %e, "direction lines in conflict; forcing low");
            if let Err(e) = driver.abort() {
                tracing::error!(finger = %id, error = %e, "abort failed");
            }
            (Direction::None, true)
        }
    };

    let reading = {
        let mut guard = lock_input(input);
        sensor.read_position(&mut **guard, calibration.adc_channel)
    };
    let position = match reading {
        Ok(SensorReading::Position(mm)) => mm,
        Ok(SensorReading::Disconnected) => {
            tracing::error!(finger = %id, "position sensor disconnected; skipping");
            *memory = None;
            return ObserverOutcome::Disconnected;
        }
        Err(e) => {
            tracing::warn!(finger = %id, error = %e, "observer read failed");
            *memory = None;
            return ObserverOutcome::Failed(e.to_string());
        }
    };

    let outcome = if direction != Direction::None {
        match *memory {
            Some(prev) if prev.stroke == runtime.stroke_num => {
                let moved = (position - prev.position_mm).abs();
                if moved + TRAVEL_SLACK_MM < cfg.stall_epsilon_mm {
                    if let Err(e) = driver.abort() {
                        tracing::error!(finger = %id, error = %e, "abort failed");
                    }
                    runtime.stalling = true;
                    runtime.stalled_instruction = runtime.last_instruction;
                    runtime.state = FingerState::Invalid;
                    tracing::error!(
                        finger = %id,
                        position_mm = position,
                        moved_mm = moved,
                        stroke = runtime.stroke_num,
                        "actuator stalled; pulse aborted"
                    );
                    ObserverOutcome::Stalled
                } else {
                    if runtime.stalling {
                        tracing::info!(finger = %id, "motion confirmed; stall cleared");
                    }
                    runtime.stalling = false;
                    runtime.stalled_instruction = None;
                    ObserverOutcome::Moving
                }
            }
            _ => ObserverOutcome::Watching,
        }
    } else if conflict {
        ObserverOutcome::LineConflict
    } else if stalling {
        ObserverOutcome::Idle
    } else {
        match MovementPlanner::corrective(
            calibration,
            runtime.last_set_pos_mm,
            position,
            cfg.drift_tolerance_mm,
            cfg.max_correction_us,
        ) {
            None => ObserverOutcome::Idle,
            Some(cmd) => match driver.execute(runtime, &cmd) {
                Ok(()) => {
                    tracing::info!(
                        finger = %id,
                        position_mm = position,
                        target_mm = runtime.last_set_pos_mm,
                        duration_us = cmd.duration_us,
                        "drift corrected"
                    );
                    ObserverOutcome::Corrected(cmd)
                }
                Err(e) => {
                    tracing::warn!(finger = %id, error = %e, "drift correction failed");
                    ObserverOutcome::Failed(e.to_string())
                }
            },
        }
    };

    *memory = Some(Observation {
        stroke: runtime.stroke_num,
        position_mm: position,
    });
    outcome
}
