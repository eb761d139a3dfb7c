//! The per-finger control loop: estimate, plan, act.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use hand_traits::Clock;

use crate::calibration::FingerId;
use crate::error::{FingerFault, Result, hand_error_of};
use crate::estimator::StateEstimator;
use crate::planner::MovementPlanner;
use crate::registry::{FingerCtx, FingerRegistry};
use crate::status::{CycleReport, FingerOutcome};
use crate::types::{FingerState, Instruction, InstructionSnapshot};
use crate::worker::Worker;

#[derive(Debug)]
pub struct ControlLoop {
    registry: Arc<FingerRegistry>,
    estimator: StateEstimator,
    planner: MovementPlanner,
    instructions: xch::Receiver<InstructionSnapshot>,
    current: Option<InstructionSnapshot>,
}

impl ControlLoop {
    pub fn new(
        registry: Arc<FingerRegistry>,
        estimator: StateEstimator,
        planner: MovementPlanner,
        instructions: xch::Receiver<InstructionSnapshot>,
        initial: Option<InstructionSnapshot>,
    ) -> Self {
        Self {
            registry,
            estimator,
            planner,
            instructions,
            current: initial,
        }
    }

    /// Instruction snapshot in force.
    pub fn current(&self) -> Option<InstructionSnapshot> {
        self.current
    }

    /// One pass over every finger in fixed order.
    ///
    /// Only the latest pending snapshot is applied; earlier ones are dropped.
    pub fn run_cycle(&mut self) -> CycleReport<FingerOutcome> {
        if let Some(latest) = self.instructions.try_iter().last() {
            if self.current != Some(latest) {
                tracing::info!(instructions = ?latest.0.map(Instruction::value), "new instructions");
            }
            self.current = Some(latest);
        }
        let current = self.current;
        let outcomes = FingerId::ALL
            .iter()
            .map(|&id| {
                let instruction = current.map(|s| s.get(id));
                let outcome = self
                    .registry
                    .with_finger(id, |ctx| self.step(ctx, instruction));
                (id, outcome)
            })
            .collect();
        CycleReport { outcomes }
    }

    fn step(&self, ctx: FingerCtx<'_>, instruction: Option<Instruction>) -> FingerOutcome {
        let FingerCtx {
            calibration,
            runtime,
            driver,
            input,
        } = ctx;

        let estimate = match self.estimator.estimate(calibration, runtime, input) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(finger = %calibration.id, error = %e, "estimate failed");
                return FingerOutcome::Failed(hand_error_of(&e));
            }
        };
        if estimate.state == FingerState::Weird {
            return FingerOutcome::Faulted(estimate.fault.unwrap_or(FingerFault::SensorFault));
        }
        let Some(instruction) = instruction else {
            return FingerOutcome::Estimated(estimate.state);
        };

        if runtime.stalling {
            if runtime.stalled_instruction == Some(instruction) {
                return FingerOutcome::Faulted(FingerFault::StallFault);
            }
            tracing::info!(finger = %calibration.id, "new instruction clears stall");
            runtime.stalling = false;
            runtime.stalled_instruction = None;
        }

        if driver.is_pulsing() && runtime.last_instruction == Some(instruction) {
            return FingerOutcome::InFlight;
        }

        let Some(cmd) = self.planner.plan(calibration, runtime, instruction) else {
            return FingerOutcome::Holding(estimate.state);
        };
        runtime.last_instruction = Some(instruction);
        match driver.execute(runtime, &cmd) {
            Ok(()) => FingerOutcome::Commanded(cmd),
            Err(e) => {
                tracing::warn!(finger = %calibration.id, error = %e, "pulse failed");
                FingerOutcome::Failed(hand_error_of(&e))
            }
        }
    }

    /// Run passes on a dedicated thread, `period` apart.
    pub fn spawn(mut self, period: Duration, clock: Arc<dyn Clock + Send + Sync>) -> Result<Worker> {
        Worker::spawn("control", period, clock, move || {
            let report = self.run_cycle();
            tracing::trace!(?report, "control pass");
        })
    }
}
