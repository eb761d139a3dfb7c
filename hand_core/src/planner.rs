//! Instruction to timed-pulse planning.

use crate::calibration::FingerCalibration;
use crate::config::PlannerCfg;
use crate::types::{Direction, FingerRuntime, FingerState, Instruction, PlannedCommand};
use crate::util::MICROS_PER_SEC;

#[derive(Debug, Clone, Default)]
pub struct MovementPlanner {
    cfg: PlannerCfg,
}

impl MovementPlanner {
    pub fn new(cfg: PlannerCfg) -> Self {
        Self { cfg }
    }

    /// Shaft position requested by `instruction`.
    #[inline]
    pub fn target_mm(calib: &FingerCalibration, instruction: Instruction) -> f64 {
        calib.min_position_mm + calib.range_mm() * instruction.value()
    }

    /// Plan the pulse that brings the finger to `instruction`, or `None` when it
    /// already satisfies it. Records the target in `runtime.last_set_pos_mm`
    /// whenever a command is produced.
    pub fn plan(
        &self,
        calib: &FingerCalibration,
        runtime: &mut FingerRuntime,
        instruction: Instruction,
    ) -> Option<PlannedCommand> {
        if instruction == Instruction::OPEN && runtime.state == FingerState::Opened {
            return None;
        }
        if instruction == Instruction::CLOSE && runtime.state == FingerState::Closed {
            return None;
        }

        let target = Self::target_mm(calib, instruction);
        if (runtime.position_mm - target).abs() <= self.cfg.target_tolerance_mm
            && runtime.state == FingerState::SetPos
        {
            return None;
        }

        let delta = target - runtime.position_mm;
        let direction = if delta < 0.0 {
            Direction::Contract
        } else {
            Direction::Extend
        };
        let base_us = travel_us(delta, calib.max_speed_mm_s);
        let reversing = matches!(
            (direction, runtime.state),
            (Direction::Contract, FingerState::Opening) | (Direction::Extend, FingerState::Closing)
        );
        let duration_us = if reversing {
            (base_us as f64 * self.cfg.reversal_factor).round() as u64
        } else {
            base_us
        };

        runtime.last_set_pos_mm = target;
        tracing::debug!(
            finger = %calib.id,
            target_mm = target,
            position_mm = runtime.position_mm,
            duration_us,
            reversing,
            "planned"
        );
        Some(PlannedCommand {
            direction,
            speed_mm_s: calib.max_speed_mm_s,
            duration_us,
        })
    }

    /// Bounded nudge from `position_mm` back toward `target_mm`, or `None`
    /// inside `tolerance_mm`. Used by the observer for idle drift.
    pub fn corrective(
        calib: &FingerCalibration,
        target_mm: f64,
        position_mm: f64,
        tolerance_mm: f64,
        max_duration_us: u64,
    ) -> Option<PlannedCommand> {
        let drift = target_mm - position_mm;
        if drift.abs() <= tolerance_mm {
            return None;
        }
        let direction = if drift < 0.0 {
            Direction::Contract
        } else {
            Direction::Extend
        };
        Some(PlannedCommand {
            direction,
            speed_mm_s: calib.max_speed_mm_s,
            duration_us: travel_us(drift, calib.max_speed_mm_s).min(max_duration_us),
        })
    }
}

/// Full-speed travel time for `distance_mm`, in microseconds.
fn travel_us(distance_mm: f64, speed_mm_s: f64) -> u64 {
    if speed_mm_s <= 0.0 {
        return 0;
    }
    (distance_mm.abs() / speed_mm_s * MICROS_PER_SEC as f64).round() as u64
}
