//! `From` implementations bridging `hand_config` types to `hand_core` types.

use crate::calibration::{FingerCalibration, FingerId, default_table};
use crate::config::{ControlCfg, EstimatorCfg, HandSettings, ObserverCfg, PlannerCfg, SensorCfg};
use crate::error::HandError;
use crate::pose::{Pose, PoseMap};
use crate::types::InstructionSnapshot;
use crate::util::period_from_ms;
use std::time::Duration;

// ── Sensor ───────────────────────────────────────────────────────────────────

impl From<&hand_config::SensorCfg> for SensorCfg {
    fn from(c: &hand_config::SensorCfg) -> Self {
        Self {
            samples: c.samples,
            mv_per_count: c.mv_per_count,
            mv_offset: c.mv_offset,
            mm_per_mv: c.mm_per_mv,
            mm_offset: c.mm_offset,
            disconnected_mv: c.disconnected_mv,
        }
    }
}

impl SensorCfg {
    /// Replace the voltage to position transform with a fitted one.
    pub fn apply_calibration(&mut self, cal: &hand_config::SensorCalibration) {
        self.mm_per_mv = cal.mm_per_mv;
        self.mm_offset = cal.mm_offset;
    }
}

// ── Estimator / planner / observer / control ─────────────────────────────────

impl From<&hand_config::EstimatorCfg> for EstimatorCfg {
    fn from(c: &hand_config::EstimatorCfg) -> Self {
        Self {
            stopped_below_mm_s: c.stopped_below_mm_s,
            implausible_from_mm_s: c.implausible_from_mm_s,
            opened_tolerance_mm: c.opened_tolerance_mm,
            closed_tolerance_mm: c.closed_tolerance_mm,
            set_pos_tolerance_mm: c.set_pos_tolerance_mm,
            sample_spacing: Duration::from_micros(c.sample_spacing_us),
        }
    }
}

impl From<&hand_config::PlannerCfg> for PlannerCfg {
    fn from(c: &hand_config::PlannerCfg) -> Self {
        Self {
            target_tolerance_mm: c.target_tolerance_mm,
            reversal_factor: c.reversal_factor,
        }
    }
}

impl From<&hand_config::ObserverCfg> for ObserverCfg {
    fn from(c: &hand_config::ObserverCfg) -> Self {
        Self {
            period: period_from_ms(c.period_ms),
            stall_epsilon_mm: c.stall_epsilon_mm,
            drift_tolerance_mm: c.drift_tolerance_mm,
            max_correction_us: c.max_correction_us,
        }
    }
}

impl From<&hand_config::ControlCfg> for ControlCfg {
    fn from(c: &hand_config::ControlCfg) -> Self {
        Self {
            period: period_from_ms(c.period_ms),
            initial_set_pos_mm: c.initial_set_pos_mm,
        }
    }
}

// ── Names ────────────────────────────────────────────────────────────────────

impl From<hand_config::FingerName> for FingerId {
    fn from(n: hand_config::FingerName) -> Self {
        match n {
            hand_config::FingerName::Index => Self::Index,
            hand_config::FingerName::Middle => Self::Middle,
            hand_config::FingerName::Ring => Self::Ring,
            hand_config::FingerName::Little => Self::Little,
        }
    }
}

impl From<hand_config::PoseName> for Pose {
    fn from(n: hand_config::PoseName) -> Self {
        match n {
            hand_config::PoseName::Rest => Self::Rest,
            hand_config::PoseName::Fist => Self::Fist,
            hand_config::PoseName::WaveIn => Self::WaveIn,
            hand_config::PoseName::WaveOut => Self::WaveOut,
            hand_config::PoseName::FingersSpread => Self::FingersSpread,
            hand_config::PoseName::DoubleTap => Self::DoubleTap,
        }
    }
}

// ── Calibration table ────────────────────────────────────────────────────────

/// Default assembly table with the `[[fingers]]` overrides applied.
pub fn calibration_table(overrides: &[hand_config::FingerEntry]) -> [FingerCalibration; 4] {
    let mut table = default_table();
    for entry in overrides {
        let calib = &mut table[FingerId::from(entry.id).index()];
        if let Some(v) = entry.min_mm {
            calib.min_position_mm = v;
        }
        if let Some(v) = entry.max_mm {
            calib.max_position_mm = v;
        }
        if let Some(v) = entry.max_speed_mm_s {
            calib.max_speed_mm_s = v;
        }
        if let Some(v) = entry.upper_line {
            calib.upper_line = v;
        }
        if let Some(v) = entry.lower_line {
            calib.lower_line = v;
        }
        if let Some(v) = entry.adc_channel {
            calib.adc_channel = v;
        }
    }
    table
}

// ── Whole file ───────────────────────────────────────────────────────────────

impl TryFrom<&hand_config::Config> for HandSettings {
    type Error = HandError;

    fn try_from(c: &hand_config::Config) -> Result<Self, Self::Error> {
        let mut poses = PoseMap::default();
        for (name, values) in &c.poses {
            poses.set(Pose::from(*name), InstructionSnapshot::from_values(*values)?);
        }
        let initial_instructions = c
            .control
            .initial_instructions
            .map(InstructionSnapshot::from_values)
            .transpose()?;
        Ok(Self {
            sensor: (&c.sensor).into(),
            estimator: (&c.estimator).into(),
            planner: (&c.planner).into(),
            observer: (&c.observer).into(),
            control: (&c.control).into(),
            fingers: calibration_table(&c.fingers),
            poses,
            initial_instructions,
        })
    }
}
