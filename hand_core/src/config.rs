//! Runtime configuration of the control core.
//!
//! These are separate from the TOML-deserialized config in `hand_config`;
//! `conversions` bridges the two.

use std::time::Duration;

use crate::calibration::{FingerCalibration, default_table};
use crate::pose::PoseMap;
use crate::types::InstructionSnapshot;

/// ADC and potentiometer transform.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    /// Raw conversions averaged per reading.
    pub samples: u32,
    pub mv_per_count: f64,
    pub mv_offset: f64,
    pub mm_per_mv: f64,
    pub mm_offset: f64,
    /// Averaged voltage (rounded to whole mV) that marks an unplugged sensor.
    pub disconnected_mv: u32,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            samples: 32,
            mv_per_count: 3300.0 / 4095.0,
            mv_offset: 0.0,
            mm_per_mv: 0.006_255_481_443_114,
            mm_offset: 0.0,
            disconnected_mv: 142,
        }
    }
}

/// Speed bands and position tolerances used for classification.
///
/// Banding: stopped `< stopped_below_mm_s <=` moving `< implausible_from_mm_s <=` implausible.
#[derive(Debug, Clone)]
pub struct EstimatorCfg {
    pub stopped_below_mm_s: f64,
    pub implausible_from_mm_s: f64,
    pub opened_tolerance_mm: f64,
    pub closed_tolerance_mm: f64,
    pub set_pos_tolerance_mm: f64,
    pub sample_spacing: Duration,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            stopped_below_mm_s: 4.0,
            implausible_from_mm_s: 29.0,
            opened_tolerance_mm: 0.2,
            closed_tolerance_mm: 0.2,
            set_pos_tolerance_mm: 0.1,
            sample_spacing: Duration::from_micros(1_500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerCfg {
    pub target_tolerance_mm: f64,
    /// Duration multiplier when a command reverses the measured motion.
    pub reversal_factor: f64,
}

impl Default for PlannerCfg {
    fn default() -> Self {
        Self {
            target_tolerance_mm: 0.1,
            reversal_factor: 1.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObserverCfg {
    pub period: Duration,
    pub stall_epsilon_mm: f64,
    pub drift_tolerance_mm: f64,
    pub max_correction_us: u64,
}

impl Default for ObserverCfg {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            stall_epsilon_mm: 0.2,
            drift_tolerance_mm: 0.3,
            max_correction_us: 40_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlCfg {
    /// Pause between two passes over the fingers.
    pub period: Duration,
    pub initial_set_pos_mm: f64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20),
            initial_set_pos_mm: 10.0,
        }
    }
}

/// Everything needed to assemble a hand, in core types.
#[derive(Debug, Clone)]
pub struct HandSettings {
    pub sensor: SensorCfg,
    pub estimator: EstimatorCfg,
    pub planner: PlannerCfg,
    pub observer: ObserverCfg,
    pub control: ControlCfg,
    /// In `FingerId::ALL` order.
    pub fingers: [FingerCalibration; 4],
    pub poses: PoseMap,
    pub initial_instructions: Option<InstructionSnapshot>,
}

impl Default for HandSettings {
    fn default() -> Self {
        Self {
            sensor: SensorCfg::default(),
            estimator: EstimatorCfg::default(),
            planner: PlannerCfg::default(),
            observer: ObserverCfg::default(),
            control: ControlCfg::default(),
            fingers: default_table(),
            poses: PoseMap::default(),
            initial_instructions: None,
        }
    }
}
