#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motion-control core of a four-finger myoelectric hand (hardware-agnostic).
//!
//! All hardware interactions go through `hand_traits::AnalogInput` and
//! `hand_traits::LinePair`.
//!
//! ## Architecture
//!
//! - **Sensing**: multisampled potentiometer reads (`sensor`)
//! - **Estimation**: memoryless state classification from three timed samples (`estimator`)
//! - **Planning**: instruction to timed full-speed pulse (`planner`)
//! - **Actuation**: line driving with a per-finger de-assertion timer (`actuator`, `timer`)
//! - **Supervision**: stall abort and drift correction on its own cadence (`observer`)
//! - **Shared state**: per-finger locked records (`registry`)
//!
//! The control loop and the observer run on separate threads and only meet
//! inside `FingerRegistry::with_finger`.

pub mod actuator;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod control;
pub mod conversions;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod mocks;
pub mod observer;
pub mod planner;
pub mod pose;
pub mod registry;
pub mod runner;
pub mod sensor;
pub mod status;
pub mod timer;
pub mod types;
pub mod util;
pub mod worker;

pub use actuator::ActuatorDriver;
pub use builder::{Hand, HandBuilder};
pub use calibration::{FingerCalibration, FingerId, default_table};
pub use config::{ControlCfg, EstimatorCfg, HandSettings, ObserverCfg, PlannerCfg, SensorCfg};
pub use control::ControlLoop;
pub use error::{BuildError, FingerFault, HandError, Result};
pub use estimator::{Estimate, StateEstimator, classify};
pub use observer::StallObserver;
pub use planner::MovementPlanner;
pub use pose::{Pose, PoseMap};
pub use registry::{FingerCtx, FingerRegistry};
pub use runner::{RunSummary, RunningHand, run_until};
pub use sensor::{PositionSensor, SensorReading};
pub use status::{CycleReport, FingerOutcome, ObserverOutcome};
pub use types::{
    Direction, FingerRuntime, FingerState, Instruction, InstructionSnapshot, PlannedCommand,
};
