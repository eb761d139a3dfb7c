//! Type-state builder for `Hand`.
//!
//! The builder enforces at compile time that the analog input and the four
//! line pairs are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use crossbeam_channel as xch;
use hand_traits::{AnalogInput, Clock, LinePair, MonotonicClock};

use crate::actuator::ActuatorDriver;
use crate::calibration::FingerId;
use crate::config::HandSettings;
use crate::control::ControlLoop;
use crate::error::{BuildError, HandError, Result, hand_error_of};
use crate::estimator::{Estimate, StateEstimator};
use crate::observer::StallObserver;
use crate::planner::MovementPlanner;
use crate::registry::FingerRegistry;
use crate::sensor::PositionSensor;
use crate::types::InstructionSnapshot;

/// An assembled hand: registry plus the settings its loops run with.
pub struct Hand {
    registry: Arc<FingerRegistry>,
    settings: HandSettings,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for Hand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hand")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Hand {
    /// Start building a Hand.
    pub fn builder() -> HandBuilder<Missing, Missing> {
        HandBuilder::default()
    }

    pub fn registry(&self) -> &Arc<FingerRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &HandSettings {
        &self.settings
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::clone(&self.clock)
    }

    pub fn estimator(&self) -> StateEstimator {
        StateEstimator::new(
            PositionSensor::new(self.settings.sensor.clone()),
            self.settings.estimator.clone(),
            self.clock(),
        )
    }

    /// Control loop fed by `instructions`, starting from the configured initial snapshot.
    pub fn control_loop(&self, instructions: xch::Receiver<InstructionSnapshot>) -> ControlLoop {
        ControlLoop::new(
            Arc::clone(&self.registry),
            self.estimator(),
            MovementPlanner::new(self.settings.planner.clone()),
            instructions,
            self.settings.initial_instructions,
        )
    }

    pub fn observer(&self) -> StallObserver {
        StallObserver::new(
            Arc::clone(&self.registry),
            PositionSensor::new(self.settings.sensor.clone()),
            self.settings.observer.clone(),
        )
    }

    /// Estimate every finger once without actuating anything.
    pub fn self_check(&self) -> Vec<(FingerId, std::result::Result<Estimate, HandError>)> {
        let estimator = self.estimator();
        FingerId::ALL
            .iter()
            .map(|&id| {
                let r = self.registry.with_finger(id, |ctx| {
                    estimator.estimate(ctx.calibration, ctx.runtime, ctx.input)
                });
                (id, r.map_err(|e| hand_error_of(&e)))
            })
            .collect()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Hand`. All settings are validated on `build()`.
pub struct HandBuilder<I, L> {
    input: Option<Box<dyn AnalogInput + Send>>,
    lines: Option<[Box<dyn LinePair + Send>; 4]>,
    settings: HandSettings,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _i: PhantomData<I>,
    _l: PhantomData<L>,
}

impl Default for HandBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            input: None,
            lines: None,
            settings: HandSettings::default(),
            clock: None,
            _i: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<L> HandBuilder<Missing, L> {
    /// ADC shared by all four position sensors.
    pub fn with_input(self, input: impl AnalogInput + Send + 'static) -> HandBuilder<Set, L> {
        HandBuilder {
            input: Some(Box::new(input)),
            lines: self.lines,
            settings: self.settings,
            clock: self.clock,
            _i: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<I> HandBuilder<I, Missing> {
    /// Direction lines in `FingerId::ALL` order.
    pub fn with_lines(self, lines: [Box<dyn LinePair + Send>; 4]) -> HandBuilder<I, Set> {
        HandBuilder {
            input: self.input,
            lines: Some(lines),
            settings: self.settings,
            clock: self.clock,
            _i: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<I, L> HandBuilder<I, L> {
    pub fn with_settings(mut self, settings: HandSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build without the compile-time checks.
    pub fn try_build(self) -> Result<Hand> {
        let input = self
            .input
            .ok_or_else(|| eyre::Report::new(BuildError::MissingInput))?;
        let lines = self
            .lines
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLines))?;
        validate_and_build(input, lines, self.settings, self.clock)
    }
}

impl HandBuilder<Set, Set> {
    pub fn build(self) -> Result<Hand> {
        self.try_build()
    }
}

fn invalid(msg: &'static str) -> Result<Hand> {
    Err(eyre::Report::new(BuildError::InvalidConfig(msg)))
}

/// Validate settings and assemble the registry and drivers.
fn validate_and_build(
    input: Box<dyn AnalogInput + Send>,
    lines: [Box<dyn LinePair + Send>; 4],
    settings: HandSettings,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Hand> {
    // ── Validation ───────────────────────────────────────────────────────────
    let s = &settings;
    if s.sensor.samples == 0 {
        return invalid("sensor samples must be >= 1");
    }
    if !s.sensor.mm_per_mv.is_finite() || s.sensor.mm_per_mv == 0.0 {
        return invalid("mm_per_mv must be finite and non-zero");
    }
    if !(s.estimator.stopped_below_mm_s > 0.0
        && s.estimator.implausible_from_mm_s > s.estimator.stopped_below_mm_s)
    {
        return invalid("speed bands must satisfy 0 < stopped < implausible");
    }
    let tolerances = [
        s.estimator.opened_tolerance_mm,
        s.estimator.closed_tolerance_mm,
        s.estimator.set_pos_tolerance_mm,
        s.planner.target_tolerance_mm,
        s.observer.stall_epsilon_mm,
        s.observer.drift_tolerance_mm,
    ];
    if tolerances.iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
        return invalid("tolerances must be finite and >= 0");
    }
    if !(s.planner.reversal_factor >= 1.0) {
        return invalid("reversal_factor must be >= 1");
    }
    if s.observer.period.is_zero() {
        return invalid("observer period must be > 0");
    }
    if s.observer.max_correction_us == 0 {
        return invalid("max_correction_us must be > 0");
    }
    for (calib, id) in s.fingers.iter().zip(FingerId::ALL) {
        if calib.id != id {
            return invalid("finger table must follow index, middle, ring, little order");
        }
        if !(calib.min_position_mm >= 0.0 && calib.max_position_mm > calib.min_position_mm) {
            return invalid("finger range must satisfy 0 <= min < max");
        }
        if !(calib.max_speed_mm_s > 0.0 && calib.max_speed_mm_s.is_finite()) {
            return invalid("finger max speed must be > 0");
        }
        if calib.upper_line == calib.lower_line {
            return invalid("finger direction lines must differ");
        }
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };
    let [l0, l1, l2, l3] = lines;
    let [c0, c1, c2, c3] = settings.fingers.clone();
    let fingers = [
        (ActuatorDriver::new(c0.id, l0)?, c0),
        (ActuatorDriver::new(c1.id, l1)?, c1),
        (ActuatorDriver::new(c2.id, l2)?, c2),
        (ActuatorDriver::new(c3.id, l3)?, c3),
    ]
    .map(|(driver, calib)| (calib, driver));
    let registry = FingerRegistry::new(fingers, input, settings.control.initial_set_pos_mm);
    tracing::debug!(?registry, "hand assembled");

    Ok(Hand {
        registry: Arc::new(registry),
        settings,
        clock,
    })
}
