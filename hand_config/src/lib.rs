#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and sensor calibration parsing for the hand controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated. Every
//!   section is optional; defaults reproduce the compiled-in assembly table.
//! - The sensor calibration CSV loader enforces headers and performs a robust
//!   refit to reduce outlier influence before slope/intercept estimation.
use std::collections::HashMap;

use serde::Deserialize;

/// Sensor calibration CSV schema.
///
/// Expected headers:
/// mv,mm
///
/// Example:
/// mv,mm
/// 900,5.63
/// 2900,18.14
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub mv: f64,
    pub mm: f64,
}

/// Finger names as written in the config file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FingerName {
    Index,
    Middle,
    Ring,
    Little,
}

/// Classifier pose labels as written in the config file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PoseName {
    Rest,
    Fist,
    WaveIn,
    WaveOut,
    FingersSpread,
    DoubleTap,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorCfg {
    /// Raw conversions averaged per position reading.
    pub samples: u32,
    pub mv_per_count: f64,
    pub mv_offset: f64,
    pub mm_per_mv: f64,
    pub mm_offset: f64,
    /// Averaged voltage reported by an unplugged potentiometer.
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EstimatorCfg {
    /// Below this speed (mm/s) the finger counts as stopped.
    pub stopped_below_mm_s: f64,
    /// From this speed (mm/s) upward a reading is physically implausible.
    pub implausible_from_mm_s: f64,
    pub opened_tolerance_mm: f64,
    pub closed_tolerance_mm: f64,
    pub set_pos_tolerance_mm: f64,
    /// Minimum spacing between the three position samples of one estimate.
    pub sample_spacing_us: u64,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            stopped_below_mm_s: 4.0,
            implausible_from_mm_s: 29.0,
            opened_tolerance_mm: 0.2,
            closed_tolerance_mm: 0.2,
            set_pos_tolerance_mm: 0.1,
            sample_spacing_us: 1_500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlannerCfg {
    pub target_tolerance_mm: f64,
    /// Duration multiplier applied when a command reverses the last motion.
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ObserverCfg {
    pub period_ms: u64,
    pub stall_epsilon_mm: f64,
    pub drift_tolerance_mm: f64,
    /// Ceiling on a corrective pulse issued by the observer.
    pub max_correction_us: u64,
}

impl Default for ObserverCfg {
    fn default() -> Self {
        Self {
            period_ms: 100,
            stall_epsilon_mm: 0.2,
            drift_tolerance_mm: 0.3,
            max_correction_us: 40_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Delay between two full passes over the fingers.
    pub period_ms: u64,
    /// Target assumed for every finger before the first instruction.
    pub initial_set_pos_mm: f64,
    /// Instruction snapshot applied at startup, if any.
    pub initial_instructions: Option<[f64; 4]>,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            period_ms: 20,
            initial_set_pos_mm: 10.0,
            initial_instructions: None,
        }
    }
}

/// Per-finger override of the compiled-in calibration table.
#[derive(Debug, Deserialize, Clone)]
pub struct FingerEntry {
    pub id: FingerName,
    pub min_mm: Option<f64>,
    pub max_mm: Option<f64>,
    pub max_speed_mm_s: Option<f64>,
    pub upper_line: Option<u8>,
    pub lower_line: Option<u8>,
    pub adc_channel: Option<u8>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Parameters of the simulated backend.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Shaft speed; defaults to each finger's calibrated max speed.
    pub speed_mm_s: Option<f64>,
    /// Starting shaft position; defaults to `control.initial_set_pos_mm`.
    pub initial_mm: Option<f64>,
    pub jammed: Vec<FingerName>,
    pub disconnected: Vec<FingerName>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HardwareCfg {
    /// MCP3008 chip select (0 or 1).
    pub spi_slave: u8,
    pub spi_clock_hz: u32,
    /// Millivolts per MCP3008 count (10-bit). Replaces `sensor.mv_per_count`,
    /// which describes the 12-bit simulated converter, on the rpi backend.
    pub mv_per_count: f64,
}

impl Default for HardwareCfg {
    fn default() -> Self {
        Self {
            spi_slave: 0,
            spi_clock_hz: 1_000_000,
            mv_per_count: 3300.0 / 1023.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub sensor: SensorCfg,
    pub estimator: EstimatorCfg,
    pub planner: PlannerCfg,
    pub observer: ObserverCfg,
    pub control: ControlCfg,
    pub fingers: Vec<FingerEntry>,
    /// Pose label to instruction snapshot, overriding the built-in map.
    pub poses: HashMap<PoseName, [f64; 4]>,
    pub logging: Logging,
    pub sim: SimCfg,
    pub hardware: HardwareCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Linear potentiometer transform fitted from calibration rows.
#[derive(Debug, Clone, Copy)]
pub struct SensorCalibration {
    pub mm_per_mv: f64,
    pub mm_offset: f64,
}

impl SensorCalibration {
    /// Fit mm = a*mv + b with ordinary least squares, then refit once without
    /// points whose residual exceeds twice the RMS residual.
    pub fn from_rows(rows: Vec<CalibrationRow>) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }
        if rows.iter().any(|r| !r.mv.is_finite() || !r.mm.is_finite()) {
            eyre::bail!("calibration rows must be finite numbers");
        }

        // Strictly monotonic voltages (increasing or decreasing), no duplicates
        let mut dir = 0.0f64;
        for i in 1..rows.len() {
            let d = rows[i].mv - rows[i - 1].mv;
            if d == 0.0 {
                eyre::bail!(
                    "calibration rows have duplicate mv values at index {} and {}",
                    i - 1,
                    i
                );
            }
            if dir == 0.0 {
                dir = d.signum();
            } else if dir != d.signum() {
                eyre::bail!(
                    "calibration mv values must be monotonic (strictly increasing or strictly decreasing)"
                );
            }
        }

        let pts: Vec<(f64, f64)> = rows.iter().map(|r| (r.mv, r.mm)).collect();
        let (a0, b0) = fit_line(&pts)?;
        let sumsq: f64 = pts
            .iter()
            .map(|(x, y)| {
                let r = y - (a0 * x + b0);
                r * r
            })
            .sum();
        let rms = (sumsq / pts.len() as f64).sqrt();

        let (a, b) = robust_refit(&pts, a0, b0, rms, 2.0).unwrap_or((a0, b0));
        Ok(Self {
            mm_per_mv: a,
            mm_offset: b,
        })
    }
}

fn fit_line(pts: &[(f64, f64)]) -> eyre::Result<(f64, f64)> {
    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for (x, y) in pts {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    if !sxx.is_finite() || sxx == 0.0 {
        eyre::bail!("calibration cannot determine slope (degenerate mv variance)");
    }
    let a = sxy / sxx;
    if !a.is_finite() || a == 0.0 {
        eyre::bail!("calibration produced an unusable slope ({a})");
    }
    Ok((a, mean_y - a * mean_x))
}

/// Drop points with |residual| > k * rms around y = a0*x + b0 and refit.
/// Returns None when nothing was rejected, fewer than two inliers remain, or
/// the refit is degenerate; the caller keeps the original line then.
fn robust_refit(pts: &[(f64, f64)], a0: f64, b0: f64, rms: f64, k: f64) -> Option<(f64, f64)> {
    if !(rms.is_finite() && rms > 0.0) {
        return None;
    }
    let thr = k * rms;
    let inliers: Vec<(f64, f64)> = pts
        .iter()
        .copied()
        .filter(|(x, y)| (y - (a0 * x + b0)).abs() <= thr)
        .collect();
    if inliers.len() < 2 || inliers.len() == pts.len() {
        return None;
    }
    fit_line(&inliers).ok()
}

impl TryFrom<Vec<CalibrationRow>> for SensorCalibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<SensorCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["mv", "mm"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'mv,mm', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }

    SensorCalibration::try_from(rows)
}

fn check_instruction_set(name: &str, values: &[f64; 4]) -> eyre::Result<()> {
    if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
        eyre::bail!("{name} values must be in [0.0, 1.0]");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if self.sensor.samples == 0 || self.sensor.samples > 1024 {
            eyre::bail!("sensor.samples must be in [1, 1024]");
        }
        if !(self.sensor.mv_per_count.is_finite() && self.sensor.mv_per_count > 0.0) {
            eyre::bail!("sensor.mv_per_count must be > 0");
        }
        if !(self.hardware.mv_per_count.is_finite() && self.hardware.mv_per_count > 0.0) {
            eyre::bail!("hardware.mv_per_count must be > 0");
        }
        if !self.sensor.mm_per_mv.is_finite() || self.sensor.mm_per_mv == 0.0 {
            eyre::bail!("sensor.mm_per_mv must be finite and non-zero");
        }
        if !self.sensor.mv_offset.is_finite() || !self.sensor.mm_offset.is_finite() {
            eyre::bail!("sensor offsets must be finite");
        }

        // Estimator
        let e = &self.estimator;
        if !(e.stopped_below_mm_s > 0.0) {
            eyre::bail!("estimator.stopped_below_mm_s must be > 0");
        }
        if !(e.implausible_from_mm_s > e.stopped_below_mm_s) {
            eyre::bail!("estimator.implausible_from_mm_s must be > stopped_below_mm_s");
        }
        for (name, v) in [
            ("estimator.opened_tolerance_mm", e.opened_tolerance_mm),
            ("estimator.closed_tolerance_mm", e.closed_tolerance_mm),
            ("estimator.set_pos_tolerance_mm", e.set_pos_tolerance_mm),
            ("planner.target_tolerance_mm", self.planner.target_tolerance_mm),
            ("observer.stall_epsilon_mm", self.observer.stall_epsilon_mm),
            ("observer.drift_tolerance_mm", self.observer.drift_tolerance_mm),
        ] {
            if !(0.0..=5.0).contains(&v) {
                eyre::bail!("{name} must be in [0.0, 5.0]");
            }
        }

        if e.sample_spacing_us > 100_000 {
            eyre::bail!("estimator.sample_spacing_us must be <= 100000");
        }

        // Planner
        if !(1.0..=3.0).contains(&self.planner.reversal_factor) {
            eyre::bail!("planner.reversal_factor must be in [1.0, 3.0]");
        }

        // Observer
        if self.observer.period_ms == 0 || self.observer.period_ms > 10_000 {
            eyre::bail!("observer.period_ms must be in [1, 10000]");
        }
        if self.observer.max_correction_us == 0 || self.observer.max_correction_us > 1_000_000 {
            eyre::bail!("observer.max_correction_us must be in [1, 1000000]");
        }

        // Control
        if self.control.period_ms > 10_000 {
            eyre::bail!("control.period_ms is unreasonably large (>10s)");
        }
        if !self.control.initial_set_pos_mm.is_finite() || self.control.initial_set_pos_mm < 0.0 {
            eyre::bail!("control.initial_set_pos_mm must be >= 0");
        }
        if let Some(values) = &self.control.initial_instructions {
            check_instruction_set("control.initial_instructions", values)?;
        }

        // Fingers
        let mut seen = Vec::new();
        for f in &self.fingers {
            if seen.contains(&f.id) {
                eyre::bail!("fingers: duplicate entry for {:?}", f.id);
            }
            seen.push(f.id);
            if let (Some(min), Some(max)) = (f.min_mm, f.max_mm)
                && !(min >= 0.0 && max > min)
            {
                eyre::bail!("fingers.{:?}: max_mm must be > min_mm >= 0", f.id);
            }
            if let Some(speed) = f.max_speed_mm_s
                && !(speed > 0.0 && speed.is_finite())
            {
                eyre::bail!("fingers.{:?}: max_speed_mm_s must be > 0", f.id);
            }
            if let (Some(upper), Some(lower)) = (f.upper_line, f.lower_line)
                && upper == lower
            {
                eyre::bail!("fingers.{:?}: upper_line and lower_line must differ", f.id);
            }
        }

        // Poses
        for (pose, values) in &self.poses {
            check_instruction_set(&format!("poses.{pose:?}"), values)?;
        }

        // Sim
        if let Some(speed) = self.sim.speed_mm_s
            && !(speed > 0.0 && speed.is_finite())
        {
            eyre::bail!("sim.speed_mm_s must be > 0");
        }

        // Logging
        if let Some(rot) = &self.logging.rotation
            && !matches!(rot.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
