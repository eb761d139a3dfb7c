//! Simulated actuators and position sensors.
//!
//! Each finger is a PQ12-style linear actuator: while exactly one direction
//! line is high the shaft travels at `speed_mm_s` until it hits a stroke end.
//! The analog input reports the shaft position through the inverse of the
//! sensor's linear transform, so the core sees the same raw counts a real
//! potentiometer would produce.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use hand_traits::{AnalogInput, BoxError, Clock, LinePair};

use crate::error::HwError;

/// Mechanical description of one simulated finger.
#[derive(Debug, Clone, Copy)]
pub struct SimFinger {
    pub channel: u8,
    pub min_mm: f64,
    pub max_mm: f64,
    pub speed_mm_s: f64,
    pub initial_mm: f64,
}

/// Raw-count model of the ADC and potentiometer.
///
/// millivolts = mv_per_count * raw + mv_offset
/// millimeters = mm_per_mv * millivolts + mm_offset
#[derive(Debug, Clone, Copy)]
pub struct SimAdcModel {
    pub mv_per_count: f64,
    pub mv_offset: f64,
    pub mm_per_mv: f64,
    pub mm_offset: f64,
    /// Voltage a floating (unplugged) potentiometer settles at.
    pub disconnected_mv: u32,
    pub max_count: u16,
}

impl Default for SimAdcModel {
    fn default() -> Self {
        Self {
            mv_per_count: 3300.0 / 4095.0,
            mv_offset: 0.0,
            mm_per_mv: 0.006_255_481_443_114,
            mm_offset: 0.0,
            disconnected_mv: 142,
            max_count: 4095,
        }
    }
}

impl SimAdcModel {
    fn mv_to_raw(&self, mv: f64) -> u16 {
        if self.mv_per_count <= 0.0 {
            return 0;
        }
        let raw = ((mv - self.mv_offset) / self.mv_per_count).round();
        raw.clamp(0.0, f64::from(self.max_count)) as u16
    }

    fn mm_to_raw(&self, mm: f64) -> u16 {
        if self.mm_per_mv == 0.0 {
            return 0;
        }
        self.mv_to_raw((mm - self.mm_offset) / self.mm_per_mv)
    }
}

#[derive(Debug)]
struct FingerPlant {
    cfg: SimFinger,
    position_mm: f64,
    upper: bool,
    lower: bool,
    since: Instant,
    jammed: bool,
    disconnected: bool,
    strokes: u32,
}

impl FingerPlant {
    /// Integrate travel up to `now` under the current line levels.
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.since).as_secs_f64();
        self.since = now;
        if self.jammed || self.upper == self.lower {
            return;
        }
        let sign = if self.upper { 1.0 } else { -1.0 };
        let next = self.position_mm + sign * self.cfg.speed_mm_s * dt;
        self.position_mm = next.clamp(self.cfg.min_mm, self.cfg.max_mm);
    }
}

#[derive(Debug)]
struct Plant {
    fingers: Vec<FingerPlant>,
    model: SimAdcModel,
}

/// Handle to the simulated hand. Clones share the same plant.
#[derive(Clone)]
pub struct SimHand {
    plant: Arc<Mutex<Plant>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for SimHand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimHand")
            .field("fingers", &self.lock().fingers.len())
            .finish()
    }
}

impl SimHand {
    pub fn new(
        fingers: Vec<SimFinger>,
        model: SimAdcModel,
        clock: impl Clock + Send + Sync + 'static,
    ) -> Self {
        let now = clock.now();
        let fingers = fingers
            .into_iter()
            .map(|cfg| FingerPlant {
                position_mm: cfg.initial_mm.clamp(cfg.min_mm, cfg.max_mm),
                cfg,
                upper: false,
                lower: false,
                since: now,
                jammed: false,
                disconnected: false,
                strokes: 0,
            })
            .collect();
        Self {
            plant: Arc::new(Mutex::new(Plant { fingers, model })),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Plant> {
        self.plant.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared analog input covering every finger's channel.
    pub fn input(&self) -> SimInput {
        SimInput { hand: self.clone() }
    }

    /// Direction lines of finger `index`.
    pub fn lines(&self, index: usize) -> SimLines {
        SimLines {
            hand: self.clone(),
            index,
        }
    }

    /// Block the shaft: lines still toggle but the position stops changing.
    pub fn jam(&self, index: usize, jammed: bool) {
        let now = self.clock.now();
        let mut plant = self.lock();
        if let Some(f) = plant.fingers.get_mut(index) {
            f.advance(now);
            f.jammed = jammed;
        }
    }

    /// Unplug the potentiometer: reads return the floating-input voltage.
    pub fn disconnect(&self, index: usize, disconnected: bool) {
        let mut plant = self.lock();
        if let Some(f) = plant.fingers.get_mut(index) {
            f.disconnected = disconnected;
        }
    }

    /// Current shaft position of finger `index` in millimeters.
    pub fn position_mm(&self, index: usize) -> Option<f64> {
        let now = self.clock.now();
        let mut plant = self.lock();
        plant.fingers.get_mut(index).map(|f| {
            f.advance(now);
            f.position_mm
        })
    }

    /// Move a finger instantly (test setup).
    pub fn set_position_mm(&self, index: usize, mm: f64) {
        let now = self.clock.now();
        let mut plant = self.lock();
        if let Some(f) = plant.fingers.get_mut(index) {
            f.since = now;
            f.position_mm = mm.clamp(f.cfg.min_mm, f.cfg.max_mm);
        }
    }

    /// Number of times a direction line was raised on finger `index`.
    pub fn strokes(&self, index: usize) -> u32 {
        self.lock().fingers.get(index).map_or(0, |f| f.strokes)
    }
}

/// Analog input half of a [`SimHand`].
#[derive(Debug, Clone)]
pub struct SimInput {
    hand: SimHand,
}

impl AnalogInput for SimInput {
    fn read_raw(&mut self, channel: u8) -> Result<u16, BoxError> {
        let now = self.hand.clock.now();
        let mut plant = self.hand.lock();
        let model = plant.model;
        let finger = plant
            .fingers
            .iter_mut()
            .find(|f| f.cfg.channel == channel)
            .ok_or(HwError::Channel(channel))?;
        finger.advance(now);
        let raw = if finger.disconnected {
            model.mv_to_raw(f64::from(model.disconnected_mv))
        } else {
            model.mm_to_raw(finger.position_mm)
        };
        Ok(raw)
    }
}

/// Direction lines of one finger of a [`SimHand`].
#[derive(Debug, Clone)]
pub struct SimLines {
    hand: SimHand,
    index: usize,
}

impl LinePair for SimLines {
    fn set_levels(&mut self, upper: bool, lower: bool) -> Result<(), BoxError> {
        if upper && lower {
            return Err(Box::new(HwError::Gpio(
                "refusing to raise both direction lines".into(),
            )));
        }
        let now = self.hand.clock.now();
        let mut plant = self.hand.lock();
        let finger = plant
            .fingers
            .get_mut(self.index)
            .ok_or_else(|| HwError::Gpio(format!("no line pair {}", self.index)))?;
        finger.advance(now);
        let rising = (upper && !finger.upper) || (lower && !finger.lower);
        if rising {
            finger.strokes = finger.strokes.saturating_add(1);
        }
        finger.upper = upper;
        finger.lower = lower;
        tracing::trace!(index = self.index, upper, lower, "sim lines");
        Ok(())
    }

    fn levels(&self) -> Result<(bool, bool), BoxError> {
        let plant = self.hand.lock();
        let finger = plant
            .fingers
            .get(self.index)
            .ok_or_else(|| HwError::Gpio(format!("no line pair {}", self.index)))?;
        Ok((finger.upper, finger.lower))
    }
}
