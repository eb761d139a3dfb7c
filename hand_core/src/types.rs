//! Runtime data model shared by the control loop and the observer.

use std::str::FromStr;

use crate::calibration::FingerId;
use crate::error::HandError;

/// Kinematic state of a finger, recomputed from fresh samples every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerState {
    Closed,
    Closing,
    /// Stopped away from every known position.
    Invalid,
    /// Stopped at the last commanded target.
    SetPos,
    Opening,
    Opened,
    /// Sensor fault or implausible speed.
    Weird,
}

impl FingerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Closing => "closing",
            Self::Invalid => "invalid",
            Self::SetPos => "set_pos",
            Self::Opening => "opening",
            Self::Opened => "opened",
            Self::Weird => "weird",
        }
    }
}

impl core::fmt::Display for FingerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None,
    /// Upper line high; opens the finger.
    Extend,
    /// Lower line high; closes the finger.
    Contract,
}

impl Direction {
    /// Line levels `(upper, lower)` that realise this direction.
    pub const fn levels(self) -> (bool, bool) {
        match self {
            Self::None => (false, false),
            Self::Extend => (true, false),
            Self::Contract => (false, true),
        }
    }
}

/// One timed full-speed actuation pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedCommand {
    pub direction: Direction,
    pub speed_mm_s: f64,
    pub duration_us: u64,
}

/// Normalised finger target: 0.0 fully closed, 1.0 fully open.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Instruction(f64);

impl Instruction {
    pub const CLOSE: Instruction = Instruction(0.0);
    pub const OPEN: Instruction = Instruction(1.0);

    /// Clamp into `[0, 1]`; non-finite input is rejected.
    pub fn new(value: f64) -> Result<Self, HandError> {
        if !value.is_finite() {
            return Err(HandError::Config(format!(
                "instruction must be a finite number, got {value}"
            )));
        }
        Ok(Self(value.clamp(0.0, 1.0)))
    }

    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

/// One instruction per finger, applied atomically by the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstructionSnapshot(pub [Instruction; 4]);

impl InstructionSnapshot {
    pub fn uniform(value: Instruction) -> Self {
        Self([value; 4])
    }

    pub fn from_values(values: [f64; 4]) -> Result<Self, HandError> {
        let [a, b, c, d] = values;
        Ok(Self([
            Instruction::new(a)?,
            Instruction::new(b)?,
            Instruction::new(c)?,
            Instruction::new(d)?,
        ]))
    }

    #[inline]
    pub fn get(&self, id: FingerId) -> Instruction {
        self.0[id.index()]
    }
}

impl FromStr for InstructionSnapshot {
    type Err = HandError;

    /// Parses `a,b,c,d` in finger order (index, middle, ring, little).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(HandError::Config(format!(
                "expected 4 comma-separated instructions, got {}",
                parts.len()
            )));
        }
        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .map_err(|e| HandError::Config(format!("instruction {part:?}: {e}")))?;
            if !(0.0..=1.0).contains(slot) {
                return Err(HandError::Config(format!(
                    "instruction {part} outside [0, 1]"
                )));
            }
        }
        Self::from_values(values)
    }
}

/// Mutable per-finger record. Only reachable through `FingerRegistry::with_finger`.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerRuntime {
    pub state: FingerState,
    pub position_mm: f64,
    pub last_set_pos_mm: f64,
    /// Incremented once per issued pulse.
    pub stroke_num: u64,
    /// Raised by the observer when the actuator stalls.
    pub stalling: bool,
    /// Instruction in force when the stall was raised.
    pub stalled_instruction: Option<Instruction>,
    /// Instruction behind the last command issued by the control loop.
    pub last_instruction: Option<Instruction>,
}

impl FingerRuntime {
    pub fn new(initial_set_pos_mm: f64) -> Self {
        Self {
            state: FingerState::SetPos,
            position_mm: 0.0,
            last_set_pos_mm: initial_set_pos_mm,
            stroke_num: 0,
            stalling: false,
            stalled_instruction: None,
            last_instruction: None,
        }
    }
}
