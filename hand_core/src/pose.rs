//! Classifier pose labels and their mapping to instruction snapshots.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::HandError;
use crate::types::{Instruction, InstructionSnapshot};

/// Discrete gesture reported by the upstream EMG classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pose {
    Rest,
    Fist,
    WaveIn,
    WaveOut,
    FingersSpread,
    DoubleTap,
    Unknown,
}

impl Pose {
    /// Decode the classifier's wire code. Unassigned codes map to `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Rest,
            1 => Self::Fist,
            2 => Self::WaveIn,
            3 => Self::WaveOut,
            4 => Self::FingersSpread,
            5 => Self::DoubleTap,
            _ => Self::Unknown,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Fist => "fist",
            Self::WaveIn => "wave_in",
            Self::WaveOut => "wave_out",
            Self::FingersSpread => "fingers_spread",
            Self::DoubleTap => "double_tap",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for Pose {
    type Err = HandError;

    /// Accepts a pose name (`fist`, `wave-in`, ...) or its numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Ok(Self::from_code(code));
        }
        let pose = match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rest" => Self::Rest,
            "fist" => Self::Fist,
            "wave_in" => Self::WaveIn,
            "wave_out" => Self::WaveOut,
            "fingers_spread" => Self::FingersSpread,
            "double_tap" => Self::DoubleTap,
            "unknown" => Self::Unknown,
            other => return Err(HandError::Config(format!("unknown pose {other:?}"))),
        };
        Ok(pose)
    }
}

/// Pose to instruction table. Poses without an entry leave the instructions unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseMap {
    entries: HashMap<Pose, InstructionSnapshot>,
}

impl Default for PoseMap {
    fn default() -> Self {
        let v = |x: f64| Instruction::new(x).unwrap_or(Instruction::CLOSE);
        let snap = |a, b, c, d| InstructionSnapshot([v(a), v(b), v(c), v(d)]);
        let entries = HashMap::from([
            (Pose::Rest, snap(0.5, 0.5, 0.5, 0.5)),
            (Pose::Fist, snap(0.0, 0.0, 0.0, 0.0)),
            (Pose::FingersSpread, snap(1.0, 1.0, 1.0, 1.0)),
            (Pose::WaveIn, snap(1.0, 0.0, 0.0, 0.0)),
            (Pose::WaveOut, snap(1.0, 1.0, 0.0, 0.0)),
        ]);
        Self { entries }
    }
}

impl PoseMap {
    pub fn set(&mut self, pose: Pose, snapshot: InstructionSnapshot) {
        self.entries.insert(pose, snapshot);
    }

    pub fn instruction_for(&self, pose: Pose) -> Option<InstructionSnapshot> {
        self.entries.get(&pose).copied()
    }
}
