//! Static per-finger calibration.
//!
//! Values are measured once during assembly and never change at runtime.

/// One of the four actuated fingers. The thumb is passive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FingerId {
    Index,
    Middle,
    Ring,
    Little,
}

impl FingerId {
    /// Fixed processing order of every pass over the hand.
    pub const ALL: [FingerId; 4] = [
        FingerId::Index,
        FingerId::Middle,
        FingerId::Ring,
        FingerId::Little,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Index => 0,
            Self::Middle => 1,
            Self::Ring => 2,
            Self::Little => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Little => "little",
        }
    }
}

impl core::fmt::Display for FingerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of one finger's actuator and sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerCalibration {
    pub id: FingerId,
    /// Shaft position with the finger fully closed.
    pub min_position_mm: f64,
    /// Shaft position with the finger fully open.
    pub max_position_mm: f64,
    pub max_speed_mm_s: f64,
    /// Output line that extends the shaft when high.
    pub upper_line: u8,
    /// Output line that contracts the shaft when high.
    pub lower_line: u8,
    pub adc_channel: u8,
}

impl FingerCalibration {
    /// Stroke length between the closed and open positions.
    #[inline]
    pub fn range_mm(&self) -> f64 {
        self.max_position_mm - self.min_position_mm
    }
}

/// Loaded speed of the PQ12 actuators fitted to every finger.
pub const DEFAULT_MAX_SPEED_MM_S: f64 = 26.0;

/// Assembly measurements of the reference hand.
pub fn default_table() -> [FingerCalibration; 4] {
    let finger = |id, min, max, upper, lower, channel| FingerCalibration {
        id,
        min_position_mm: min,
        max_position_mm: max,
        max_speed_mm_s: DEFAULT_MAX_SPEED_MM_S,
        upper_line: upper,
        lower_line: lower,
        adc_channel: channel,
    };
    [
        finger(FingerId::Index, 5.56, 18.73, 33, 32, 0),
        finger(FingerId::Middle, 5.56, 18.73, 26, 25, 3),
        finger(FingerId::Ring, 2.973, 16.243, 27, 14, 6),
        finger(FingerId::Little, 4.904, 19.18, 13, 12, 7),
    ]
}
