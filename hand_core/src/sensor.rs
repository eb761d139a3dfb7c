//! Multisampled potentiometer reads.

use hand_traits::AnalogInput;

use crate::config::SensorCfg;
use crate::error::Result;
use crate::hw_error::to_report;

/// Outcome of one position read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    Position(f64),
    /// The averaged voltage matched the unplugged-sensor sentinel.
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct PositionSensor {
    cfg: SensorCfg,
}

impl PositionSensor {
    pub fn new(cfg: SensorCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &SensorCfg {
        &self.cfg
    }

    /// Average `samples` raw conversions of `channel` and convert to millimeters.
    ///
    /// Negative positions are clamped to zero. Takes about a millisecond on
    /// real hardware; do not call faster than needed.
    pub fn read_position<A>(&self, input: &mut A, channel: u8) -> Result<SensorReading>
    where
        A: AnalogInput + ?Sized,
    {
        let n = self.cfg.samples.max(1);
        let mut sum = 0u64;
        for _ in 0..n {
            sum += u64::from(input.read_raw(channel).map_err(to_report)?);
        }
        Ok(self.convert(sum as f64 / f64::from(n)))
    }

    /// Convert an averaged raw count.
    pub fn convert(&self, mean_raw: f64) -> SensorReading {
        let mv = self.cfg.mv_per_count * mean_raw + self.cfg.mv_offset;
        if mv.round() == f64::from(self.cfg.disconnected_mv) {
            return SensorReading::Disconnected;
        }
        let mm = self.cfg.mm_per_mv * mv + self.cfg.mm_offset;
        SensorReading::Position(mm.max(0.0))
    }
}
