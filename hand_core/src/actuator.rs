//! Pulse output with a self-expiring safety timeout.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hand_traits::LinePair;

use crate::calibration::FingerId;
use crate::error::{HandError, Result};
use crate::hw_error::to_report;
use crate::timer::{DriveLines, PulseTimer, SharedLines, lock_lines};
use crate::types::{Direction, FingerRuntime, PlannedCommand};

/// Drives one finger's line pair. No feedback: output plus de-assertion timer only.
#[derive(Debug)]
pub struct ActuatorDriver {
    finger: FingerId,
    lines: SharedLines,
    timer: PulseTimer,
}

impl ActuatorDriver {
    /// Take ownership of `pair`, force it low and start its timer thread.
    pub fn new(finger: FingerId, mut pair: Box<dyn LinePair + Send>) -> Result<Self> {
        pair.set_levels(false, false).map_err(to_report)?;
        let lines = Arc::new(Mutex::new(DriveLines {
            pair,
            generation: 0,
            pulse: None,
        }));
        let timer = PulseTimer::spawn(finger, Arc::clone(&lines))?;
        Ok(Self {
            finger,
            lines,
            timer,
        })
    }

    /// Assert the command's direction and arm the de-assertion timer.
    ///
    /// Any pulse still in flight is superseded: its pending expiry is replaced
    /// and can no longer release the lines. Increments the stroke counter.
    pub fn execute(&self, runtime: &mut FingerRuntime, cmd: &PlannedCommand) -> Result<()> {
        if cmd.direction == Direction::None {
            return Ok(());
        }
        let (upper, lower) = cmd.direction.levels();
        let generation = {
            let mut drive = lock_lines(&self.lines);
            drive.generation = drive.generation.wrapping_add(1);
            if let Err(e) = drive.pair.set_levels(upper, lower) {
                drive.release(self.finger);
                return Err(to_report(e));
            }
            drive.pulse = Some(cmd.direction);
            drive.generation
        };
        runtime.stroke_num += 1;
        if let Err(e) = self.timer.arm(generation, Duration::from_micros(cmd.duration_us)) {
            lock_lines(&self.lines).release(self.finger);
            return Err(e);
        }
        tracing::debug!(
            finger = %self.finger,
            direction = ?cmd.direction,
            duration_us = cmd.duration_us,
            stroke = runtime.stroke_num,
            "pulse"
        );
        Ok(())
    }

    /// Hard stop: cancel the pending expiry and force both lines low.
    pub fn abort(&self) -> Result<()> {
        {
            let mut drive = lock_lines(&self.lines);
            drive.generation = drive.generation.wrapping_add(1);
            drive.release(self.finger);
        }
        self.timer.cancel()
    }

    /// Direction currently asserted, read back from the lines themselves.
    ///
    /// Both lines high is reported as a hardware fault.
    pub fn live_direction(&self) -> Result<Direction> {
        let levels = lock_lines(&self.lines).pair.levels().map_err(to_report)?;
        match levels {
            (false, false) => Ok(Direction::None),
            (true, false) => Ok(Direction::Extend),
            (false, true) => Ok(Direction::Contract),
            (true, true) => Err(eyre::Report::new(HandError::HardwareFault(format!(
                "both direction lines of {} are high",
                self.finger
            )))),
        }
    }

    /// Whether a pulse issued by this driver has neither expired nor been aborted.
    pub fn is_pulsing(&self) -> bool {
        lock_lines(&self.lines).pulse.is_some()
    }
}
