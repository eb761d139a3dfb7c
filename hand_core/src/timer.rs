//! Per-finger de-assertion timer.
//!
//! One thread per finger owns at most one pending deadline. Arming replaces
//! the pending deadline and cancelling clears it. The line pair carries the
//! generation of the pulse it is driving; expiry only releases the lines when
//! that generation still matches, so a late expiry never cuts a newer pulse.
//!
//! Safety: dropping a `PulseTimer` forces the lines low and joins the thread.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use hand_traits::LinePair;

use crate::calibration::FingerId;
use crate::error::{HandError, Result};
use crate::types::Direction;

/// Line pair plus the bookkeeping of the pulse it is driving.
pub(crate) struct DriveLines {
    pub(crate) pair: Box<dyn LinePair + Send>,
    pub(crate) generation: u64,
    /// Direction of the pulse in flight, if any.
    pub(crate) pulse: Option<Direction>,
}

impl core::fmt::Debug for DriveLines {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DriveLines")
            .field("generation", &self.generation)
            .field("pulse", &self.pulse)
            .finish_non_exhaustive()
    }
}

impl DriveLines {
    /// Drive both lines low and forget the pulse.
    pub(crate) fn release(&mut self, finger: FingerId) {
        self.pulse = None;
        if let Err(e) = self.pair.set_levels(false, false) {
            tracing::error!(finger = %finger, error = %e, "failed to release direction lines");
        }
    }
}

pub(crate) type SharedLines = Arc<Mutex<DriveLines>>;

pub(crate) fn lock_lines(lines: &Mutex<DriveLines>) -> MutexGuard<'_, DriveLines> {
    lines.lock().unwrap_or_else(PoisonError::into_inner)
}

enum TimerMsg {
    Arm { generation: u64, deadline: Instant },
    Cancel,
}

pub struct PulseTimer {
    finger: FingerId,
    tx: Option<xch::Sender<TimerMsg>>,
    join_handle: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for PulseTimer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseTimer")
            .field("finger", &self.finger)
            .field("running", &self.join_handle.is_some())
            .finish()
    }
}

impl PulseTimer {
    pub(crate) fn spawn(finger: FingerId, lines: SharedLines) -> Result<Self> {
        let (tx, rx) = xch::unbounded::<TimerMsg>();
        let join_handle = std::thread::Builder::new()
            .name(format!("pulse-{finger}"))
            .spawn(move || run(finger, &rx, &lines))
            .map_err(|e| HandError::State(format!("spawn pulse timer for {finger}: {e}")))?;
        Ok(Self {
            finger,
            tx: Some(tx),
            join_handle: Some(join_handle),
        })
    }

    /// Release the lines of pulse `generation` after `duration`, replacing any pending deadline.
    pub(crate) fn arm(&self, generation: u64, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        self.send(TimerMsg::Arm {
            generation,
            deadline,
        })
    }

    pub(crate) fn cancel(&self) -> Result<()> {
        self.send(TimerMsg::Cancel)
    }

    fn send(&self, msg: TimerMsg) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| HandError::State(format!("pulse timer of {} is shut down", self.finger)))?;
        tx.send(msg).map_err(|_| {
            eyre::Report::new(HandError::State(format!(
                "pulse timer of {} exited",
                self.finger
            )))
        })
    }
}

fn run(finger: FingerId, rx: &xch::Receiver<TimerMsg>, lines: &Mutex<DriveLines>) {
    let mut pending: Option<(u64, Instant)> = None;
    loop {
        let msg = match pending {
            Some((_, deadline)) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| xch::RecvTimeoutError::Disconnected),
        };
        match msg {
            Ok(TimerMsg::Arm {
                generation,
                deadline,
            }) => pending = Some((generation, deadline)),
            Ok(TimerMsg::Cancel) => pending = None,
            Err(xch::RecvTimeoutError::Timeout) => {
                if let Some((generation, _)) = pending.take() {
                    let mut drive = lock_lines(lines);
                    if drive.generation == generation && drive.pulse.is_some() {
                        drive.release(finger);
                        tracing::debug!(finger = %finger, generation, "pulse expired");
                    }
                }
            }
            Err(xch::RecvTimeoutError::Disconnected) => {
                lock_lines(lines).release(finger);
                break;
            }
        }
    }
    tracing::trace!(finger = %finger, "pulse timer exiting");
}

impl Drop for PulseTimer {
    fn drop(&mut self) {
        // Disconnecting the channel makes the thread release the lines and exit.
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(finger = %self.finger, ?e, "pulse timer thread panicked");
        }
    }
}
