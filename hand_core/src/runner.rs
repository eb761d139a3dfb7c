//! Running both loops against an instruction feed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;

use crate::builder::Hand;
use crate::calibration::FingerId;
use crate::error::Result;
use crate::registry::FingerRegistry;
use crate::types::{FingerRuntime, InstructionSnapshot};
use crate::worker::Worker;

/// How often `run_until` checks its stop conditions.
const POLL: Duration = Duration::from_millis(10);

/// Control loop and observer running on their own threads.
///
/// Dropping it stops both loops and forces every actuator low.
#[derive(Debug)]
pub struct RunningHand {
    control: Option<Worker>,
    observer: Option<Worker>,
    registry: Arc<FingerRegistry>,
}

/// Final per-finger records after a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub fingers: Vec<(FingerId, FingerRuntime)>,
    pub elapsed: Duration,
}

impl Hand {
    /// Spawn the control loop and the observer.
    pub fn start(&self, instructions: xch::Receiver<InstructionSnapshot>) -> Result<RunningHand> {
        let control = self
            .control_loop(instructions)
            .spawn(self.settings().control.period, self.clock())?;
        let observer = self.observer().spawn(self.clock())?;
        tracing::info!(
            control_period_ms = self.settings().control.period.as_millis() as u64,
            observer_period_ms = self.settings().observer.period.as_millis() as u64,
            "hand started"
        );
        Ok(RunningHand {
            control: Some(control),
            observer: Some(observer),
            registry: Arc::clone(self.registry()),
        })
    }
}

impl RunningHand {
    pub fn snapshot(&self) -> Vec<(FingerId, FingerRuntime)> {
        self.registry.snapshot()
    }

    /// Stop both loops, release every actuator and report the final records.
    pub fn stop(mut self) -> Vec<(FingerId, FingerRuntime)> {
        self.shutdown();
        self.registry.snapshot()
    }

    fn shutdown(&mut self) {
        // Control first so nothing new is planned while the observer winds down.
        drop(self.control.take());
        drop(self.observer.take());
        self.registry.release_all();
    }
}

impl Drop for RunningHand {
    fn drop(&mut self) {
        if self.control.is_some() || self.observer.is_some() {
            self.shutdown();
        }
    }
}

/// Run until `shutdown` is raised or `max_duration` elapses.
pub fn run_until(
    hand: &Hand,
    instructions: xch::Receiver<InstructionSnapshot>,
    shutdown: &AtomicBool,
    max_duration: Option<Duration>,
) -> Result<RunSummary> {
    let started = Instant::now();
    let running = hand.start(instructions)?;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break;
        }
        if max_duration.is_some_and(|d| started.elapsed() >= d) {
            tracing::info!("run duration reached");
            break;
        }
        std::thread::sleep(POLL);
    }
    let fingers = running.stop();
    Ok(RunSummary {
        fingers,
        elapsed: started.elapsed(),
    })
}
