//! Periodic background loops.
//!
//! Safety: each `Worker` owns exactly one thread, stopped and joined when the
//! `Worker` is dropped.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use hand_traits::Clock;

use crate::error::{HandError, Result};

pub struct Worker {
    name: &'static str,
    stop: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for Worker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("running", &!self.is_finished())
            .finish()
    }
}

impl Worker {
    /// Call `tick` every `period` until the worker is dropped.
    pub fn spawn(
        name: &'static str,
        period: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
        mut tick: impl FnMut() + Send + 'static,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let join_handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    if stop_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    tick();
                    if stop_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    clock.sleep(period);
                }
                tracing::trace!(worker = name, "loop exiting cleanly");
            })
            .map_err(|e| HandError::State(format!("spawn {name} loop: {e}")))?;
        Ok(Self {
            name,
            stop,
            join_handle: Some(join_handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(worker = self.name, "joined"),
                Err(e) => tracing::warn!(worker = self.name, ?e, "loop panicked during shutdown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hand_traits::MonotonicClock;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ticks_until_dropped() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let worker = Worker::spawn(
            "test",
            Duration::from_millis(1),
            Arc::new(MonotonicClock::new()),
            move || {
                c.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());
        drop(worker);
        let after = count.load(Ordering::Relaxed);
        assert!(after > 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::Relaxed), after);
    }
}
