//! Test and helper doubles for hand_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use hand_traits::{AnalogInput, BoxError, LinePair};

use crate::registry::SharedInput;

/// Analog input replaying a fixed sequence of raw values, whatever the channel.
/// Errors once the script is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: VecDeque<u16>,
}

impl ScriptedInput {
    pub fn raw(values: Vec<u16>) -> Self {
        Self {
            script: values.into(),
        }
    }
}

impl AnalogInput for ScriptedInput {
    fn read_raw(&mut self, channel: u8) -> Result<u16, BoxError> {
        self.script.pop_front().ok_or_else(|| {
            Box::new(std::io::Error::other(format!(
                "script exhausted on channel {channel}"
            ))) as BoxError
        })
    }
}

/// Wrap an input the way `FingerRegistry` shares it.
pub fn shared(input: impl AnalogInput + Send + 'static) -> SharedInput {
    let boxed: Box<dyn AnalogInput + Send> = Box::new(input);
    Mutex::new(boxed)
}

#[derive(Debug, Default)]
struct LineLog {
    current: (bool, bool),
    history: Vec<(bool, bool)>,
}

/// Line pair recording every level change. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingLines {
    log: Arc<Mutex<LineLog>>,
}

impl RecordingLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> (bool, bool) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).current
    }

    pub fn history(&self) -> Vec<(bool, bool)> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }

    /// Overwrite the read-back levels without going through `set_levels`.
    pub fn force_levels(&self, upper: bool, lower: bool) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).current = (upper, lower);
    }
}

impl LinePair for RecordingLines {
    fn set_levels(&mut self, upper: bool, lower: bool) -> Result<(), BoxError> {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.current = (upper, lower);
        log.history.push((upper, lower));
        Ok(())
    }

    fn levels(&self) -> Result<(bool, bool), BoxError> {
        Ok(self.current())
    }
}
