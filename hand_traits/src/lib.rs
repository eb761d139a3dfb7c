//! Hardware seams shared by the control core and the hardware backends.
//!
//! Errors cross these traits as `Box<dyn Error + Send + Sync>`; the core maps
//! them to its own typed errors.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Multiplexed analog input (one ADC unit serving every finger's position channel).
pub trait AnalogInput {
    /// Single raw conversion on `channel`.
    fn read_raw(&mut self, channel: u8) -> Result<u16, BoxError>;
}

/// The two digital outputs steering one actuator.
///
/// `upper` high extends the shaft, `lower` high contracts it. Implementations
/// must never leave both lines high, even transiently.
pub trait LinePair {
    fn set_levels(&mut self, upper: bool, lower: bool) -> Result<(), BoxError>;
    /// Live output levels as `(upper, lower)`, read back from the hardware.
    fn levels(&self) -> Result<(bool, bool), BoxError>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn read_raw(&mut self, channel: u8) -> Result<u16, BoxError> {
        (**self).read_raw(channel)
    }
}

impl<T: LinePair + ?Sized> LinePair for Box<T> {
    fn set_levels(&mut self, upper: bool, lower: bool) -> Result<(), BoxError> {
        (**self).set_levels(upper, lower)
    }
    fn levels(&self) -> Result<(bool, bool), BoxError> {
        (**self).levels()
    }
}
