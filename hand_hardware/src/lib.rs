//! Hardware backends for the hand control core.
//!
//! - `sim`: a simulated hand whose fingers move at constant speed while a
//!   direction line is held, used by default and by the test suites.
//! - `rpi` (feature `hardware`, Linux only): Raspberry Pi GPIO line pairs and
//!   an MCP3008 SPI ADC for the position potentiometers.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;
pub mod sim;

pub use error::HwError;
pub use sim::{SimAdcModel, SimFinger, SimHand, SimInput, SimLines};
