//! Maps `Box<dyn Error>` from trait boundaries to typed `HandError`.
//!
//! The traits in `hand_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `hand_hardware::HwError` downcasting.

use crate::error::HandError;

/// Map a trait-boundary error to a typed `HandError`.
///
/// Known hardware error types are downcast first; anything else is reported
/// as a generic hardware error carrying the message.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> HandError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<hand_hardware::HwError>() {
            return match hw {
                hand_hardware::HwError::Io(io) => HandError::Hardware(io.to_string()),
                other => HandError::HardwareFault(other.to_string()),
            };
        }
    }

    HandError::Hardware(e.to_string())
}

/// Convenience for `map_err` on trait calls.
pub(crate) fn to_report(e: hand_traits::BoxError) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
