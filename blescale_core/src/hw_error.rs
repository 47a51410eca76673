//! Maps `Box<dyn Error>` from trait boundaries to typed `NodeError`.
//!
//! The traits in `blescale_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `blescale_hardware::HwError` downcasting.

use crate::error::NodeError;

/// Map a sensor-side error to a typed `NodeError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> NodeError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<blescale_hardware::error::HwError>() {
            return match hw {
                blescale_hardware::error::HwError::Timeout
                | blescale_hardware::error::HwError::DataReadyTimeout => NodeError::Timeout,
                other => NodeError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        NodeError::Timeout
    } else {
        NodeError::Hardware(s)
    }
}

/// Map a radio-stack error. Radio failures never downcast to sensor errors.
pub fn map_radio_error(e: &(dyn std::error::Error + 'static)) -> NodeError {
    NodeError::Radio(e.to_string())
}
