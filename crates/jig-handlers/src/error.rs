//! Error types for handler configuration

use jig_mux::Pin;
use thiserror::Error;

/// Errors raised while building a handler from its configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Handler declares no pins
    #[error("handler {handler} has an empty pin list")]
    EmptyPinList {
        /// Handler name
        handler: String,
    },

    /// The same pin appears twice in one handler
    #[error("handler {handler} lists pin {pin} more than once")]
    DuplicatePin {
        /// Handler name
        handler: String,
        /// Repeated pin
        pin: Pin,
    },

    /// More pins than the handler can represent
    #[error("handler {handler} drives {count} pins, at most {max} are supported")]
    TooManyPins {
        /// Handler name
        handler: String,
        /// Pins configured
        count: usize,
        /// Pins the handler supports
        max: usize,
    },

    /// Invalid serial settings
    #[error("handler {handler}: {reason}")]
    InvalidSetting {
        /// Handler name
        handler: String,
        /// What is wrong with the setting
        reason: String,
    },
}

/// Reject empty pin lists and repeated pins
pub(crate) fn check_pin_list(handler: &str, pins: &[Pin]) -> Result<(), ConfigError> {
    if pins.is_empty() {
        return Err(ConfigError::EmptyPinList {
            handler: handler.to_string(),
        });
    }
    for (i, pin) in pins.iter().enumerate() {
        if pins[..i].contains(pin) {
            return Err(ConfigError::DuplicatePin {
                handler: handler.to_string(),
                pin: pin.clone(),
            });
        }
    }
    Ok(())
}
