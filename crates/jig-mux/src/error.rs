//! Error types for the switching engine

use thiserror::Error;

use crate::pins::{PinSet, Signal};

/// Errors raised by the switching engine
///
/// All of these are configuration or programming errors. Nothing in the
/// engine retries; every error reaches the immediate caller.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Signal is not in the mux's compiled signal map
    #[error("invalid signal {signal} for mux {mux}")]
    InvalidSignal {
        /// Mux that was asked to switch
        mux: String,
        /// Requested signal
        signal: Signal,
    },

    /// Two definitions collide, or the reserved empty signal was defined
    #[error("duplicate signal definition {signal} in mux {mux}")]
    DuplicateSignalDefinition {
        /// Mux being compiled
        mux: String,
        /// Colliding signal
        signal: Signal,
    },

    /// A batched phase asks for the same pins to be both on and off
    #[error("pin conflict: {pins} requested both on and off")]
    PinConflict {
        /// Offending pins
        pins: PinSet,
    },

    /// An update references pins that no address handler owns
    #[error("unknown pins: {pins}")]
    UnknownPin {
        /// Pins with no handler
        pins: PinSet,
    },

    /// A mux uses pins that no address handler services
    #[error("mux {mux} uses pins not serviced by any address handler: {pins}")]
    MissingHandlerCoverage {
        /// Mux with uncovered pins
        mux: String,
        /// Pins with no handler
        pins: PinSet,
    },

    /// The mux declaration itself is malformed
    #[error("invalid definition for mux {mux}: {reason}")]
    MuxDefinition {
        /// Mux being constructed
        mux: String,
        /// What is wrong with it
        reason: String,
    },

    /// An address handler failed while writing pins
    #[error("address handler error: {0}")]
    Handler(#[from] HandlerError),
}

/// Errors raised by address handler implementations
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Failed to open the hardware resource
    #[error("failed to open {device}: {reason}")]
    Open {
        /// Device name or port
        device: String,
        /// Underlying cause
        reason: String,
    },

    /// Device rejected a command or reported a fault
    #[error("device {device}: {reason}")]
    Device {
        /// Device name or port
        device: String,
        /// Fault description
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
