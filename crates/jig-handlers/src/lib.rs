//! Address handlers for jig-mux
//!
//! Concrete [`AddressHandler`](jig_mux::AddressHandler) implementations:
//!
//! - [`PinValueAddressHandler`] reduces the active pins to an integer bitmask
//! - [`SimulatedHandler`] records every write, for bring-up without hardware
//! - [`SerialRelayHandler`] drives shift-register relay boards over a serial port
//!
//! [`HandlerConfig`] builds any of them from a declarative description.

pub mod config;
pub mod error;
pub mod pin_value;
pub mod serial;
pub mod simulated;

pub use config::{build_handlers, HandlerConfig};
pub use error::ConfigError;
pub use pin_value::PinValueAddressHandler;
pub use serial::{encode_relay_image, SerialRelayHandler, DEFAULT_BAUD_RATE};
pub use simulated::{SimulatedHandler, SimulatedLog};
