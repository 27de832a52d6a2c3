//! Handler configuration
//!
//! Handlers are declared alongside the jig's muxes, tagged by `type`:
//!
//! ```json
//! [
//!   { "type": "serial_relay", "port": "/dev/ttyUSB0", "pins": ["k0", "k1", "k2"] },
//!   { "type": "pin_value", "name": "dio", "pins": ["a0", "a1"] },
//!   { "type": "simulated", "pins": ["b0"] }
//! ]
//! ```

use std::time::Duration;

use jig_mux::{AddressHandler, Pin};
use serde::{Deserialize, Serialize};

use crate::error::{check_pin_list, ConfigError};
use crate::pin_value::PinValueAddressHandler;
use crate::serial::{SerialRelayHandler, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};
use crate::simulated::SimulatedHandler;

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

/// Declaration of one address handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandlerConfig {
    /// [`PinValueAddressHandler`]
    PinValue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        pins: Vec<Pin>,
    },
    /// [`SimulatedHandler`]
    Simulated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        pins: Vec<Pin>,
    },
    /// [`SerialRelayHandler`]
    SerialRelay {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        active_low: bool,
        pins: Vec<Pin>,
    },
}

impl HandlerConfig {
    /// Pins the handler will drive
    pub fn pins(&self) -> &[Pin] {
        match self {
            Self::PinValue { pins, .. } | Self::Simulated { pins, .. } | Self::SerialRelay { pins, .. } => pins,
        }
    }

    /// Name used in logs
    pub fn name(&self) -> &str {
        match self {
            Self::PinValue { name, .. } => name.as_deref().unwrap_or("pin-value"),
            Self::Simulated { name, .. } => name.as_deref().unwrap_or("simulated"),
            Self::SerialRelay { name, port, .. } => name.as_deref().unwrap_or(port),
        }
    }

    /// Build the handler; no hardware is opened
    pub fn build(&self) -> Result<Box<dyn AddressHandler>, ConfigError> {
        let name = self.name().to_string();
        check_pin_list(&name, self.pins())?;

        let handler: Box<dyn AddressHandler> = match self {
            Self::PinValue { pins, .. } => Box::new(PinValueAddressHandler::new(name, pins.clone())?),
            Self::Simulated { pins, .. } => Box::new(SimulatedHandler::new(name, pins.clone())),
            Self::SerialRelay {
                port,
                baud_rate,
                timeout_ms,
                active_low,
                pins,
                ..
            } => Box::new(
                SerialRelayHandler::new(port, *baud_rate, pins.clone())?
                    .with_name(name)
                    .with_timeout(Duration::from_millis(*timeout_ms))
                    .with_active_low(*active_low),
            ),
        };
        Ok(handler)
    }
}

/// Build every handler of a jig, failing on the first bad declaration
pub fn build_handlers(configs: &[HandlerConfig]) -> Result<Vec<Box<dyn AddressHandler>>, ConfigError> {
    configs.iter().map(HandlerConfig::build).collect()
}
