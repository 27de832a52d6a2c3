//! Serial relay board handler
//!
//! Drives a chain of shift-register relay boards behind a serial adapter.
//! Every write sends the full relay image: `ceil(n / 8)` bytes where pin `i`
//! of the pin list is bit `i % 8` of byte `i / 8` counted from the end, so
//! the byte for the last board in the chain goes out first.
//!
//! The port is opened on the first write, not on construction, and reopened
//! after [`close`](AddressHandler::close) or a failed write.

use std::io::Write;
use std::time::Duration;

use jig_mux::{AddressHandler, HandlerError, Pin, PinSet};
use serialport::SerialPort;
use tracing::{debug, info, warn};

use crate::error::{check_pin_list, ConfigError};

/// Baud rate used when none is configured
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Write timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Relay image for `active`, most significant byte first
pub fn encode_relay_image(pins: &[Pin], active: &PinSet, active_low: bool) -> Vec<u8> {
    let len = pins.len().div_ceil(8);
    let mut image = vec![0u8; len];
    for (bit, pin) in pins.iter().enumerate() {
        if active.contains(pin.as_str()) {
            image[len - 1 - bit / 8] |= 1 << (bit % 8);
        }
    }
    if active_low {
        image.iter_mut().for_each(|b| *b = !*b);
    }
    image
}

/// Handler writing relay images to a serial port
pub struct SerialRelayHandler {
    name: String,
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    active_low: bool,
    pins: Vec<Pin>,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialRelayHandler {
    /// Create a handler for the relay chain on `port_name`
    pub fn new(port_name: impl Into<String>, baud_rate: u32, pins: Vec<Pin>) -> Result<Self, ConfigError> {
        let port_name = port_name.into();
        check_pin_list(&port_name, &pins)?;
        if baud_rate == 0 {
            return Err(ConfigError::InvalidSetting {
                handler: port_name,
                reason: "baud rate must be non-zero".to_string(),
            });
        }
        Ok(Self {
            name: port_name.clone(),
            port_name,
            baud_rate,
            timeout: DEFAULT_TIMEOUT,
            active_low: false,
            pins,
            port: None,
        })
    }

    /// Name used in logs instead of the port name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Invert every bit, for boards whose relays close on a low input
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    /// Serial port path
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Whether the port is currently open
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn open(&self) -> Result<Box<dyn SerialPort>, HandlerError> {
        let port = serialport::new(self.port_name.as_str(), self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| HandlerError::Open {
                device: self.port_name.clone(),
                reason: e.to_string(),
            })?;
        info!(handler = %self.name, port = %self.port_name, baud = self.baud_rate, "opened relay port");
        Ok(port)
    }
}

impl AddressHandler for SerialRelayHandler {
    fn pin_list(&self) -> &[Pin] {
        &self.pins
    }

    fn set_pins(&mut self, active: &PinSet) -> Result<(), HandlerError> {
        let image = encode_relay_image(&self.pins, active, self.active_low);

        let port = match self.port.take() {
            Some(port) => port,
            None => self.open()?,
        };
        let port = self.port.insert(port);

        debug!(handler = %self.name, image = ?image, "writing relay image");
        if let Err(e) = port.write_all(&image).and_then(|()| port.flush()) {
            warn!(handler = %self.name, "write failed, port will be reopened: {}", e);
            self.port = None;
            return Err(e.into());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), HandlerError> {
        if self.port.take().is_some() {
            info!(handler = %self.name, port = %self.port_name, "closed relay port");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SerialRelayHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialRelayHandler")
            .field("name", &self.name)
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .field("pins", &self.pins)
            .field("open", &self.is_open())
            .finish()
    }
}
