//! Bitmask address handler
//!
//! Gives each pin a power-of-two weight in pin-list order and turns every
//! write into an integer: the sum of the weights of the active pins. This is
//! the shape of most digital output cards (one register, one bit per line),
//! minus the register.

use jig_mux::{AddressHandler, HandlerError, Pin, PinSet};
use tracing::debug;

use crate::error::{check_pin_list, ConfigError};

/// Handler reducing the active pins to a bitmask
#[derive(Debug, Clone)]
pub struct PinValueAddressHandler {
    name: String,
    pins: Vec<Pin>,
    value: u64,
    open: bool,
}

impl PinValueAddressHandler {
    /// Widest mask the handler can produce
    pub const MAX_PINS: usize = u64::BITS as usize;

    /// Create a handler; pin `i` has weight `2^i`
    pub fn new(name: impl Into<String>, pins: Vec<Pin>) -> Result<Self, ConfigError> {
        let name = name.into();
        check_pin_list(&name, &pins)?;
        if pins.len() > Self::MAX_PINS {
            return Err(ConfigError::TooManyPins {
                handler: name,
                count: pins.len(),
                max: Self::MAX_PINS,
            });
        }
        Ok(Self {
            name,
            pins,
            value: 0,
            open: false,
        })
    }

    /// Pins with their bit weights, in pin-list order
    pub fn pin_weights(&self) -> impl Iterator<Item = (&Pin, u64)> {
        self.pins.iter().enumerate().map(|(bit, pin)| (pin, 1u64 << bit))
    }

    /// Mask computed by the last write
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Whether the handler has been written since creation or the last close
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Mask for an active pin set
    pub fn mask(&self, active: &PinSet) -> Result<u64, HandlerError> {
        if let Some(foreign) = active.iter().find(|p| !self.pins.contains(p)) {
            return Err(HandlerError::Device {
                device: self.name.clone(),
                reason: format!("pin {} is not driven by this handler", foreign),
            });
        }
        Ok(self
            .pin_weights()
            .filter(|(pin, _)| active.contains(pin.as_str()))
            .map(|(_, weight)| weight)
            .sum())
    }
}

impl AddressHandler for PinValueAddressHandler {
    fn pin_list(&self) -> &[Pin] {
        &self.pins
    }

    fn set_pins(&mut self, active: &PinSet) -> Result<(), HandlerError> {
        let value = self.mask(active)?;
        if !self.open {
            debug!(handler = %self.name, "opening");
            self.open = true;
        }
        self.value = value;
        debug!(handler = %self.name, "set_pins value={:#x}", value);
        Ok(())
    }

    fn close(&mut self) -> Result<(), HandlerError> {
        self.open = false;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
