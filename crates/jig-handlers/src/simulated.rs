//! Simulated address handler for testing
//!
//! Records every write instead of driving hardware, so jigs can be brought up
//! and tested without a relay board connected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jig_mux::{AddressHandler, HandlerError, Pin, PinSet};
use tracing::debug;

/// Write log shared between a [`SimulatedHandler`] and its observers
#[derive(Debug, Clone, Default)]
pub struct SimulatedLog(Arc<Mutex<Vec<PinSet>>>);

impl SimulatedLog {
    fn lock(&self) -> MutexGuard<'_, Vec<PinSet>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every write so far, oldest first
    pub fn writes(&self) -> Vec<PinSet> {
        self.lock().clone()
    }

    /// Most recent write
    pub fn last(&self) -> Option<PinSet> {
        self.lock().last().cloned()
    }

    /// Number of writes
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget recorded writes
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// In-memory handler that records the pin sets it is asked to assert
#[derive(Debug)]
pub struct SimulatedHandler {
    name: String,
    pins: Vec<Pin>,
    log: SimulatedLog,
    open: bool,
    opens: usize,
}

impl SimulatedHandler {
    /// Create a handler for `pins`
    pub fn new(name: impl Into<String>, pins: Vec<Pin>) -> Self {
        Self {
            name: name.into(),
            pins,
            log: SimulatedLog::default(),
            open: false,
            opens: 0,
        }
    }

    /// Handle on the write log; stays valid after the handler is boxed
    pub fn log(&self) -> SimulatedLog {
        self.log.clone()
    }

    /// Whether the simulated hardware is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// How many times the simulated hardware has been opened
    pub fn open_count(&self) -> usize {
        self.opens
    }
}

impl AddressHandler for SimulatedHandler {
    fn pin_list(&self) -> &[Pin] {
        &self.pins
    }

    fn set_pins(&mut self, active: &PinSet) -> Result<(), HandlerError> {
        if !self.open {
            self.open = true;
            self.opens += 1;
            debug!(handler = %self.name, "simulated open");
        }
        debug!(handler = %self.name, active = %active, "simulated write");
        self.log.lock().push(active.clone());
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
