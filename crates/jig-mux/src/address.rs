//! Address handlers and the virtual address map
//!
//! An [`AddressHandler`] drives a group of physical pins (relay board,
//! bit-bang adapter, DAQ card). The [`VirtualAddressMap`] owns every handler
//! of a jig, batches the updates queued by any number of muxes, and is the
//! only thing that decides which pins are actually active.
//!
//! # Dispatch
//!
//! On trigger, all queued updates are merged into one. Each phase is checked
//! for pins that are requested both on and off, then the setup phase is
//! applied, the map waits out the settle time, and the final phase is
//! applied. The settle time is always waited, even when the setup phase had
//! nothing to change. Applying a phase that changes nothing writes nothing;
//! applying one that changes anything writes to every handler, so a handler
//! whose only change is a pin turning off still hears about it.
//!
//! The active set is only updated once every handler accepted its write. A
//! failed write leaves the previous record in place, so retrying the same
//! update writes the hardware again.

use std::thread;

use tracing::{debug, info, warn};

use crate::error::{HandlerError, SwitchError};
use crate::pins::{Pin, PinSet, PinSetState, PinUpdate};
use crate::sink::PinUpdateSink;

/// Driver for a group of physical pins
///
/// Handlers keep no record of which of their pins are active and must accept
/// being asked for the same pin set twice. Hardware is opened on the first
/// [`set_pins`](Self::set_pins), never on construction.
pub trait AddressHandler: Send {
    /// Pins this handler drives, in hardware order
    fn pin_list(&self) -> &[Pin];

    /// Assert exactly `active` (a subset of [`pin_list`](Self::pin_list)),
    /// deasserting every other pin this handler drives
    fn set_pins(&mut self, active: &PinSet) -> Result<(), HandlerError>;

    /// Release the hardware; a later `set_pins` reopens it
    fn close(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Name for logs
    fn name(&self) -> &str {
        "address-handler"
    }
}

struct RegisteredHandler {
    handler: Box<dyn AddressHandler>,
    pins: PinSet,
}

/// Batching dispatcher and single source of truth for active pins
pub struct VirtualAddressMap {
    handlers: Vec<RegisteredHandler>,
    all_pins: PinSet,
    pending: Vec<PinUpdate>,
    active: PinSet,
}

impl VirtualAddressMap {
    /// Register a set of handlers
    ///
    /// Pins claimed by more than one handler are tolerated; each such handler
    /// is told about them.
    pub fn new(handlers: Vec<Box<dyn AddressHandler>>) -> Self {
        let handlers: Vec<RegisteredHandler> = handlers
            .into_iter()
            .map(|handler| RegisteredHandler {
                pins: handler.pin_list().iter().collect(),
                handler,
            })
            .collect();

        let all_pins = handlers
            .iter()
            .fold(PinSet::new(), |acc, h| acc.union(&h.pins));

        Self {
            handlers,
            all_pins,
            pending: Vec::new(),
            active: PinSet::new(),
        }
    }

    /// Every pin serviced by some handler
    pub fn all_pins(&self) -> &PinSet {
        &self.all_pins
    }

    /// Snapshot of the currently active pins
    pub fn active_pins(&self) -> PinSet {
        self.active.clone()
    }

    /// Number of updates queued and not yet dispatched
    pub fn pending_updates(&self) -> usize {
        self.pending.len()
    }

    /// Pin sets of the registered handlers, in registration order
    pub fn handler_pins(&self) -> impl Iterator<Item = &PinSet> {
        self.handlers.iter().map(|h| &h.pins)
    }

    /// Queue an update, dispatching the whole queue if `trigger_update` is set
    pub fn add_update(&mut self, update: PinUpdate, trigger_update: bool) -> Result<(), SwitchError> {
        self.pending.push(update);
        if trigger_update {
            self.dispatch_pending()
        } else {
            Ok(())
        }
    }

    fn dispatch_pending(&mut self) -> Result<(), SwitchError> {
        let count = self.pending.len();
        let update = self
            .pending
            .drain(..)
            .fold(PinUpdate::default(), |acc, u| acc | u);

        for phase in [&update.setup, &update.final_state] {
            let conflicts = phase.conflicts();
            if !conflicts.is_empty() {
                return Err(SwitchError::PinConflict { pins: conflicts });
            }
            self.check_known(phase)?;
        }

        debug!(
            updates = count,
            setup_off = %update.setup.off,
            setup_on = %update.setup.on,
            final_off = %update.final_state.off,
            final_on = %update.final_state.on,
            "dispatching batched update"
        );

        self.dispatch_pin_state(&update.setup)?;
        if !update.minimum_change_time.is_zero() {
            thread::sleep(update.minimum_change_time);
        }
        self.dispatch_pin_state(&update.final_state)?;
        Ok(())
    }

    fn check_known(&self, state: &PinSetState) -> Result<(), SwitchError> {
        let unknown = state.referenced().difference(&self.all_pins);
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SwitchError::UnknownPin { pins: unknown })
        }
    }

    /// Apply one phase, writing every handler if the active set changes
    fn dispatch_pin_state(&mut self, state: &PinSetState) -> Result<(), SwitchError> {
        self.check_known(state)?;

        let new_active = self.active.union(&state.on).difference(&state.off);
        if new_active == self.active {
            return Ok(());
        }

        for registered in &mut self.handlers {
            let pins = registered.pins.intersection(&new_active);
            debug!(handler = registered.handler.name(), active = %pins, "set_pins");
            if let Err(e) = registered.handler.set_pins(&pins) {
                warn!(handler = registered.handler.name(), "set_pins failed: {}", e);
                return Err(e.into());
            }
        }
        self.active = new_active;
        Ok(())
    }

    /// Turn every known pin off
    ///
    /// Muxes feeding this map are not told; their recorded signal is
    /// unchanged.
    pub fn reset(&mut self) -> Result<(), SwitchError> {
        info!(pins = self.all_pins.len(), "resetting address map");
        let state = PinSetState::new(self.all_pins.clone(), PinSet::new());
        self.dispatch_pin_state(&state)
    }

    /// Close every handler, returning the first failure
    pub fn close(&mut self) -> Result<(), HandlerError> {
        let mut result = Ok(());
        for registered in &mut self.handlers {
            if let Err(e) = registered.handler.close() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

impl PinUpdateSink for VirtualAddressMap {
    fn add_update(&mut self, update: PinUpdate, trigger_update: bool) -> Result<(), SwitchError> {
        VirtualAddressMap::add_update(self, update, trigger_update)
    }
}

impl std::fmt::Debug for VirtualAddressMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualAddressMap")
            .field("handlers", &self.handlers.len())
            .field("all_pins", &self.all_pins)
            .field("pending", &self.pending.len())
            .field("active", &self.active)
            .finish()
    }
}
