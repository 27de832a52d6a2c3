//! Jig driver: wires a mux group to its address handlers

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::address::{AddressHandler, VirtualAddressMap};
use crate::error::{HandlerError, SwitchError};
use crate::group::MuxGroup;
use crate::pins::{Pin, PinSet, PinSetState, PinUpdate, Signal};
use crate::sink::UpdateSink;

/// A mux group bound to the address handlers that realise it
///
/// Every mux of the group is built with a sink feeding this driver's
/// [`VirtualAddressMap`]. Construction fails if any mux uses a pin that no
/// handler drives. Handlers are closed when the driver is dropped.
pub struct JigDriver<G> {
    mux: G,
    map: Arc<Mutex<VirtualAddressMap>>,
}

impl<G: MuxGroup> JigDriver<G> {
    /// Build the address map from `handlers`, then the group from `factory`
    ///
    /// The factory receives the sink every mux of the group must use.
    pub fn new<F>(handlers: Vec<Box<dyn AddressHandler>>, factory: F) -> Result<Self, SwitchError>
    where
        F: FnOnce(UpdateSink) -> Result<G, SwitchError>,
    {
        let map = Arc::new(Mutex::new(VirtualAddressMap::new(handlers)));
        let mux = factory(UpdateSink::shared(map.clone()))?;

        let driver = Self { mux, map };
        driver.validate()?;

        info!(
            group = driver.mux.name(),
            muxes = driver.mux.muxes().len(),
            pins = driver.lock_map().all_pins().len(),
            "jig ready"
        );
        Ok(driver)
    }

    fn validate(&self) -> Result<(), SwitchError> {
        let map = self.lock_map();
        for mux in self.mux.muxes() {
            let missing = mux.pins().difference(map.all_pins());
            if !missing.is_empty() {
                return Err(SwitchError::MissingHandlerCoverage {
                    mux: mux.name().to_string(),
                    pins: missing,
                });
            }
        }
        Ok(())
    }

    /// The mux group
    pub fn mux(&self) -> &G {
        &self.mux
    }

    /// The mux group, for switching
    pub fn mux_mut(&mut self) -> &mut G {
        &mut self.mux
    }

    /// Reset every mux in one dispatch, then turn off any remaining pins
    pub fn reset(&mut self) -> Result<(), SwitchError> {
        info!(group = self.mux.name(), "resetting jig");
        self.mux.reset()?;
        self.lock_map().reset()
    }

    /// Current signal of every mux
    pub fn all_mux_signals(&self) -> Vec<(String, Signal)> {
        self.mux.active_signals()
    }

    /// Assert or deassert one raw pin, bypassing the muxes
    pub fn debug_set_pin(&mut self, pin: impl Into<Pin>, active: bool) -> Result<(), SwitchError> {
        let pin = PinSet::from([pin.into()]);
        let state = if active {
            PinSetState::new(PinSet::new(), pin)
        } else {
            PinSetState::new(pin, PinSet::new())
        };
        self.lock_map().add_update(PinUpdate::immediate(state), true)
    }

    /// Make exactly `pins` active, bypassing the muxes
    pub fn debug_set_pins(&mut self, pins: impl Into<PinSet>) -> Result<(), SwitchError> {
        let mut map = self.lock_map();
        let on = pins.into();
        let off = map.all_pins().difference(&on);
        map.add_update(PinUpdate::immediate(PinSetState::new(off, on)), true)
    }
}

impl<G> JigDriver<G> {
    fn lock_map(&self) -> MutexGuard<'_, VirtualAddressMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the active pins
    pub fn active_pins(&self) -> PinSet {
        self.lock_map().active_pins()
    }

    /// Every pin serviced by the jig's handlers
    pub fn all_pins(&self) -> PinSet {
        self.lock_map().all_pins().clone()
    }

    /// Close every address handler
    pub fn close(&mut self) -> Result<(), HandlerError> {
        self.lock_map().close()
    }
}

impl<G> Drop for JigDriver<G> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close address handlers: {}", e);
        }
    }
}

impl<G: std::fmt::Debug> std::fmt::Debug for JigDriver<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JigDriver")
            .field("mux", &self.mux)
            .field("map", &self.map)
            .finish()
    }
}
