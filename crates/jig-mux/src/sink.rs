//! Update sinks
//!
//! A mux does not talk to hardware. Every [`PinUpdate`] it computes goes to
//! the [`UpdateSink`] it was constructed with: a [`VirtualAddressMap`] when
//! the mux is part of a jig, or a [`LogSink`] when it stands alone.
//!
//! [`VirtualAddressMap`]: crate::address::VirtualAddressMap

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::SwitchError;
use crate::pins::PinUpdate;

/// Receiver of pin updates produced by muxes
pub trait PinUpdateSink: Send {
    /// Queue an update, dispatching everything queued when `trigger_update` is set
    fn add_update(&mut self, update: PinUpdate, trigger_update: bool) -> Result<(), SwitchError>;
}

/// Sink that only logs the updates it receives
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl PinUpdateSink for LogSink {
    fn add_update(&mut self, update: PinUpdate, trigger_update: bool) -> Result<(), SwitchError> {
        debug!(
            setup_off = %update.setup.off,
            setup_on = %update.setup.on,
            final_off = %update.final_state.off,
            final_on = %update.final_state.on,
            settle_ms = update.minimum_change_time.as_millis() as u64,
            trigger_update,
            "pin update"
        );
        Ok(())
    }
}

/// Shared handle to a [`PinUpdateSink`]
///
/// Cloned into every mux of a jig so they all feed the same sink.
#[derive(Clone)]
pub struct UpdateSink(Arc<Mutex<dyn PinUpdateSink>>);

impl UpdateSink {
    /// Wrap a sink that only this handle (and its clones) will use
    pub fn new<S: PinUpdateSink + 'static>(sink: S) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }

    /// Wrap a sink that the caller keeps its own handle to
    pub fn shared<S: PinUpdateSink + 'static>(sink: Arc<Mutex<S>>) -> Self {
        Self(sink)
    }

    /// Sink for muxes that are not wired to any hardware
    pub fn log() -> Self {
        Self::new(LogSink)
    }

    /// Forward an update to the underlying sink
    pub fn send(&self, update: PinUpdate, trigger_update: bool) -> Result<(), SwitchError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_update(update, trigger_update)
    }
}

impl Default for UpdateSink {
    fn default() -> Self {
        Self::log()
    }
}

impl fmt::Debug for UpdateSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UpdateSink").field(&"<sink>").finish()
    }
}
