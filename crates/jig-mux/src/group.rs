//! Groups of muxes belonging to one jig

use tracing::debug;

use crate::error::SwitchError;
use crate::mux::VirtualMux;
use crate::pins::Signal;

/// A named bundle of the muxes of one jig
///
/// Jig definitions usually implement this on a struct with one field per
/// mux; [`MuxBundle`] covers groups assembled at runtime.
pub trait MuxGroup {
    /// Group name for logs
    fn name(&self) -> &str;

    /// Every mux of the group, in reset order
    fn muxes(&self) -> Vec<&VirtualMux>;

    /// Mutable access to every mux of the group, in reset order
    fn muxes_mut(&mut self) -> Vec<&mut VirtualMux>;

    /// Reset every mux, dispatching them all in a single hardware update
    fn reset(&mut self) -> Result<(), SwitchError> {
        let mut muxes = self.muxes_mut();
        let Some(last) = muxes.pop() else {
            return Ok(());
        };
        for mux in muxes {
            mux.reset(false)?;
        }
        last.reset(true)
    }

    /// Current signal of every mux, by mux name
    fn active_signals(&self) -> Vec<(String, Signal)> {
        self.muxes()
            .into_iter()
            .map(|m| (m.name().to_string(), m.state().clone()))
            .collect()
    }
}

/// A mux group assembled at runtime
#[derive(Debug)]
pub struct MuxBundle {
    name: String,
    muxes: Vec<VirtualMux>,
}

impl MuxBundle {
    /// Create an empty group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            muxes: Vec::new(),
        }
    }

    /// Add a mux; names must be unique within the group
    pub fn push(&mut self, mux: impl Into<VirtualMux>) -> Result<(), SwitchError> {
        let mux = mux.into();
        if self.get(mux.name()).is_some() {
            return Err(SwitchError::MuxDefinition {
                mux: mux.name().to_string(),
                reason: format!("group {} already has a mux with this name", self.name),
            });
        }
        debug!(group = %self.name, mux = mux.name(), "adding mux");
        self.muxes.push(mux);
        Ok(())
    }

    /// Look up a mux by name
    pub fn get(&self, name: &str) -> Option<&VirtualMux> {
        self.muxes.iter().find(|m| m.name() == name)
    }

    /// Look up a mux by name for switching
    pub fn get_mut(&mut self, name: &str) -> Option<&mut VirtualMux> {
        self.muxes.iter_mut().find(|m| m.name() == name)
    }

    /// Number of muxes
    pub fn len(&self) -> usize {
        self.muxes.len()
    }

    /// Whether the group has no muxes
    pub fn is_empty(&self) -> bool {
        self.muxes.is_empty()
    }
}

impl MuxGroup for MuxBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn muxes(&self) -> Vec<&VirtualMux> {
        self.muxes.iter().collect()
    }

    fn muxes_mut(&mut self) -> Vec<&mut VirtualMux> {
        self.muxes.iter_mut().collect()
    }
}
