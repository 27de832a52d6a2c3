//! Specialised muxes: single-pin switches and relay matrices

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::error::SwitchError;
use crate::mux::{SwitchingPolicy, VirtualMux};
use crate::pins::{Pin, PinSet, Signal};
use crate::sink::UpdateSink;
use crate::tree::{FlatEntry, SignalDefinition};

/// Default settle time of a relay matrix between opening and closing relays
pub const RELAY_MATRIX_CLEARING_TIME: Duration = Duration::from_millis(10);

/// Signal accepted by a [`VirtualSwitch`]: a boolean or a declared name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchSignal {
    /// `true` is "On", `false` is "Off"
    Bool(bool),
    /// Any declared signal name
    Named(Signal),
}

impl SwitchSignal {
    fn into_signal(self) -> Signal {
        match self {
            Self::Bool(true) => Signal::from(VirtualSwitch::ON),
            Self::Bool(false) => Signal::from(VirtualSwitch::OFF),
            Self::Named(signal) => signal,
        }
    }
}

impl From<bool> for SwitchSignal {
    fn from(on: bool) -> Self {
        Self::Bool(on)
    }
}

impl From<&str> for SwitchSignal {
    fn from(signal: &str) -> Self {
        Self::Named(Signal::from(signal))
    }
}

impl From<String> for SwitchSignal {
    fn from(signal: String) -> Self {
        Self::Named(Signal::from(signal))
    }
}

impl From<Signal> for SwitchSignal {
    fn from(signal: Signal) -> Self {
        Self::Named(signal)
    }
}

/// A mux with one pin and the signals "Off" and "On"
#[derive(Debug)]
pub struct VirtualSwitch(VirtualMux);

impl VirtualSwitch {
    /// Signal that asserts the pin
    pub const ON: &'static str = "On";
    /// Signal that releases the pin
    pub const OFF: &'static str = "Off";

    /// Create a switch driving `pin`
    pub fn new(name: impl Into<String>, pin: impl Into<Pin>, sink: UpdateSink) -> Result<Self, SwitchError> {
        let pin = pin.into();
        let definition = SignalDefinition::Flat(vec![
            FlatEntry::new(Self::OFF, PinSet::new()),
            FlatEntry::new(Self::ON, [pin.clone()]),
        ]);
        Self::with_definition(name, pin, &definition, sink)
    }

    /// Create a switch with its own signal names
    ///
    /// Booleans still map to "On"/"Off", so those only work if declared.
    pub fn with_definition(
        name: impl Into<String>,
        pin: impl Into<Pin>,
        definition: &SignalDefinition,
        sink: UpdateSink,
    ) -> Result<Self, SwitchError> {
        VirtualMux::new(name, vec![pin.into()], definition, sink).map(Self)
    }

    /// Switch using a boolean or a signal name
    pub fn multiplex(&mut self, signal: impl Into<SwitchSignal>, trigger_update: bool) -> Result<(), SwitchError> {
        self.0.multiplex(signal.into().into_signal(), trigger_update)
    }

    /// Turn the switch on or off and dispatch immediately
    pub fn set(&mut self, on: bool) -> Result<(), SwitchError> {
        self.multiplex(on, true)
    }

    /// Turn the switch on
    pub fn on(&mut self) -> Result<(), SwitchError> {
        self.set(true)
    }

    /// Turn the switch off
    pub fn off(&mut self) -> Result<(), SwitchError> {
        self.set(false)
    }

    /// Whether the switch's pin is asserted in the current signal
    pub fn is_on(&self) -> bool {
        self.0
            .pins_for(self.0.state().as_str())
            .is_some_and(|pins| !pins.is_empty())
    }

    /// Unwrap into the underlying mux
    pub fn into_inner(self) -> VirtualMux {
        self.0
    }
}

impl From<VirtualSwitch> for VirtualMux {
    fn from(switch: VirtualSwitch) -> Self {
        switch.0
    }
}

impl Deref for VirtualSwitch {
    type Target = VirtualMux;

    fn deref(&self) -> &VirtualMux {
        &self.0
    }
}

impl DerefMut for VirtualSwitch {
    fn deref_mut(&mut self) -> &mut VirtualMux {
        &mut self.0
    }
}

/// A relay matrix mux switched break-before-make
///
/// Every relay the mux owns is opened and allowed to settle before the relays
/// of the new signal are closed.
#[derive(Debug)]
pub struct RelayMatrixMux(VirtualMux);

impl RelayMatrixMux {
    /// Compile a relay matrix with the default clearing time
    pub fn new(
        name: impl Into<String>,
        pin_list: Vec<Pin>,
        definition: &SignalDefinition,
        sink: UpdateSink,
    ) -> Result<Self, SwitchError> {
        let mux = VirtualMux::new(name, pin_list, definition, sink)?
            .with_policy(SwitchingPolicy::BreakBeforeMake)
            .with_clearing_time(RELAY_MATRIX_CLEARING_TIME);
        Ok(Self(mux))
    }

    /// Override the settle time
    pub fn with_clearing_time(self, clearing_time: Duration) -> Self {
        Self(self.0.with_clearing_time(clearing_time))
    }

    /// Unwrap into the underlying mux
    pub fn into_inner(self) -> VirtualMux {
        self.0
    }
}

impl From<RelayMatrixMux> for VirtualMux {
    fn from(matrix: RelayMatrixMux) -> Self {
        matrix.0
    }
}

impl Deref for RelayMatrixMux {
    type Target = VirtualMux;

    fn deref(&self) -> &VirtualMux {
        &self.0
    }
}

impl DerefMut for RelayMatrixMux {
    fn deref_mut(&mut self) -> &mut VirtualMux {
        &mut self.0
    }
}
