//! Declarative jig definitions
//!
//! Muxes can be declared in data (JSON or any serde format) instead of
//! code. The format mirrors the in-code builders:
//!
//! ```json
//! {
//!   "name": "bench",
//!   "muxes": [
//!     { "name": "dmm", "kind": "relay_matrix", "pin_list": ["k1", "k2"],
//!       "map_list": [["Vout", "k1"], ["Iout", "k2"]] },
//!     { "name": "sel", "pin_list": ["a0", "a1", "a2"],
//!       "map_tree": ["s0", ["s1_0", "s1_1"], null, "s3"] },
//!     { "name": "buzzer", "kind": "switch", "pin_list": "b0" }
//!   ]
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SwitchError;
use crate::group::MuxBundle;
use crate::mux::VirtualMux;
use crate::pins::{Pin, Signal};
use crate::sink::UpdateSink;
use crate::switch::{RelayMatrixMux, VirtualSwitch};
use crate::tree::{FlatEntry, SignalDefinition, TreeNode};

/// Which mux specialisation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxKind {
    /// Plain mux, direct switching
    #[default]
    Mux,
    /// Single-pin on/off switch
    Switch,
    /// Break-before-make relay matrix
    RelayMatrix,
}

/// A pin list, or a single pin as shorthand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PinList {
    /// One pin
    One(Pin),
    /// Ordered pins
    Many(Vec<Pin>),
}

impl PinList {
    /// The pins as an ordered list
    pub fn to_vec(&self) -> Vec<Pin> {
        match self {
            Self::One(pin) => vec![pin.clone()],
            Self::Many(pins) => pins.clone(),
        }
    }
}

impl Default for PinList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Declaration of one mux
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxDefinition {
    /// Mux name, unique within its group
    pub name: String,
    /// Specialisation
    #[serde(default)]
    pub kind: MuxKind,
    /// Owned pins; order drives tree decoding
    #[serde(default)]
    pub pin_list: PinList,
    /// Flat signal list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_list: Option<Vec<FlatEntry>>,
    /// Nested signal tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_tree: Option<Vec<TreeNode>>,
    /// Settle time between phases, overriding the kind's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearing_time_ms: Option<u64>,
    /// Signal assumed before the first switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_signal: Option<Signal>,
}

impl MuxDefinition {
    /// The declared signal definition
    ///
    /// Exactly one of `map_list` and `map_tree` must be given, except for a
    /// switch, which may give neither.
    pub fn signal_definition(&self) -> Result<Option<SignalDefinition>, SwitchError> {
        match (&self.map_list, &self.map_tree) {
            (Some(list), None) => Ok(Some(SignalDefinition::Flat(list.clone()))),
            (None, Some(tree)) => Ok(Some(SignalDefinition::Tree(tree.clone()))),
            (None, None) if self.kind == MuxKind::Switch => Ok(None),
            (None, None) => Err(self.invalid("neither map_list nor map_tree is defined")),
            (Some(_), Some(_)) => Err(self.invalid("both map_list and map_tree are defined")),
        }
    }

    fn invalid(&self, reason: &str) -> SwitchError {
        SwitchError::MuxDefinition {
            mux: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Build the mux, sending its updates to `sink`
    pub fn build(&self, sink: UpdateSink) -> Result<VirtualMux, SwitchError> {
        let definition = self.signal_definition()?;
        let pin_list = self.pin_list.to_vec();

        let mux: VirtualMux = match (self.kind, definition) {
            (MuxKind::Switch, definition) => {
                let [pin] = <[Pin; 1]>::try_from(pin_list)
                    .map_err(|_| self.invalid("a switch needs exactly one pin"))?;
                let switch = match definition {
                    Some(definition) => VirtualSwitch::with_definition(&self.name, pin, &definition, sink)?,
                    None => VirtualSwitch::new(&self.name, pin, sink)?,
                };
                switch.into()
            }
            (MuxKind::RelayMatrix, Some(definition)) => {
                RelayMatrixMux::new(&self.name, pin_list, &definition, sink)?.into()
            }
            (MuxKind::Mux, Some(definition)) => VirtualMux::new(&self.name, pin_list, &definition, sink)?,
            (_, None) => return Err(self.invalid("neither map_list nor map_tree is defined")),
        };

        let mux = match self.clearing_time_ms {
            Some(ms) => mux.with_clearing_time(Duration::from_millis(ms)),
            None => mux,
        };

        match &self.default_signal {
            Some(signal) => mux.with_default_signal(signal.clone()),
            None => Ok(mux),
        }
    }
}

/// Declaration of a whole mux group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDefinition {
    /// Group name
    pub name: String,
    /// Muxes, in reset order
    #[serde(default)]
    pub muxes: Vec<MuxDefinition>,
}

impl GroupDefinition {
    /// Build every mux into a [`MuxBundle`], all sharing `sink`
    pub fn build(&self, sink: UpdateSink) -> Result<MuxBundle, SwitchError> {
        let mut bundle = MuxBundle::new(&self.name);
        for definition in &self.muxes {
            bundle.push(definition.build(sink.clone())?)?;
        }
        Ok(bundle)
    }
}
