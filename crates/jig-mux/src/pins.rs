//! Pin and signal value types
//!
//! Everything the switching engine passes around is one of these immutable
//! values: a [`Pin`] names one physical control line, a [`Signal`] names a
//! routing state of a mux, and a [`PinUpdate`] describes a two-phase
//! transition of a [`PinSet`].

use std::borrow::Borrow;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier for one physical control line (relay coil, digital output bit)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Create a pin identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the pin name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Pin {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Pin {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&Pin> for Pin {
    fn from(pin: &Pin) -> Self {
        pin.clone()
    }
}

impl Borrow<str> for Pin {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical routing state of a mux
///
/// The empty signal `""` is reserved: every mux maps it to the empty pin set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signal(String);

impl Signal {
    /// Create a signal identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved "everything off" signal
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether this is the reserved "everything off" signal
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the signal name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Signal {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Signal {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&Signal> for Signal {
    fn from(signal: &Signal) -> Self {
        signal.clone()
    }
}

impl Borrow<str> for Signal {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Immutable, unordered set of pins with value semantics
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinSet(BTreeSet<Pin>);

impl PinSet {
    /// The empty set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Number of pins in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no pins
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `pin` is a member
    pub fn contains(&self, pin: &str) -> bool {
        self.0.contains(pin)
    }

    /// Iterate pins in sorted order
    pub fn iter(&self) -> btree_set::Iter<'_, Pin> {
        self.0.iter()
    }

    /// Pins in either set
    pub fn union(&self, other: &PinSet) -> PinSet {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Pins in `self` but not in `other`
    pub fn difference(&self, other: &PinSet) -> PinSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Pins in both sets
    pub fn intersection(&self, other: &PinSet) -> PinSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    /// Whether every pin of `self` is in `other`
    pub fn is_subset(&self, other: &PinSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Whether the sets share no pins
    pub fn is_disjoint(&self, other: &PinSet) -> bool {
        self.0.is_disjoint(&other.0)
    }
}

impl<P: Into<Pin>> FromIterator<P> for PinSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<P: Into<Pin>, const N: usize> From<[P; N]> for PinSet {
    fn from(pins: [P; N]) -> Self {
        pins.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a PinSet {
    type Item = &'a Pin;
    type IntoIter = btree_set::Iter<'a, Pin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for PinSet {
    type Item = Pin;
    type IntoIter = btree_set::IntoIter<Pin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for PinSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, pin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", pin)?;
        }
        f.write_str("}")
    }
}

/// Pins to deactivate and activate in one phase of a transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSetState {
    /// Pins to deassert
    #[serde(default)]
    pub off: PinSet,
    /// Pins to assert
    #[serde(default)]
    pub on: PinSet,
}

impl PinSetState {
    /// Create a phase from its off and on sets
    pub fn new(off: PinSet, on: PinSet) -> Self {
        Self { off, on }
    }

    /// Union of the off sets and of the on sets
    pub fn merge(&self, other: &PinSetState) -> PinSetState {
        Self {
            off: self.off.union(&other.off),
            on: self.on.union(&other.on),
        }
    }

    /// Pins requested both on and off
    pub fn conflicts(&self) -> PinSet {
        self.on.intersection(&self.off)
    }

    /// Every pin this phase references
    pub fn referenced(&self) -> PinSet {
        self.on.union(&self.off)
    }

    /// Whether this phase changes nothing
    pub fn is_noop(&self) -> bool {
        self.off.is_empty() && self.on.is_empty()
    }
}

/// A two-phase pin transition: `setup`, settle, then `final_state`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinUpdate {
    /// First phase, dispatched before the settle interval
    #[serde(default)]
    pub setup: PinSetState,
    /// Second phase, dispatched after the settle interval
    #[serde(default, rename = "final")]
    pub final_state: PinSetState,
    /// Minimum dwell between the two phases
    #[serde(default)]
    pub minimum_change_time: Duration,
}

impl PinUpdate {
    /// Create an update from both phases and a settle time
    pub fn new(setup: PinSetState, final_state: PinSetState, minimum_change_time: Duration) -> Self {
        Self {
            setup,
            final_state,
            minimum_change_time,
        }
    }

    /// Update with a no-op setup phase and no settle time
    pub fn immediate(final_state: PinSetState) -> Self {
        Self {
            final_state,
            ..Default::default()
        }
    }

    /// Logical OR of two updates: per-phase union, longest settle time
    pub fn merge(&self, other: &PinUpdate) -> PinUpdate {
        Self {
            setup: self.setup.merge(&other.setup),
            final_state: self.final_state.merge(&other.final_state),
            minimum_change_time: self.minimum_change_time.max(other.minimum_change_time),
        }
    }
}

impl BitOr for PinUpdate {
    type Output = PinUpdate;

    fn bitor(self, rhs: PinUpdate) -> PinUpdate {
        self.merge(&rhs)
    }
}

impl BitOrAssign for PinUpdate {
    fn bitor_assign(&mut self, rhs: PinUpdate) {
        *self = self.merge(&rhs);
    }
}
