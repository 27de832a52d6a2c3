//! Signal definition compiler
//!
//! A mux declares its signals either as a flat list of `(signal, pins…)`
//! entries or as a nested tree of signals compiled by binary address
//! decomposition. Both forms compile to the same [`SignalMap`].
//!
//! # Tree decoding
//!
//! A tree level with `n` entries needs `ceil(log2(n))` address bits. The
//! first that many pins of the remaining pin list address this level and the
//! rest are handed down to nested levels. Entry `i` asserts the level pins
//! whose bit is set in `i` (pin `k` is bit `k`), plus every pin asserted by
//! the enclosing levels.
//!
//! ```
//! use jig_mux::{compile_signal_map, Pin, PinSet, SignalDefinition, TreeNode};
//!
//! let pins = vec![Pin::from("x0"), Pin::from("x1")];
//! let tree = SignalDefinition::Tree(vec![TreeNode::from("sig0"), TreeNode::from("sig1")]);
//! let map = compile_signal_map("demo", &pins, &tree).unwrap();
//!
//! assert_eq!(map["sig0"], PinSet::new());
//! assert_eq!(map["sig1"], PinSet::from(["x0"]));
//! assert_eq!(map[""], PinSet::new());
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::SwitchError;
use crate::pins::{Pin, PinSet, Signal};

/// Compiled `Signal -> PinSet` table of one mux
///
/// Each entry lists the pins that must be on for that signal; every other
/// pin the mux owns is off.
pub type SignalMap = BTreeMap<Signal, PinSet>;

/// One entry of a flat signal list: a signal and the pins it asserts
///
/// Serialized as `["signal", "pin", "pin", …]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FlatEntry {
    /// Signal being defined
    pub signal: Signal,
    /// Pins asserted for it
    pub pins: PinSet,
}

impl FlatEntry {
    /// Create an entry
    pub fn new(signal: impl Into<Signal>, pins: impl Into<PinSet>) -> Self {
        Self {
            signal: signal.into(),
            pins: pins.into(),
        }
    }
}

impl TryFrom<Vec<String>> for FlatEntry {
    type Error = String;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        let mut items = value.into_iter();
        let signal = items
            .next()
            .ok_or_else(|| "map_list entry must start with a signal name".to_string())?;
        Ok(Self {
            signal: Signal::from(signal),
            pins: items.collect(),
        })
    }
}

impl From<FlatEntry> for Vec<String> {
    fn from(entry: FlatEntry) -> Self {
        std::iter::once(entry.signal.as_str().to_string())
            .chain(entry.pins.iter().map(|p| p.as_str().to_string()))
            .collect()
    }
}

/// Node of a signal tree
///
/// Serialized as a string (signal), `null` (unused address) or an array
/// (nested level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// A signal occupying this address
    Signal(Signal),
    /// Reserved address with no signal
    Unused,
    /// A nested mux level behind this address
    Branch(Vec<TreeNode>),
}

impl TreeNode {
    /// Build a nested level
    pub fn branch<I>(nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TreeNode>,
    {
        Self::Branch(nodes.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for TreeNode {
    fn from(signal: &str) -> Self {
        Self::Signal(Signal::from(signal))
    }
}

impl From<Signal> for TreeNode {
    fn from(signal: Signal) -> Self {
        Self::Signal(signal)
    }
}

impl From<Option<&str>> for TreeNode {
    fn from(signal: Option<&str>) -> Self {
        signal.map_or(Self::Unused, Self::from)
    }
}

/// Declarative signal definition of a mux
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalDefinition {
    /// Flat list of signals and the pins each asserts
    Flat(Vec<FlatEntry>),
    /// Nested tree decoded by binary address decomposition
    Tree(Vec<TreeNode>),
}

impl SignalDefinition {
    /// Pins referenced by a flat definition, in first-use order
    pub fn referenced_pins(&self) -> Vec<Pin> {
        match self {
            Self::Flat(entries) => {
                let mut pins: Vec<Pin> = Vec::new();
                for pin in entries.iter().flat_map(|e| e.pins.iter()) {
                    if !pins.contains(pin) {
                        pins.push(pin.clone());
                    }
                }
                pins
            }
            Self::Tree(_) => Vec::new(),
        }
    }
}

/// Compile a signal definition into a signal map
///
/// The reserved empty signal is added afterwards, mapped to no pins.
/// Defining it explicitly is an error.
pub fn compile_signal_map(
    mux: &str,
    pin_list: &[Pin],
    definition: &SignalDefinition,
) -> Result<SignalMap, SwitchError> {
    let mut map = SignalMap::new();

    match definition {
        SignalDefinition::Flat(entries) => compile_flat(mux, entries, &mut map)?,
        SignalDefinition::Tree(nodes) => decode_tree(mux, nodes, pin_list, &PinSet::new(), &mut map)?,
    }

    if map.contains_key("") {
        return Err(SwitchError::DuplicateSignalDefinition {
            mux: mux.to_string(),
            signal: Signal::empty(),
        });
    }
    map.insert(Signal::empty(), PinSet::new());

    Ok(map)
}

fn compile_flat(mux: &str, entries: &[FlatEntry], map: &mut SignalMap) -> Result<(), SwitchError> {
    let mut addresses: HashSet<&PinSet> = HashSet::new();

    for entry in entries {
        let duplicate = map.contains_key(&entry.signal) || addresses.contains(&entry.pins);
        if duplicate {
            return Err(SwitchError::DuplicateSignalDefinition {
                mux: mux.to_string(),
                signal: entry.signal.clone(),
            });
        }
        addresses.insert(&entry.pins);
        map.insert(entry.signal.clone(), entry.pins.clone());
    }

    Ok(())
}

/// Number of address bits needed to index `len` entries
fn address_bits(len: usize) -> usize {
    if len <= 1 {
        0
    } else {
        (usize::BITS - (len - 1).leading_zeros()) as usize
    }
}

fn decode_tree(
    mux: &str,
    tree: &[TreeNode],
    pins: &[Pin],
    fixed_pins: &PinSet,
    map: &mut SignalMap,
) -> Result<(), SwitchError> {
    let bits = address_bits(tree.len());
    if bits > pins.len() {
        return Err(SwitchError::MuxDefinition {
            mux: mux.to_string(),
            reason: format!(
                "tree level with {} entries needs {} address pins, only {} left",
                tree.len(),
                bits,
                pins.len()
            ),
        });
    }
    let (level_pins, remaining) = pins.split_at(bits);

    for (index, node) in tree.iter().enumerate() {
        let address = level_pins
            .iter()
            .enumerate()
            .filter(|(bit, _)| (index >> bit) & 1 == 1)
            .map(|(_, pin)| pin)
            .collect::<PinSet>()
            .union(fixed_pins);

        match node {
            TreeNode::Unused => {}
            TreeNode::Signal(signal) => {
                if map.insert(signal.clone(), address).is_some() {
                    return Err(SwitchError::DuplicateSignalDefinition {
                        mux: mux.to_string(),
                        signal: signal.clone(),
                    });
                }
            }
            TreeNode::Branch(children) => decode_tree(mux, children, remaining, &address, map)?,
        }
    }

    Ok(())
}
