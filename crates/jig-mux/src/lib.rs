//! Virtual Signal-Switching Engine
//!
//! This crate maps named logical signals of a test jig onto the physical
//! control lines (relays, digital outputs) that route them, and sequences
//! the switching across every device that drives those lines.
//!
//! # Architecture
//!
//! - A [`VirtualMux`] compiles a declarative signal definition (a flat list or
//!   a nested address tree) into a `Signal -> PinSet` table and turns a
//!   requested signal into a two-phase [`PinUpdate`].
//! - [`VirtualSwitch`] and [`RelayMatrixMux`] specialise it for single-pin
//!   switches and break-before-make relay matrices.
//! - A [`VirtualAddressMap`] batches updates from any number of muxes,
//!   rejects conflicting or unknown pins, and writes the result to its
//!   [`AddressHandler`]s.
//! - A [`JigDriver`] builds a [`MuxGroup`] wired to an address map and checks
//!   that every pin a mux uses is driven by some handler.
//!
//! Everything runs synchronously on the caller's thread. The only waits are
//! the settle time between the two phases of an update and
//! [`VirtualMux::wait_at_least`].
//!
//! # Example
//!
//! ```rust,no_run
//! use jig_mux::{JigDriver, MuxBundle, SignalDefinition, TreeNode, VirtualMux, Pin};
//! # fn handlers() -> Vec<Box<dyn jig_mux::AddressHandler>> { Vec::new() }
//!
//! let mut jig = JigDriver::new(handlers(), |sink| {
//!     let tree = SignalDefinition::Tree(vec![TreeNode::from("Gnd"), TreeNode::from("Vout")]);
//!     let mut group = MuxBundle::new("bench");
//!     group.push(VirtualMux::new("dmm", vec![Pin::from("k0")], &tree, sink)?)?;
//!     Ok(group)
//! })?;
//!
//! jig.mux_mut().get_mut("dmm").unwrap().switch_to("Vout")?;
//! jig.reset()?;
//! # Ok::<(), jig_mux::SwitchError>(())
//! ```

pub mod address;
pub mod definition;
pub mod driver;
pub mod error;
pub mod group;
pub mod mux;
pub mod pins;
pub mod sink;
pub mod switch;
pub mod tree;

pub use address::{AddressHandler, VirtualAddressMap};
pub use definition::{GroupDefinition, MuxDefinition, MuxKind, PinList};
pub use driver::JigDriver;
pub use error::{HandlerError, SwitchError};
pub use group::{MuxBundle, MuxGroup};
pub use mux::{SwitchingPolicy, VirtualMux};
pub use pins::{Pin, PinSet, PinSetState, PinUpdate, Signal};
pub use sink::{LogSink, PinUpdateSink, UpdateSink};
pub use switch::{RelayMatrixMux, SwitchSignal, VirtualSwitch, RELAY_MATRIX_CLEARING_TIME};
pub use tree::{compile_signal_map, FlatEntry, SignalDefinition, SignalMap, TreeNode};
