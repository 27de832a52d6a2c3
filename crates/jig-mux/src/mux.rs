//! Virtual multiplexer
//!
//! A [`VirtualMux`] owns a fixed list of pins and a compiled signal map. Asking
//! it for a signal produces a two-phase [`PinUpdate`] that it hands to its
//! [`UpdateSink`]; the mux itself never touches hardware.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SwitchError;
use crate::pins::{Pin, PinSet, PinSetState, PinUpdate, Signal};
use crate::sink::UpdateSink;
use crate::tree::{compile_signal_map, SignalDefinition, SignalMap};

/// How a mux sequences the two phases of a signal change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchingPolicy {
    /// No setup phase; go straight to the target pins
    #[default]
    Direct,
    /// Open every owned pin first, settle, then close the target pins
    BreakBeforeMake,
}

impl SwitchingPolicy {
    /// Compute the `(setup, final)` phases for a change from `old` to `new`
    ///
    /// `target` is the pin set of `new`; `owned` is every pin of the mux.
    pub fn calculate_pins(
        &self,
        owned: &PinSet,
        old: &Signal,
        new: &Signal,
        target: &PinSet,
    ) -> (PinSetState, PinSetState) {
        let final_state = PinSetState::new(owned.difference(target), target.clone());

        match self {
            Self::Direct => (PinSetState::default(), final_state),
            // Reselecting the current signal must not open and reclose the relays
            Self::BreakBeforeMake if old == new => (final_state.clone(), final_state),
            Self::BreakBeforeMake => (PinSetState::new(owned.clone(), PinSet::new()), final_state),
        }
    }
}

/// Logical multiplexer mapping named signals to sets of active pins
#[derive(Debug)]
pub struct VirtualMux {
    name: String,
    pin_list: Vec<Pin>,
    owned: PinSet,
    signal_map: SignalMap,
    policy: SwitchingPolicy,
    clearing_time: Duration,
    state: Signal,
    last_change: Option<Instant>,
    sink: UpdateSink,
}

impl VirtualMux {
    /// Compile a mux from its pin list and signal definition
    ///
    /// A flat definition may leave `pin_list` empty, in which case the mux
    /// owns exactly the pins its entries reference.
    pub fn new(
        name: impl Into<String>,
        pin_list: Vec<Pin>,
        definition: &SignalDefinition,
        sink: UpdateSink,
    ) -> Result<Self, SwitchError> {
        let name = name.into();
        let pin_list = if pin_list.is_empty() {
            definition.referenced_pins()
        } else {
            pin_list
        };
        let owned: PinSet = pin_list.iter().collect();

        if owned.len() != pin_list.len() {
            return Err(SwitchError::MuxDefinition {
                mux: name,
                reason: "pin_list contains duplicate pins".to_string(),
            });
        }

        let signal_map = compile_signal_map(&name, &pin_list, definition)?;

        if let Some((signal, pins)) = signal_map.iter().find(|(_, pins)| !pins.is_subset(&owned)) {
            return Err(SwitchError::MuxDefinition {
                reason: format!(
                    "signal {} uses pins {} outside pin_list",
                    signal,
                    pins.difference(&owned)
                ),
                mux: name,
            });
        }

        Ok(Self {
            name,
            pin_list,
            owned,
            signal_map,
            policy: SwitchingPolicy::Direct,
            clearing_time: Duration::ZERO,
            state: Signal::empty(),
            last_change: None,
            sink,
        })
    }

    /// Use a different switching policy
    pub fn with_policy(mut self, policy: SwitchingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the settle time between the setup and final phases
    pub fn with_clearing_time(mut self, clearing_time: Duration) -> Self {
        self.clearing_time = clearing_time;
        self
    }

    /// Set the signal the mux is assumed to be in before its first switch
    pub fn with_default_signal(mut self, signal: impl Into<Signal>) -> Result<Self, SwitchError> {
        let signal = signal.into();
        self.check_signal(&signal)?;
        self.state = signal;
        Ok(self)
    }

    /// Mux name used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current signal
    pub fn state(&self) -> &Signal {
        &self.state
    }

    /// Every pin this mux owns
    pub fn pins(&self) -> &PinSet {
        &self.owned
    }

    /// Owned pins in declaration order
    pub fn pin_list(&self) -> &[Pin] {
        &self.pin_list
    }

    /// Every declared signal, including the empty signal
    pub fn all_signals(&self) -> impl Iterator<Item = &Signal> {
        self.signal_map.keys()
    }

    /// The compiled signal map
    pub fn signal_map(&self) -> &SignalMap {
        &self.signal_map
    }

    /// Pins asserted for `signal`, if it is declared
    pub fn pins_for(&self, signal: &str) -> Option<&PinSet> {
        self.signal_map.get(signal)
    }

    /// Switching policy
    pub fn policy(&self) -> SwitchingPolicy {
        self.policy
    }

    /// Settle time between phases
    pub fn clearing_time(&self) -> Duration {
        self.clearing_time
    }

    /// Time of the last actual signal change
    pub fn last_change(&self) -> Option<Instant> {
        self.last_change
    }

    fn check_signal(&self, signal: &Signal) -> Result<(), SwitchError> {
        if self.signal_map.contains_key(signal) {
            Ok(())
        } else {
            Err(SwitchError::InvalidSignal {
                mux: self.name.clone(),
                signal: signal.clone(),
            })
        }
    }

    /// Compute the update for a change from the current signal to `signal`
    pub fn update_for(&self, signal: &Signal) -> Result<PinUpdate, SwitchError> {
        let target = self
            .signal_map
            .get(signal)
            .ok_or_else(|| SwitchError::InvalidSignal {
                mux: self.name.clone(),
                signal: signal.clone(),
            })?;

        let (setup, final_state) =
            self.policy
                .calculate_pins(&self.owned, &self.state, signal, target);

        Ok(PinUpdate::new(setup, final_state, self.clearing_time))
    }

    /// Switch to `signal`
    ///
    /// With `trigger_update` unset the update is only queued at the sink, so
    /// several muxes can be switched in one hardware dispatch.
    pub fn multiplex(
        &mut self,
        signal: impl Into<Signal>,
        trigger_update: bool,
    ) -> Result<(), SwitchError> {
        let signal = signal.into();
        let update = self.update_for(&signal)?;

        debug!(mux = %self.name, from = %self.state, to = %signal, trigger_update, "multiplex");
        self.sink.send(update, trigger_update)?;

        if signal != self.state {
            self.last_change = Some(Instant::now());
            self.state = signal;
        }
        Ok(())
    }

    /// Switch to `signal` and dispatch immediately
    pub fn switch_to(&mut self, signal: impl Into<Signal>) -> Result<(), SwitchError> {
        self.multiplex(signal, true)
    }

    /// Switch to the empty signal, turning every owned pin off
    pub fn reset(&mut self, trigger_update: bool) -> Result<(), SwitchError> {
        self.multiplex(Signal::empty(), trigger_update)
    }

    /// Block until `duration` has passed since the last signal change
    pub fn wait_at_least(&self, duration: Duration) {
        let Some(changed) = self.last_change else {
            return;
        };
        let remaining = duration.saturating_sub(changed.elapsed());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }
}
