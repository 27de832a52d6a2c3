//! Integration tests for the switching engine
//!
//! These tests drive complete jigs end to end:
//! - Signal map compilation from flat and tree definitions
//! - Batched, two-phase dispatch to address handlers
//! - Handler coverage validation at jig construction
//! - Raw pin access and reset behaviour

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jig_mux::{
    compile_signal_map, AddressHandler, FlatEntry, HandlerError, JigDriver, MuxBundle, MuxGroup,
    Pin, PinSet, RelayMatrixMux, Signal, SignalDefinition, SignalMap, SwitchError, TreeNode,
    UpdateSink, VirtualAddressMap, VirtualMux, VirtualSwitch,
};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Write log shared between a handler and the test
    #[derive(Clone, Default)]
    pub struct Probe {
        pub writes: Arc<Mutex<Vec<PinSet>>>,
        pub closes: Arc<AtomicUsize>,
    }

    impl Probe {
        pub fn writes(&self) -> Vec<PinSet> {
            self.writes.lock().unwrap().clone()
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }

        pub fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    /// Handler that records every write
    pub struct RecordingHandler {
        pins: Vec<Pin>,
        probe: Probe,
    }

    impl AddressHandler for RecordingHandler {
        fn pin_list(&self) -> &[Pin] {
            &self.pins
        }

        fn set_pins(&mut self, active: &PinSet) -> Result<(), HandlerError> {
            self.probe.writes.lock().unwrap().push(active.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), HandlerError> {
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn pins(names: &[&str]) -> Vec<Pin> {
        names.iter().map(|n| Pin::from(*n)).collect()
    }

    pub fn handler(names: &[&str]) -> (Box<dyn AddressHandler>, Probe) {
        let probe = Probe::default();
        let handler = RecordingHandler {
            pins: pins(names),
            probe: probe.clone(),
        };
        (Box::new(handler), probe)
    }

    /// A jig defined the usual way: one struct field per mux
    #[derive(Debug)]
    pub struct BenchMuxes {
        pub dmm: RelayMatrixMux,
        pub sel: VirtualMux,
        pub buzzer: VirtualSwitch,
    }

    impl BenchMuxes {
        pub fn new(sink: UpdateSink) -> Result<Self, SwitchError> {
            let dmm = SignalDefinition::Flat(vec![
                FlatEntry::new("Vout", ["k0"]),
                FlatEntry::new("Iout", ["k1"]),
            ]);
            let sel = SignalDefinition::Tree(vec![
                TreeNode::from("S0"),
                TreeNode::from("S1"),
                TreeNode::from("S2"),
                TreeNode::from("S3"),
            ]);
            Ok(Self {
                dmm: RelayMatrixMux::new("dmm", pins(&["k0", "k1"]), &dmm, sink.clone())?,
                sel: VirtualMux::new("sel", pins(&["a0", "a1"]), &sel, sink.clone())?,
                buzzer: VirtualSwitch::new("buzzer", "b0", sink)?,
            })
        }
    }

    impl MuxGroup for BenchMuxes {
        fn name(&self) -> &str {
            "bench"
        }

        fn muxes(&self) -> Vec<&VirtualMux> {
            vec![&*self.dmm, &self.sel, &*self.buzzer]
        }

        fn muxes_mut(&mut self) -> Vec<&mut VirtualMux> {
            vec![&mut *self.dmm, &mut self.sel, &mut *self.buzzer]
        }
    }

    /// Bench jig with relays, selector and buzzer on separate handlers
    pub fn bench() -> (JigDriver<BenchMuxes>, Probe, Probe, Probe) {
        let (relays, relay_probe) = handler(&["k0", "k1"]);
        let (select, select_probe) = handler(&["a0", "a1"]);
        let (misc, misc_probe) = handler(&["b0", "spare"]);
        let jig = JigDriver::new(vec![relays, select, misc], BenchMuxes::new).unwrap();
        (jig, relay_probe, select_probe, misc_probe)
    }
}

// ============================================================================
// Signal Map Tests
// ============================================================================

mod signal_map_tests {
    use super::*;

    fn nested_tree() -> Vec<TreeNode> {
        vec![
            TreeNode::from("a0"),
            TreeNode::branch([Some("a1_b0"), Some("a1_b1"), Some("a1_b2"), None]),
            TreeNode::branch([
                TreeNode::from("a2_b0"),
                TreeNode::branch(["a2_b1_c0", "a2_b1_c1"]),
                TreeNode::from("a2_b2"),
                TreeNode::from("a2_b3"),
            ]),
            TreeNode::from("a3"),
        ]
    }

    #[test]
    fn two_signal_tree() {
        let map = compile_signal_map(
            "m",
            &helpers::pins(&["x0", "x1"]),
            &SignalDefinition::Tree(vec!["sig0".into(), "sig1".into()]),
        )
        .unwrap();

        let expected: SignalMap = [
            (Signal::empty(), PinSet::new()),
            (Signal::from("sig0"), PinSet::new()),
            (Signal::from("sig1"), PinSet::from(["x0"])),
        ]
        .into_iter()
        .collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn nested_tree_decodes() {
        let map = compile_signal_map(
            "m",
            &helpers::pins(&["x0", "x1", "x2", "x3", "x4"]),
            &SignalDefinition::Tree(nested_tree()),
        )
        .unwrap();

        assert_eq!(map["a1_b1"], PinSet::from(["x0", "x2"]));
        assert_eq!(map["a2_b1_c0"], PinSet::from(["x1", "x2"]));
        assert_eq!(map["a2_b1_c1"], PinSet::from(["x1", "x2", "x4"]));
        assert_eq!(map["a2_b3"], PinSet::from(["x1", "x2", "x3"]));
    }

    #[test]
    fn nested_tree_matches_flat_list() {
        let pin_list = helpers::pins(&["x0", "x1", "x2", "x3", "x4"]);
        let tree = compile_signal_map("m", &pin_list, &SignalDefinition::Tree(nested_tree())).unwrap();

        let flat = SignalDefinition::Flat(vec![
            FlatEntry::new("a0", PinSet::new()),
            FlatEntry::new("a1_b0", ["x0"]),
            FlatEntry::new("a1_b1", ["x0", "x2"]),
            FlatEntry::new("a1_b2", ["x0", "x3"]),
            FlatEntry::new("a2_b0", ["x1"]),
            FlatEntry::new("a2_b1_c0", ["x1", "x2"]),
            FlatEntry::new("a2_b1_c1", ["x1", "x2", "x4"]),
            FlatEntry::new("a2_b2", ["x1", "x3"]),
            FlatEntry::new("a2_b3", ["x1", "x2", "x3"]),
            FlatEntry::new("a3", ["x0", "x1"]),
        ]);
        let flat = compile_signal_map("m", &pin_list, &flat).unwrap();

        assert_eq!(tree, flat);
    }

    #[test]
    fn tree_parsed_from_json() {
        let tree: Vec<TreeNode> = serde_json::from_str(
            r#"["a0", ["a1_b0", "a1_b1", "a1_b2", null],
                ["a2_b0", ["a2_b1_c0", "a2_b1_c1"], "a2_b2", "a2_b3"], "a3"]"#,
        )
        .unwrap();
        assert_eq!(tree, nested_tree());
    }

    #[test]
    fn every_mux_maps_empty_signal_to_nothing() {
        let switch = VirtualSwitch::new("sw", "p", UpdateSink::log()).unwrap();
        let def = SignalDefinition::Flat(vec![FlatEntry::new("A", ["p"])]);
        let matrix = RelayMatrixMux::new("rm", Vec::new(), &def, UpdateSink::log()).unwrap();

        for mux in [&*switch, &*matrix] {
            assert_eq!(mux.pins_for(""), Some(&PinSet::new()));
            assert!(mux.all_signals().any(|s| s.is_empty()));
        }
    }
}

// ============================================================================
// Jig Construction Tests
// ============================================================================

mod construction_tests {
    use super::*;

    #[test]
    fn missing_coverage_fails() {
        let (relays, _) = helpers::handler(&["k0", "k1"]);
        let (select, _) = helpers::handler(&["a0"]);
        let (misc, _) = helpers::handler(&["b0"]);

        let err = JigDriver::new(vec![relays, select, misc], helpers::BenchMuxes::new).unwrap_err();

        match err {
            SwitchError::MissingHandlerCoverage { mux, pins } => {
                assert_eq!(mux, "sel");
                assert_eq!(pins, PinSet::from(["a1"]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extra_handler_pins_are_fine() {
        let (jig, ..) = helpers::bench();
        assert!(jig.all_pins().contains("spare"));
        assert!(jig.active_pins().is_empty());
    }

    #[test]
    fn construction_writes_nothing() {
        let (_jig, relays, select, misc) = helpers::bench();
        assert_eq!(relays.write_count(), 0);
        assert_eq!(select.write_count(), 0);
        assert_eq!(misc.write_count(), 0);
    }

    #[test]
    fn factory_errors_propagate() {
        let (h, _) = helpers::handler(&["x"]);
        let result = JigDriver::new(vec![h], |sink| {
            let def = SignalDefinition::Flat(vec![FlatEntry::new("", ["x"])]);
            let mut group = MuxBundle::new("bad");
            group.push(VirtualMux::new("m", Vec::new(), &def, sink)?)?;
            Ok(group)
        });
        assert!(matches!(result, Err(SwitchError::DuplicateSignalDefinition { .. })));
    }

    #[test]
    fn handlers_closed_on_drop() {
        let (jig, relays, select, _) = helpers::bench();
        drop(jig);
        assert_eq!(relays.closes(), 1);
        assert_eq!(select.closes(), 1);
    }
}

// ============================================================================
// Switching Tests
// ============================================================================

mod switching_tests {
    use super::*;

    #[test]
    fn multiplex_reaches_hardware() {
        let (mut jig, relays, select, misc) = helpers::bench();

        jig.mux_mut().sel.switch_to("S3").unwrap();

        assert_eq!(jig.active_pins(), PinSet::from(["a0", "a1"]));
        assert_eq!(select.writes(), vec![PinSet::from(["a0", "a1"])]);
        // Every handler hears about a change, not only the one that owns it
        assert_eq!(relays.writes(), vec![PinSet::new()]);
        assert_eq!(misc.writes(), vec![PinSet::new()]);
    }

    #[test]
    fn repeat_signal_writes_nothing() {
        let (mut jig, _, select, _) = helpers::bench();

        jig.mux_mut().sel.switch_to("S2").unwrap();
        let count = select.write_count();
        jig.mux_mut().sel.switch_to("S2").unwrap();

        assert_eq!(select.write_count(), count);
    }

    #[test]
    fn batched_updates_dispatch_once() {
        let (mut jig, relays, select, misc) = helpers::bench();

        let muxes = jig.mux_mut();
        muxes.sel.multiplex("S1", false).unwrap();
        muxes.buzzer.multiplex(true, false).unwrap();
        muxes.dmm.multiplex("Vout", true).unwrap();

        // Break-before-make setup opens relays that are already open: no write
        assert_eq!(relays.writes(), vec![PinSet::from(["k0"])]);
        assert_eq!(select.writes(), vec![PinSet::from(["a0"])]);
        assert_eq!(misc.writes(), vec![PinSet::from(["b0"])]);
        assert_eq!(jig.active_pins(), PinSet::from(["a0", "b0", "k0"]));
    }

    #[test]
    fn relay_matrix_breaks_before_make() {
        let (mut jig, relays, _, _) = helpers::bench();

        jig.mux_mut().dmm.switch_to("Vout").unwrap();
        jig.mux_mut().dmm.switch_to("Iout").unwrap();

        assert_eq!(
            relays.writes(),
            vec![PinSet::from(["k0"]), PinSet::new(), PinSet::from(["k1"])]
        );
    }

    #[test]
    fn relay_matrix_same_signal_does_not_reopen() {
        let (mut jig, relays, _, _) = helpers::bench();

        jig.mux_mut().dmm.switch_to("Vout").unwrap();
        jig.mux_mut().dmm.switch_to("Vout").unwrap();

        assert_eq!(relays.writes(), vec![PinSet::from(["k0"])]);
    }

    #[test]
    fn invalid_signal_changes_nothing() {
        let (mut jig, _, select, _) = helpers::bench();
        jig.mux_mut().sel.switch_to("S1").unwrap();

        let err = jig.mux_mut().sel.switch_to("S9").unwrap_err();

        assert!(matches!(err, SwitchError::InvalidSignal { .. }));
        assert_eq!(jig.mux().sel.state().as_str(), "S1");
        assert_eq!(select.write_count(), 1);
    }

    #[test]
    fn shared_pin_conflict_is_rejected() {
        let (h, probe) = helpers::handler(&["x0", "x1"]);
        let mut jig = JigDriver::new(vec![h], |sink| {
            let a = SignalDefinition::Flat(vec![FlatEntry::new("On", ["x0"])]);
            let b = SignalDefinition::Flat(vec![FlatEntry::new("Other", ["x1"])]);
            let mut group = MuxBundle::new("shared");
            group.push(VirtualMux::new("a", Vec::new(), &a, sink.clone())?)?;
            group.push(VirtualMux::new("b", helpers::pins(&["x0", "x1"]), &b, sink)?)?;
            Ok(group)
        })
        .unwrap();

        let muxes = jig.mux_mut();
        muxes.get_mut("a").unwrap().multiplex("On", false).unwrap();
        let err = muxes.get_mut("b").unwrap().multiplex("Other", true).unwrap_err();

        assert!(matches!(err, SwitchError::PinConflict { ref pins } if *pins == PinSet::from(["x0"])));
        assert!(jig.active_pins().is_empty());
        assert_eq!(probe.write_count(), 0);
    }

    #[test]
    fn all_mux_signals_reports_state() {
        let (mut jig, ..) = helpers::bench();
        jig.mux_mut().buzzer.on().unwrap();

        let signals = jig.all_mux_signals();
        assert_eq!(
            signals,
            vec![
                ("dmm".to_string(), Signal::empty()),
                ("sel".to_string(), Signal::empty()),
                ("buzzer".to_string(), Signal::from("On")),
            ]
        );
    }
}

// ============================================================================
// Reset and Debug Access Tests
// ============================================================================

mod reset_tests {
    use super::*;

    #[test]
    fn jig_reset_clears_muxes_and_raw_pins() {
        let (mut jig, _, _, misc) = helpers::bench();
        jig.mux_mut().sel.switch_to("S2").unwrap();
        jig.mux_mut().dmm.switch_to("Iout").unwrap();
        jig.debug_set_pin("spare", true).unwrap();

        jig.reset().unwrap();

        assert!(jig.active_pins().is_empty());
        assert!(jig.all_mux_signals().iter().all(|(_, s)| s.is_empty()));
        assert_eq!(misc.writes().last(), Some(&PinSet::new()));
    }

    #[test]
    fn group_reset_is_one_dispatch() {
        let (mut jig, _, select, _) = helpers::bench();
        jig.mux_mut().sel.switch_to("S3").unwrap();
        jig.mux_mut().buzzer.on().unwrap();
        let before = select.write_count();

        jig.mux_mut().reset().unwrap();

        // The relay matrix setup only opens relays that are already open
        assert_eq!(select.write_count(), before + 1);
        assert!(jig.active_pins().is_empty());
    }

    #[test]
    fn debug_set_pins_is_exact() {
        let (mut jig, relays, _, misc) = helpers::bench();

        jig.debug_set_pins(["k1", "spare"]).unwrap();
        assert_eq!(jig.active_pins(), PinSet::from(["k1", "spare"]));

        jig.debug_set_pins(["b0"]).unwrap();
        assert_eq!(jig.active_pins(), PinSet::from(["b0"]));
        assert_eq!(relays.writes().last(), Some(&PinSet::new()));
        assert_eq!(misc.writes().last(), Some(&PinSet::from(["b0"])));

        jig.debug_set_pin("b0", false).unwrap();
        assert!(jig.active_pins().is_empty());
    }

    #[test]
    fn debug_set_unknown_pin() {
        let (mut jig, ..) = helpers::bench();
        let err = jig.debug_set_pin("nope", true).unwrap_err();
        assert!(matches!(err, SwitchError::UnknownPin { .. }));
    }

    #[test]
    fn map_reset_leaves_mux_state() {
        let (h, probe) = helpers::handler(&["x0", "x1"]);
        let map = Arc::new(Mutex::new(VirtualAddressMap::new(vec![h])));
        let def = SignalDefinition::Tree(vec!["A".into(), "B".into()]);
        let mut mux =
            VirtualMux::new("m", helpers::pins(&["x0"]), &def, UpdateSink::shared(map.clone())).unwrap();

        mux.switch_to("B").unwrap();
        map.lock().unwrap().reset().unwrap();

        assert_eq!(mux.state().as_str(), "B");
        assert!(map.lock().unwrap().active_pins().is_empty());

        // The map works from its own record, so reselecting restores hardware
        mux.switch_to("B").unwrap();
        assert_eq!(map.lock().unwrap().active_pins(), PinSet::from(["x0"]));
        assert_eq!(probe.write_count(), 3);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use jig_mux::{PinSetState, PinUpdate};
    use proptest::prelude::*;
    use std::time::Duration;

    fn pin_set() -> impl Strategy<Value = PinSet> {
        prop::collection::btree_set(0usize..8, 0..8)
            .prop_map(|idx| idx.into_iter().map(|i| format!("p{i}")).collect::<PinSet>())
    }

    fn pin_update() -> impl Strategy<Value = PinUpdate> {
        (pin_set(), pin_set(), pin_set(), pin_set(), 0u64..100).prop_map(
            |(setup_off, setup_on, final_off, final_on, ms)| {
                PinUpdate::new(
                    PinSetState::new(setup_off, setup_on),
                    PinSetState::new(final_off, final_on),
                    Duration::from_millis(ms),
                )
            },
        )
    }

    fn tree_node() -> impl Strategy<Value = TreeNode> {
        let leaf = prop_oneof![
            3 => Just(TreeNode::Signal(Signal::from("leaf"))),
            1 => Just(TreeNode::Unused),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop::collection::vec(inner, 1..5).prop_map(TreeNode::Branch)
        })
    }

    /// Give every signal in the tree a unique name
    fn rename(nodes: &mut [TreeNode], next: &mut usize) {
        for node in nodes {
            match node {
                TreeNode::Signal(signal) => {
                    *signal = Signal::from(format!("s{next}"));
                    *next += 1;
                }
                TreeNode::Unused => {}
                TreeNode::Branch(children) => rename(children, next),
            }
        }
    }

    /// Index and level size of every step from the root to each signal
    fn signal_paths(
        nodes: &[TreeNode],
        prefix: &mut Vec<(usize, usize)>,
        out: &mut Vec<(Signal, Vec<(usize, usize)>)>,
    ) {
        for (index, node) in nodes.iter().enumerate() {
            prefix.push((index, nodes.len()));
            match node {
                TreeNode::Signal(signal) => out.push((signal.clone(), prefix.clone())),
                TreeNode::Unused => {}
                TreeNode::Branch(children) => signal_paths(children, prefix, out),
            }
            prefix.pop();
        }
    }

    /// Pins needed to give `len` entries distinct addresses
    fn level_width(len: usize) -> usize {
        let mut width = 0;
        while (1usize << width) < len {
            width += 1;
        }
        width
    }

    /// Walk a path, taking each level's pins from the front of the pin list
    fn path_address(path: &[(usize, usize)], pin_list: &[Pin]) -> PinSet {
        let mut cursor = 0;
        let mut address = Vec::new();
        for &(index, len) in path {
            let width = level_width(len);
            for bit in 0..width {
                if index & (1 << bit) != 0 {
                    address.push(pin_list[cursor + bit].clone());
                }
            }
            cursor += width;
        }
        address.into_iter().collect()
    }

    proptest! {
        #[test]
        fn merge_is_per_phase_union(a in pin_update(), b in pin_update()) {
            let merged = a.merge(&b);

            prop_assert_eq!(&merged.setup.on, &a.setup.on.union(&b.setup.on));
            prop_assert_eq!(&merged.setup.off, &a.setup.off.union(&b.setup.off));
            prop_assert_eq!(&merged.final_state.on, &a.final_state.on.union(&b.final_state.on));
            prop_assert_eq!(&merged.final_state.off, &a.final_state.off.union(&b.final_state.off));
            prop_assert_eq!(
                merged.minimum_change_time,
                a.minimum_change_time.max(b.minimum_change_time)
            );
        }

        #[test]
        fn flat_and_tree_compile_identically(
            mut tree in prop::collection::vec(tree_node(), 1..5)
        ) {
            let mut next = 0;
            rename(&mut tree, &mut next);
            let pin_list: Vec<Pin> = (0..16).map(|i| Pin::from(format!("x{i}"))).collect();

            let mut paths = Vec::new();
            signal_paths(&tree, &mut Vec::new(), &mut paths);
            let entries = paths
                .iter()
                .map(|(signal, path)| FlatEntry::new(signal.clone(), path_address(path, &pin_list)))
                .collect();

            let from_tree = compile_signal_map("m", &pin_list, &SignalDefinition::Tree(tree)).unwrap();
            let from_flat = compile_signal_map("m", &pin_list, &SignalDefinition::Flat(entries)).unwrap();

            prop_assert_eq!(from_tree, from_flat);
        }

        #[test]
        fn active_pins_follow_last_signal(signals in prop::collection::vec(0usize..4, 1..10)) {
            let (mut jig, ..) = helpers::bench();
            let names = ["S0", "S1", "S2", "S3"];

            for &i in &signals {
                jig.mux_mut().sel.switch_to(names[i]).unwrap();
            }

            let last = names[*signals.last().unwrap()];
            let expected = jig.mux().sel.pins_for(last).unwrap().clone();
            prop_assert_eq!(jig.active_pins(), expected);
        }
    }
}
