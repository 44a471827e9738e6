//! Property-based tests for the shaft subsystem.
//!
//! Uses proptest to generate random chains, speeds, and buffer operation
//! sequences, then verify the structural invariants hold.

use proptest::prelude::*;
use shaftwork_core::assembly::RotatingAssembly;
use shaftwork_core::conversion::EnergyConversion;
use shaftwork_core::geometry::{BlockPos, Facing, LocalFrame};
use shaftwork_core::waveform::{Phases, Source, WaveKind, Waveform};
use shaftwork_core::test_utils::{EnergySink, GridWorld};
use shaftwork_mech::ShaftModule;
use shaftwork_mech::bus::{electrical_sections, run_section};
use shaftwork_mech::catalog::{Catalog, SegmentKind, SegmentMatch};
use shaftwork_mech::energy_io::ramp;
use shaftwork_mech::matcher::StructureMatcher;
use shaftwork_mech::routing::{FaceMode, SideRouting};
use shaftwork_mech::segment::Segment;
use shaftwork_mech::test_utils::{ChainBuilder, expected_inertia};

// ===========================================================================
// Generators
// ===========================================================================

fn arb_kind() -> impl Strategy<Value = SegmentKind> {
    (0..SegmentKind::ALL.len()).prop_map(|i| SegmentKind::ALL[i])
}

fn arb_chain(max_len: usize) -> impl Strategy<Value = Vec<SegmentKind>> {
    proptest::collection::vec(arb_kind(), 1..=max_len)
}

fn arb_facing() -> impl Strategy<Value = Facing> {
    (0..4usize).prop_map(|i| Facing::horizontals()[i])
}

/// Buffer operations against one I/O segment.
#[derive(Debug, Clone)]
enum IoOp {
    Receive(u64),
    /// Extract this fraction of what is available.
    Extract(f64),
    /// Insert this fraction of the requested capacity.
    Insert(f64),
    Push,
    Pull(u64),
    CycleFace(usize),
    SetSpeed(f64),
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<IoOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..5000u64).prop_map(IoOp::Receive),
            (0.0..=1.5f64).prop_map(IoOp::Extract),
            (0.0..=1.5f64).prop_map(IoOp::Insert),
            Just(IoOp::Push),
            (0..5000u64).prop_map(IoOp::Pull),
            (0..4usize).prop_map(IoOp::CycleFace),
            (0.0..20.0f64).prop_map(IoOp::SetSpeed),
        ],
        1..=max_ops,
    )
}

fn arb_electrical_kind() -> impl Strategy<Value = SegmentKind> {
    prop_oneof![
        Just(SegmentKind::SingleCoil),
        Just(SegmentKind::FourCoils),
        Just(SegmentKind::Electrodes),
        Just(SegmentKind::FourElectrodes),
        Just(SegmentKind::Commutator),
        Just(SegmentKind::FourPhaseCommutator),
        Just(SegmentKind::Shaft),
    ]
}

fn segment_at(kind: SegmentKind, offset: i32) -> Segment {
    let catalog = Catalog::default();
    let spec = catalog.spec(kind);
    let matched = SegmentMatch {
        kind,
        length: spec.length,
        inertia: spec.inertia,
        max_speed: spec.max_speed,
        material: None,
    };
    Segment::new(spec, &matched, offset, Default::default())
}

fn io_segment(kind: SegmentKind) -> Segment {
    segment_at(kind, 1)
}

/// Energy held by the assembly and every I/O buffer.
fn stored_energy(segments: &[Segment], assembly: &RotatingAssembly) -> f64 {
    let buffers: f64 = segments
        .iter()
        .filter_map(|s| s.io())
        .map(|io| io.to_assembly().amount() + io.to_world().amount())
        .sum();
    assembly.kinetic_energy() + buffers
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// The ramp stays in [0, 1] and has no jumps.
    #[test]
    fn ramp_is_bounded_and_continuous(
        min in 0.0..50.0f64,
        width in 0.5..50.0f64,
        speed in -10.0..120.0f64,
    ) {
        let max = min + width;
        let here = ramp(min, max, speed);
        prop_assert!((0.0..=1.0).contains(&here));
        let eps = 1e-7;
        let step = (ramp(min, max, speed + eps) - here).abs();
        prop_assert!(step <= 3.0 * eps / width + 1e-12, "jump of {} at {}", step, speed);
    }

    /// The descending ramp is the complement of the ascending one.
    #[test]
    fn descending_ramp_is_complement(
        min in 0.0..50.0f64,
        width in 0.5..50.0f64,
        speed in -10.0..120.0f64,
    ) {
        let max = min + width;
        prop_assert_eq!(ramp(max, min, speed), 1.0 - ramp(min, max, speed));
        prop_assert_eq!(ramp(min, max, min), 0.0);
        prop_assert_eq!(ramp(min, max, max), 1.0);
    }

    /// Every buffer stays within [0, capacity] under any operation sequence,
    /// and rejected operations leave the state untouched.
    #[test]
    fn buffers_stay_in_bounds(
        kind in prop_oneof![
            Just(SegmentKind::Electrodes),
            Just(SegmentKind::FourElectrodes),
            Just(SegmentKind::Commutator),
            Just(SegmentKind::FourPhaseCommutator),
        ],
        ops in arb_ops(40),
    ) {
        let mut segment = io_segment(kind);
        let conv = EnergyConversion::default();
        let mut world = GridWorld::new();
        for x in -3..=3 {
            for y in -3..=3 {
                world.place_sink(BlockPos::new(x, y, 1), EnergySink::new(700));
            }
        }
        let frame = LocalFrame::new(BlockPos::new(0, 0, 1), Facing::South, false);
        let bus = Waveform::new(
            WaveKind::Ac,
            if kind == SegmentKind::FourElectrodes || kind == SegmentKind::FourPhaseCommutator {
                Phases::Multi
            } else {
                Phases::Single
            },
            Source::Rotation,
        );
        let mut speed = 0.0;

        for op in ops {
            let io = segment.io_mut().unwrap();
            let faces = io.routing().faces().to_vec();
            match op {
                IoOp::Receive(units) => {
                    for face in &faces {
                        io.receive_external(face, units, false, &conv);
                    }
                }
                IoOp::Extract(fraction) => {
                    let amount = io.available_to_assembly(speed) * fraction;
                    let before = io.clone();
                    if io.extract_to_assembly(amount, speed).is_err() {
                        prop_assert!(fraction > 1.0);
                        prop_assert_eq!(&*io, &before);
                    }
                }
                IoOp::Insert(fraction) => {
                    let amount = io.request_capacity(bus, speed) * fraction;
                    let before = io.clone();
                    if io.insert_from_world(amount, bus, speed).is_err() {
                        prop_assert_eq!(&*io, &before);
                    }
                }
                IoOp::Push => {
                    io.push_to_world(&mut world, &frame, &conv);
                }
                IoOp::Pull(units) => {
                    for face in &faces {
                        io.extract_external(face, units, WaveKind::Dc, false, &conv);
                    }
                }
                IoOp::CycleFace(i) => {
                    if let Some(face) = faces.get(i % faces.len()) {
                        io.routing_mut().cycle(face);
                    }
                }
                IoOp::SetSpeed(s) => speed = s,
            }
            let io = segment.io().unwrap();
            for buffer in [io.to_assembly(), io.to_world()] {
                prop_assert!(buffer.amount() >= 0.0);
                prop_assert!(buffer.amount() <= buffer.capacity());
            }
        }
    }

    /// Cycling any face k times lands on the k-th mode.
    #[test]
    fn routing_cycles_with_period_three(kind in arb_kind(), k in 0..10usize) {
        let catalog = Catalog::default();
        let faces = &catalog.spec(kind).connections;
        let mut routing = SideRouting::new(faces);
        let modes = [FaceMode::None, FaceMode::Input, FaceMode::Output];
        for face in faces {
            for _ in 0..k {
                routing.cycle(face);
            }
            prop_assert_eq!(routing.mode(face), modes[k % 3]);
        }
    }

    /// Formation sums the inertia of every segment.
    #[test]
    fn formed_inertia_is_exact_sum(kinds in arb_chain(8), facing in arb_facing()) {
        let mut world = GridWorld::new();
        let chain = ChainBuilder::new(BlockPos::new(5, 64, -3), facing)
            .segments(&kinds)
            .build(&mut world);
        let mut module = ShaftModule::default();
        let id = module.try_form(&mut world, chain.origin, chain.trigger).unwrap();
        let structure = module.structure(id).unwrap();
        let assembly = module.assembly(structure.assembly).unwrap();
        prop_assert_eq!(structure.segments.len(), kinds.len());
        prop_assert_eq!(assembly.total_inertia(), expected_inertia(&kinds));
    }

    /// Popularity only changes search order, never the resolved structure.
    #[test]
    fn plan_is_independent_of_popularity(
        training in arb_chain(8),
        kinds in arb_chain(8),
        facing in arb_facing(),
    ) {
        let catalog = Catalog::default();

        let mut training_world = GridWorld::new();
        let trained_chain = ChainBuilder::new(BlockPos::ORIGIN, Facing::East)
            .segments(&training)
            .build(&mut training_world);
        let mut trained = StructureMatcher::new();
        trained
            .plan(&catalog, &training_world, trained_chain.origin, trained_chain.trigger, 32)
            .unwrap();

        let mut world = GridWorld::new();
        let chain = ChainBuilder::new(BlockPos::ORIGIN, facing).segments(&kinds).build(&mut world);
        let fresh_plan = StructureMatcher::new()
            .plan(&catalog, &world, chain.origin, chain.trigger, 32)
            .unwrap();
        let trained_plan = trained
            .plan(&catalog, &world, chain.origin, chain.trigger, 32)
            .unwrap();
        prop_assert_eq!(fresh_plan, trained_plan);
    }

    /// A bus pass only moves energy: whatever leaves the assembly or a
    /// buffer lands somewhere else, at any speed including the ramp band.
    #[test]
    fn bus_conserves_energy(
        kinds in proptest::collection::vec(arb_electrical_kind(), 1..=6),
        speed in 0.0..20.0f64,
        seeds in proptest::collection::vec(0..3000u64, 6),
    ) {
        let mut segments: Vec<Segment> = kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| segment_at(kind, i as i32 + 1))
            .collect();
        let conv = EnergyConversion::default();
        for (segment, &units) in segments.iter_mut().zip(&seeds) {
            let Some(io) = segment.io_mut() else { continue };
            // Ramped ports drain more than they deliver below full speed,
            // so only full-throughput ports get world energy.
            if io.limit(0.0) < 1.0 {
                continue;
            }
            let face = io.routing().faces()[0];
            io.routing_mut().cycle(&face);
            io.receive_external(&face, units, false, &conv);
        }
        let mut assembly = RotatingAssembly::from_inertias(segments.iter().map(|s| s.inertia), true);
        assembly.set_speed(speed);

        let before = stored_energy(&segments, &assembly);
        for range in electrical_sections(&segments) {
            run_section(&mut segments[range], &mut assembly).unwrap();
        }
        let after = stored_energy(&segments, &assembly);
        prop_assert!(
            (after - before).abs() <= 1e-9 * before.max(1.0),
            "before {}, after {}", before, after
        );
    }
}
