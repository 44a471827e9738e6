//! Integration test: saving a live structure and loading it into a fresh
//! module, as happens across a world reload.

use shaftwork_core::geometry::{BlockPos, Facing};
use shaftwork_core::test_utils::GridWorld;
use shaftwork_core::world::{Metal, World};
use shaftwork_mech::ShaftModule;
use shaftwork_mech::catalog::SegmentKind;
use shaftwork_mech::segment::{Actor, Tool};
use shaftwork_mech::serialize::{DeserializeError, SegmentRecord};
use shaftwork_mech::test_utils::ChainBuilder;

/// A spinning generator with buffered energy and non-default routing.
fn running_structure() -> (ShaftModule, GridWorld, shaftwork_core::id::StructureId) {
    let mut world = GridWorld::new();
    let chain = ChainBuilder::new(BlockPos::new(-20, 5, 33), Facing::North)
        .segments(&[SegmentKind::SingleCoil, SegmentKind::Electrodes, SegmentKind::Shaft])
        .flywheel(Metal::Copper)
        .segment(SegmentKind::Commutator)
        .build(&mut world);
    let mut module = ShaftModule::default();
    let id = module.try_form(&mut world, chain.origin, chain.trigger).unwrap();
    let structure = module.structure(id).unwrap();
    let frame = structure.frame;
    let handle = structure.assembly;

    module.assembly_mut(handle).unwrap().set_speed(7.123456789);
    let west = frame.to_real(BlockPos::new(-1, 0, 2));
    module.interact(west, frame.to_real_facing(Facing::West), Actor::AUTHORITY, Tool::Hammer);
    module.receive_external(west, frame.to_real_facing(Facing::West), 333, false);
    module.tick(&mut world, 0);
    (module, world, id)
}

#[test]
fn reload_restores_identical_state() {
    let (module, world, id) = running_structure();
    let saved = module.structure_record(id).unwrap();
    let bytes = module.save_structure(id).unwrap();

    let mut reloaded_world = world.clone();
    let mut reloaded = ShaftModule::default();
    let new_id = reloaded.load_structure(&mut reloaded_world, &bytes).unwrap();

    let restored = reloaded.structure_record(new_id).unwrap();
    assert_eq!(restored, saved);
    assert_eq!(restored.speed.to_bits(), saved.speed.to_bits());

    let before = module.structure(id).unwrap();
    let after = reloaded.structure(new_id).unwrap();
    assert_eq!(after.frame, before.frame);
    assert_eq!(after.far_end, before.far_end);
    for (a, b) in after.segments.iter().zip(&before.segments) {
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.offset, b.offset);
        assert_eq!(a.inertia, b.inertia);
        assert_eq!(a.max_speed, b.max_speed);
        assert_eq!(a.io(), b.io());
    }
    assert_eq!(
        reloaded.assembly(after.assembly).unwrap().total_inertia(),
        module.assembly(before.assembly).unwrap().total_inertia()
    );
    for cell in after.absorbed() {
        assert_eq!(reloaded.structure_at(cell.pos), Some(new_id));
        assert_eq!(reloaded_world.block(cell.pos).formed().map(|f| f.structure), Some(new_id));
    }
}

#[test]
fn reloaded_structure_keeps_running() {
    let (mut module, mut world, id) = running_structure();
    let bytes = module.save_structure(id).unwrap();
    let mut reloaded_world = world.clone();
    let mut reloaded = ShaftModule::default();
    let new_id = reloaded.load_structure(&mut reloaded_world, &bytes).unwrap();

    for tick in 1..20 {
        module.tick(&mut world, tick);
        reloaded.tick(&mut reloaded_world, tick);
    }
    assert_eq!(
        reloaded.structure_record(new_id).unwrap(),
        module.structure_record(id).unwrap()
    );

    assert!(reloaded.disassemble(&mut reloaded_world, new_id));
    assert!(module.disassemble(&mut world, id));
    let a: Vec<_> = world.blocks().collect();
    let b: Vec<_> = reloaded_world.blocks().collect();
    assert_eq!(a, b);
}

#[test]
fn segment_records_survive_json() {
    let (module, _world, id) = running_structure();
    let record = module.structure_record(id).unwrap();
    for part in record.parts.iter().filter_map(|p| p.record.as_ref()) {
        let json = part.to_json().unwrap();
        assert!(json.contains("\"inBuffer\""));
        assert!(json.contains("\"sideConfig\""));
        assert_eq!(&SegmentRecord::from_json(&json).unwrap(), part);
    }
}

#[test]
fn corrupt_snapshot_is_rejected_without_side_effects() {
    let (module, world, id) = running_structure();
    let mut bytes = module.save_structure(id).unwrap();
    bytes.truncate(bytes.len() / 2);

    let mut target = world.clone();
    let writes = target.write_count();
    let mut fresh = ShaftModule::default();
    assert!(matches!(
        fresh.load_structure(&mut target, &bytes),
        Err(DeserializeError::Decode(_))
    ));
    assert_eq!(fresh.structure_count(), 0);
    assert_eq!(target.write_count(), writes);
}

#[test]
fn loading_over_a_live_structure_is_rejected() {
    let (mut module, mut world, id) = running_structure();
    let bytes = module.save_structure(id).unwrap();
    let writes = world.write_count();

    assert!(matches!(
        module.load_structure(&mut world, &bytes),
        Err(DeserializeError::Occupied(_))
    ));
    assert_eq!(module.structure_count(), 1);
    assert_eq!(world.write_count(), writes);
    for cell in module.structure(id).unwrap().absorbed() {
        assert_eq!(module.structure_at(cell.pos), Some(id));
    }
}
