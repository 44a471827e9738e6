//! Electrical bus of a formed structure.
//!
//! Each tick, every contiguous run of electrical segments (a section) moves
//! energy between the segments that have some and the segments that want
//! some. A section runs in two stages:
//!
//! 1. **Ports**: I/O segments with buffered world energy supply the bus.
//! 2. **Coils**: coils convert rotation into AC. A coil that took energy
//!    in the ports stage is running as a motor and sits this stage out.
//!
//! In each stage only the dominant waveform (largest total availability,
//! first seen wins ties) flows. The transfer is limited by both total
//! availability and total requested capacity.

use std::ops::Range;

use shaftwork_core::assembly::RotatingAssembly;
use shaftwork_core::waveform::Waveform;

use crate::energy_io::EnergyError;
use crate::segment::Segment;

/// Energy moved by one bus stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusTransfer {
    pub waveform: Waveform,
    pub energy: f64,
}

/// Which segments supply the bus in a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ports,
    Coils,
}

impl Stage {
    fn supplies(self, segment: &Segment) -> bool {
        match self {
            Stage::Ports => segment.io().is_some(),
            Stage::Coils => segment.is_coil(),
        }
    }
}

/// Maximal runs of consecutive electrical segments.
pub fn electrical_sections(segments: &[Segment]) -> Vec<Range<usize>> {
    let mut sections = Vec::new();
    let mut start = None;
    for (i, segment) in segments.iter().enumerate() {
        match (segment.is_electrical(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                sections.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        sections.push(s..segments.len());
    }
    sections
}

/// Run both stages over one section.
pub fn run_section(section: &mut [Segment], assembly: &mut RotatingAssembly) -> Result<Vec<BusTransfer>, EnergyError> {
    let mut transfers = Vec::new();
    let mut motoring = Vec::new();
    for stage in [Stage::Ports, Stage::Coils] {
        if let Some((t, receivers)) = transfer(section, assembly, stage, &motoring)? {
            transfers.push(t);
            motoring = receivers;
        }
    }
    Ok(transfers)
}

fn dominant_waveform(section: &[Segment], assembly: &RotatingAssembly, stage: Stage, skip: &[usize]) -> Option<Waveform> {
    let speed = assembly.speed();
    let mut totals: Vec<(Waveform, f64)> = Vec::new();
    let suppliers = section
        .iter()
        .enumerate()
        .filter(|(i, s)| stage.supplies(s) && !skip.contains(i))
        .map(|(_, s)| s);
    for segment in suppliers {
        let waveform = segment.produced_waveform(speed);
        let available = segment.available(assembly);
        if waveform.is_none() || available <= 0.0 {
            continue;
        }
        match totals.iter_mut().find(|(w, _)| *w == waveform) {
            Some((_, total)) => *total += available,
            None => totals.push((waveform, available)),
        }
    }
    let mut best: Option<(Waveform, f64)> = None;
    for (waveform, total) in totals {
        if best.is_none_or(|(_, b)| total > b) {
            best = Some((waveform, total));
        }
    }
    best.map(|(w, _)| w)
}

/// Run one stage. Returns `None` when nothing moved.
pub fn run_stage(
    section: &mut [Segment],
    assembly: &mut RotatingAssembly,
    stage: Stage,
) -> Result<Option<BusTransfer>, EnergyError> {
    Ok(transfer(section, assembly, stage, &[])?.map(|(t, _)| t))
}

/// One stage with the segments in `skip` barred from supplying. Also
/// returns the indices that received energy.
fn transfer(
    section: &mut [Segment],
    assembly: &mut RotatingAssembly,
    stage: Stage,
    skip: &[usize],
) -> Result<Option<(BusTransfer, Vec<usize>)>, EnergyError> {
    let Some(waveform) = dominant_waveform(section, assembly, stage, skip) else {
        return Ok(None);
    };
    let speed = assembly.speed();

    let producers: Vec<usize> = (0..section.len())
        .filter(|&i| {
            let s = &section[i];
            stage.supplies(s)
                && !skip.contains(&i)
                && s.produced_waveform(speed) == waveform
                && s.available(assembly) > 0.0
        })
        .collect();
    // Requests are fixed before anything moves: draining a coil changes the
    // speed, and with it the ramp-limited capacity of I/O segments.
    let requests: Vec<(usize, f64)> = (0..section.len())
        .filter(|i| !producers.contains(i))
        .map(|i| (i, section[i].request(waveform, assembly)))
        .filter(|&(_, request)| request > 0.0)
        .collect();

    let total_available: f64 = producers.iter().map(|&i| section[i].available(assembly)).sum();
    let total_requested: f64 = requests.iter().map(|&(_, request)| request).sum();
    let amount = total_available.min(total_requested);
    if amount <= 0.0 {
        return Ok(None);
    }

    // Coils share the assembly's energy, so availability is re-read per
    // producer.
    let mut remaining = amount;
    for &i in &producers {
        if remaining <= 0.0 {
            break;
        }
        let take = remaining.min(section[i].available(assembly));
        section[i].extract(take, speed, assembly)?;
        remaining -= take;
    }
    let moved = amount - remaining.max(0.0);

    let mut left = moved;
    let mut receivers = Vec::new();
    for &(i, request) in &requests {
        if left <= 0.0 {
            break;
        }
        let give = left.min(request);
        section[i].insert(give, waveform, speed, assembly)?;
        receivers.push(i);
        left -= give;
    }

    let transfer = BusTransfer {
        waveform,
        energy: moved,
    };
    Ok(Some((transfer, receivers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, SegmentKind, SegmentMatch};
    use crate::routing::BlockFace;
    use shaftwork_core::conversion::EnergyConversion;
    use shaftwork_core::geometry::{BlockPos, Facing};
    use shaftwork_core::id::AssemblyId;
    use slotmap::SlotMap;

    fn chain(kinds: &[SegmentKind]) -> (Vec<Segment>, RotatingAssembly) {
        let catalog = Catalog::default();
        let mut arena: SlotMap<AssemblyId, ()> = SlotMap::with_key();
        let id = arena.insert(());
        let segments: Vec<Segment> = kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| {
                let spec = catalog.spec(kind);
                let matched = SegmentMatch {
                    kind,
                    length: spec.length,
                    inertia: spec.inertia,
                    max_speed: spec.max_speed,
                    material: None,
                };
                Segment::new(spec, &matched, i as i32 + 1, id)
            })
            .collect();
        let assembly = RotatingAssembly::from_inertias(segments.iter().map(|s| s.inertia), true);
        (segments, assembly)
    }

    #[test]
    fn sections_split_on_inert_segments() {
        use SegmentKind::*;
        let (segments, _) = chain(&[SingleCoil, Electrodes, Shaft, Flywheel, Commutator, Shaft]);
        assert_eq!(electrical_sections(&segments), vec![0..2, 4..5]);
        let (segments, _) = chain(&[Shaft, Shaft]);
        assert!(electrical_sections(&segments).is_empty());
    }

    #[test]
    fn coils_generate_into_electrodes() {
        let (mut segments, mut assembly) = chain(&[SegmentKind::SingleCoil, SegmentKind::Electrodes]);
        assembly.apply_energy(10_000.0);

        let transfers = run_section(&mut segments, &mut assembly).unwrap();
        assert_eq!(transfers.len(), 1);
        assert!(transfers[0].waveform.is_ac());
        assert!((transfers[0].energy - 2000.0).abs() < 1e-6);
        assert!((assembly.kinetic_energy() - 8000.0).abs() < 1e-6);
        let stored = segments[1].io().unwrap().to_world().amount();
        assert!((stored - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn electrodes_drive_coils_as_motor() {
        let (mut segments, mut assembly) = chain(&[SegmentKind::Electrodes, SegmentKind::SingleCoil]);
        let face = BlockFace::new(BlockPos::new(-1, 0, 0), Facing::West);
        segments[0].io_mut().unwrap().routing_mut().cycle(&face);
        let conv = EnergyConversion::default();
        segments[0].io_mut().unwrap().receive_external(&face, 1000, false, &conv);

        let transfers = run_stage(&mut segments, &mut assembly, Stage::Ports).unwrap().unwrap();
        assert!((transfers.energy - 2000.0).abs() < 1e-6);
        assert!((assembly.kinetic_energy() - 2000.0).abs() < 1e-6);
        assert!((segments[0].io().unwrap().to_assembly().amount() - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn ramp_band_transfer_keeps_all_energy() {
        let (mut segments, mut assembly) = chain(&[SegmentKind::SingleCoil, SegmentKind::Commutator]);
        assembly.set_speed(8.0);
        let before = assembly.kinetic_energy();

        let transfers = run_section(&mut segments, &mut assembly).unwrap();
        let taken = before - assembly.kinetic_energy();
        let stored = segments[1].io().unwrap().to_world().amount();
        // L(8) = 0.648 caps the commutator's request at 1620 J.
        assert!((stored - 1620.0).abs() < 1e-6, "stored {stored}");
        assert!((taken - stored).abs() < 1e-6, "taken {taken}, stored {stored}");
        assert!((transfers[0].energy - stored).abs() < 1e-9);
        assert!(segments[1].io().unwrap().to_world().tag().is_dc());
    }

    #[test]
    fn motoring_coil_does_not_generate_back() {
        let (mut segments, mut assembly) = chain(&[SegmentKind::Electrodes, SegmentKind::SingleCoil]);
        let face = BlockFace::new(BlockPos::new(-1, 0, 0), Facing::West);
        segments[0].io_mut().unwrap().routing_mut().cycle(&face);
        let conv = EnergyConversion::default();
        segments[0].io_mut().unwrap().receive_external(&face, 1000, false, &conv);

        let transfers = run_section(&mut segments, &mut assembly).unwrap();
        assert_eq!(transfers.len(), 1);
        assert!((assembly.kinetic_energy() - 2000.0).abs() < 1e-6);
        assert_eq!(segments[0].io().unwrap().to_world().amount(), 0.0);
    }

    #[test]
    fn stationary_commutator_supplies_nothing() {
        let (mut segments, mut assembly) = chain(&[SegmentKind::Commutator, SegmentKind::SingleCoil]);
        let face = BlockFace::new(BlockPos::ORIGIN, Facing::Up);
        segments[0].io_mut().unwrap().routing_mut().cycle(&face);
        let conv = EnergyConversion::default();
        segments[0].io_mut().unwrap().receive_external(&face, 500, false, &conv);

        assert_eq!(run_stage(&mut segments, &mut assembly, Stage::Ports).unwrap(), None);
        assert_eq!(assembly.speed(), 0.0);
    }

    #[test]
    fn no_requesters_moves_nothing() {
        let (mut segments, mut assembly) = chain(&[SegmentKind::SingleCoil]);
        assembly.apply_energy(1000.0);
        assert!(run_section(&mut segments, &mut assembly).unwrap().is_empty());
        assert!((assembly.kinetic_energy() - 1000.0).abs() < 1e-9);
    }
}
