//! Uplink Resource Occupation
//!
//! Shared bookkeeping of PUCCH resources across all UEs of the cell: a per beam,
//! per buffered slot map of reserved symbols on every PRB, and the optional
//! analog beam allocator deciding which beams may be served in a beam period.

use common::types::SlotTime;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Maximum number of PRBs in a carrier
pub const MAX_PRBS: usize = 275;

/// Analog beam settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamConfig {
    /// Beams that can be served simultaneously
    pub beams_per_period: usize,
    /// Slots during which the beam set stays fixed
    #[serde(default = "default_beam_duration")]
    pub beam_duration: u16,
}

fn default_beam_duration() -> u16 {
    1
}

/// Beam slot taken for a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamAlloc {
    /// Occupation map layer of the beam
    pub idx: usize,
    /// Beam was free before this allocation
    pub new_beam: bool,
}

/// Record of what a reservation took, used to undo it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub time: SlotTime,
    pub ue_beam: u16,
    pub beam: BeamAlloc,
    /// (absolute PRB, symbol bitmap) pairs set in the map
    pub cells: Vec<(u16, u16)>,
}

/// Why a reservation could not be made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveFailure {
    /// No beam slot left for the UE beam
    Beam,
    /// Some symbol of a requested PRB is already taken
    Prb { prb: u16 },
}

/// Beam served in one beam slot of one beam period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BeamSlot {
    beam: u16,
    /// Absolute beam period the entry belongs to
    period: u32,
    /// Live reservations on this beam slot
    users: usize,
}

/// Analog beam allocator
#[derive(Debug, Clone)]
pub struct BeamAllocator {
    config: Option<BeamConfig>,
    /// `[beam slot][period index]` -> beam occupying it
    allocation: Vec<Vec<Option<BeamSlot>>>,
    slots_per_frame: u16,
}

impl BeamAllocator {
    /// `size` beam periods are buffered
    pub fn new(config: Option<BeamConfig>, size: usize, slots_per_frame: u16) -> Self {
        let beams = config.as_ref().map_or(0, |c| c.beams_per_period);
        Self {
            config,
            allocation: vec![vec![None; size.max(1)]; beams],
            slots_per_frame,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Layers needed in the occupation map
    pub fn num_beams(&self) -> usize {
        self.config.as_ref().map_or(1, |c| c.beams_per_period.max(1))
    }

    /// (absolute beam period, buffer index) of `time`
    fn period(&self, config: &BeamConfig, time: SlotTime) -> (u32, usize) {
        let period = time.absolute_slot(self.slots_per_frame) / config.beam_duration.max(1) as u32;
        let size = self.allocation.first().map_or(1, |a| a.len());
        (period, period as usize % size)
    }

    /// Take or share a beam slot for `ue_beam` at `time`
    ///
    /// Every successful call must be paired with a [`release`](Self::release).
    pub fn allocate(&mut self, time: SlotTime, ue_beam: u16) -> Option<BeamAlloc> {
        let Some(config) = self.config.clone() else {
            return Some(BeamAlloc { idx: 0, new_beam: false });
        };
        let (period, index) = self.period(&config, time);

        let mut free = None;
        for (idx, beams) in self.allocation.iter_mut().enumerate() {
            match beams[index].as_mut() {
                Some(slot) if slot.period == period && slot.beam == ue_beam => {
                    slot.users += 1;
                    return Some(BeamAlloc { idx, new_beam: false });
                }
                Some(slot) if slot.period == period => {}
                _ => {
                    free.get_or_insert(idx);
                }
            }
        }

        let idx = free?;
        self.allocation[idx][index] = Some(BeamSlot { beam: ue_beam, period, users: 1 });
        trace!("Beam {} takes slot {} at {}", ue_beam, idx, time);
        Some(BeamAlloc { idx, new_beam: true })
    }

    /// Drop one user of the beam slot `alloc` took for `ue_beam` at `time`
    ///
    /// The slot becomes free once its last user is gone. Entries of a beam
    /// period that has already been cleared or reused are left alone.
    pub fn release(&mut self, time: SlotTime, ue_beam: u16, alloc: BeamAlloc) {
        let Some(config) = self.config.clone() else {
            return;
        };
        let (period, index) = self.period(&config, time);
        let Some(entry) = self.allocation.get_mut(alloc.idx).map(|beams| &mut beams[index]) else {
            return;
        };
        if let Some(slot) = entry {
            if slot.period != period || slot.beam != ue_beam {
                return;
            }
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                trace!("Beam {} leaves slot {} at {}", ue_beam, alloc.idx, time);
                *entry = None;
            }
        }
    }

    /// Release every beam slot of the beam period `time` ends
    pub fn clear_period(&mut self, time: SlotTime) {
        let Some(config) = self.config.clone() else {
            return;
        };
        let duration = config.beam_duration.max(1) as u32;
        if (time.absolute_slot(self.slots_per_frame) + 1) % duration != 0 {
            return;
        }
        let (_, index) = self.period(&config, time);
        for beams in self.allocation.iter_mut() {
            beams[index] = None;
        }
    }
}

/// Per beam, per buffered slot PRB/symbol occupation
#[derive(Debug, Clone)]
pub struct OccupationMap {
    /// `[beam][slot][prb]` symbol bitmaps
    map: Vec<Vec<[u16; MAX_PRBS]>>,
    /// Slot each buffer entry currently describes
    slot_times: Vec<Option<SlotTime>>,
    slots_per_frame: u16,
}

impl OccupationMap {
    pub fn new(beams: usize, size: usize, slots_per_frame: u16) -> Self {
        let size = size.max(1);
        Self {
            map: vec![vec![[0u16; MAX_PRBS]; size]; beams.max(1)],
            slot_times: vec![None; size],
            slots_per_frame,
        }
    }

    /// Number of buffered slots
    pub fn size(&self) -> usize {
        self.slot_times.len()
    }

    /// Buffer entry of `time`
    pub fn buffer_index(&self, time: SlotTime) -> usize {
        time.absolute_slot(self.slots_per_frame) as usize % self.size()
    }

    /// Symbols reserved on `prb` in `beam` at `time`
    pub fn occupied(&self, beam: usize, time: SlotTime, prb: u16) -> u16 {
        let idx = self.buffer_index(time);
        if self.slot_times[idx] != Some(time) {
            return 0;
        }
        self.map
            .get(beam)
            .and_then(|slots| slots[idx].get(prb as usize))
            .copied()
            .unwrap_or(0)
    }

    /// First PRB of `cells` with an overlapping symbol, if any
    pub fn first_conflict(&self, beam: usize, time: SlotTime, cells: &[(u16, u16)]) -> Option<u16> {
        cells
            .iter()
            .find(|&&(prb, mask)| prb as usize >= MAX_PRBS || self.occupied(beam, time, prb) & mask != 0)
            .map(|&(prb, _)| prb)
    }

    fn set(&mut self, beam: usize, time: SlotTime, cells: &[(u16, u16)]) {
        let idx = self.buffer_index(time);
        if self.slot_times[idx] != Some(time) {
            for layer in self.map.iter_mut() {
                layer[idx] = [0u16; MAX_PRBS];
            }
            self.slot_times[idx] = Some(time);
        }
        if let Some(slots) = self.map.get_mut(beam) {
            for &(prb, mask) in cells {
                if let Some(bits) = slots[idx].get_mut(prb as usize) {
                    *bits |= mask;
                }
            }
        }
    }

    fn unset(&mut self, beam: usize, time: SlotTime, cells: &[(u16, u16)]) {
        let idx = self.buffer_index(time);
        if self.slot_times[idx] != Some(time) {
            return;
        }
        if let Some(slots) = self.map.get_mut(beam) {
            for &(prb, mask) in cells {
                if let Some(bits) = slots[idx].get_mut(prb as usize) {
                    *bits &= !mask;
                }
            }
        }
    }

    /// Forget every reservation of `time`
    pub fn clear_slot(&mut self, time: SlotTime) {
        let idx = self.buffer_index(time);
        for layer in self.map.iter_mut() {
            layer[idx] = [0u16; MAX_PRBS];
        }
        self.slot_times[idx] = None;
    }
}

/// Beam allocator and occupation map, reserved and released together
#[derive(Debug, Clone)]
pub struct UlResources {
    pub beams: BeamAllocator,
    pub map: OccupationMap,
}

impl UlResources {
    pub fn new(beam_config: Option<BeamConfig>, size: usize, slots_per_frame: u16) -> Self {
        let beams = BeamAllocator::new(beam_config, size, slots_per_frame);
        let map = OccupationMap::new(beams.num_beams(), size, slots_per_frame);
        Self { beams, map }
    }

    /// Test all `cells` and reserve them at once
    ///
    /// The beam slot use taken for this attempt is given back when the PRB
    /// test fails.
    pub fn reserve(
        &mut self,
        time: SlotTime,
        ue_beam: u16,
        cells: Vec<(u16, u16)>,
    ) -> Result<Reservation, ReserveFailure> {
        let beam = self.beams.allocate(time, ue_beam).ok_or(ReserveFailure::Beam)?;
        if let Some(prb) = self.map.first_conflict(beam.idx, time, &cells) {
            self.beams.release(time, ue_beam, beam);
            return Err(ReserveFailure::Prb { prb });
        }
        self.map.set(beam.idx, time, &cells);
        Ok(Reservation { time, ue_beam, beam, cells })
    }

    /// Undo a reservation
    ///
    /// Releasing a reservation whose slot has already been cleared is a no-op.
    pub fn release(&mut self, reservation: &Reservation) {
        self.map.unset(reservation.beam.idx, reservation.time, &reservation.cells);
        self.beams.release(reservation.time, reservation.ue_beam, reservation.beam);
    }

    /// Housekeeping once `time` has been processed
    pub fn clear_slot(&mut self, time: SlotTime) {
        self.map.clear_slot(time);
        self.beams.clear_period(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release_round_trip() {
        let mut res = UlResources::new(None, 20, 20);
        let t = SlotTime::new(4, 9);
        let other = res.reserve(t, 0, vec![(10, 0x3000)]).unwrap();

        let before: Vec<u16> = (0..20).map(|p| res.map.occupied(0, t, p)).collect();
        let r = res.reserve(t, 0, vec![(11, 0x3000), (12, 0x0f00), (10, 0x0c00)]).unwrap();
        assert_eq!(res.map.occupied(0, t, 10), 0x3c00);
        assert_eq!(res.map.occupied(0, t, 12), 0x0f00);

        res.release(&r);
        let after: Vec<u16> = (0..20).map(|p| res.map.occupied(0, t, p)).collect();
        assert_eq!(before, after);

        // releasing twice changes nothing
        res.release(&r);
        let again: Vec<u16> = (0..20).map(|p| res.map.occupied(0, t, p)).collect();
        assert_eq!(before, again);
        assert_eq!(other.cells, vec![(10, 0x3000)]);
    }

    #[test]
    fn test_conflict_leaves_map_untouched() {
        let mut res = UlResources::new(None, 20, 20);
        let t = SlotTime::new(0, 3);
        res.reserve(t, 0, vec![(0, 0x3000)]).unwrap();

        let err = res.reserve(t, 0, vec![(1, 0x3000), (0, 0x1000)]).unwrap_err();
        assert_eq!(err, ReserveFailure::Prb { prb: 0 });
        assert_eq!(res.map.occupied(0, t, 1), 0);

        // disjoint symbols on the same PRB are fine
        assert!(res.reserve(t, 0, vec![(0, 0x0003)]).is_ok());
    }

    #[test]
    fn test_stale_entry_is_reused() {
        let mut res = UlResources::new(None, 20, 20);
        let t = SlotTime::new(0, 3);
        let r = res.reserve(t, 0, vec![(5, 0x3000)]).unwrap();

        // one buffer period later the same entry describes a new slot
        let later = t.advance(20, 20);
        assert_eq!(res.map.occupied(0, later, 5), 0);
        assert!(res.reserve(later, 0, vec![(5, 0x3000)]).is_ok());

        // undoing the old reservation must not touch the new one
        res.release(&r);
        assert_eq!(res.map.occupied(0, later, 5), 0x3000);
    }

    #[test]
    fn test_clear_slot() {
        let mut res = UlResources::new(None, 10, 10);
        let t = SlotTime::new(1, 1);
        res.reserve(t, 0, vec![(7, 0xffff)]).unwrap();
        res.clear_slot(t);
        assert_eq!(res.map.occupied(0, t, 7), 0);
    }

    #[test]
    fn test_beam_allocation() {
        let config = BeamConfig { beams_per_period: 2, beam_duration: 1 };
        let mut res = UlResources::new(Some(config), 20, 20);
        let t = SlotTime::new(2, 2);

        let a = res.reserve(t, 7, vec![(0, 0x3000)]).unwrap();
        assert_eq!(a.beam, BeamAlloc { idx: 0, new_beam: true });
        let b = res.reserve(t, 7, vec![(1, 0x3000)]).unwrap();
        assert_eq!(b.beam, BeamAlloc { idx: 0, new_beam: false });
        let c = res.reserve(t, 3, vec![(0, 0x3000)]).unwrap();
        assert_eq!(c.beam, BeamAlloc { idx: 1, new_beam: true });

        // both beam slots are taken
        assert_eq!(res.reserve(t, 9, vec![(4, 0x3000)]).unwrap_err(), ReserveFailure::Beam);

        // the last user of a beam gives its slot back
        res.release(&c);
        assert_eq!(res.reserve(t, 9, vec![(0, 0x3000)]).map(|r| r.beam.idx), Ok(1));
        res.clear_slot(t);
        assert_eq!(res.beams.allocate(t, 5), Some(BeamAlloc { idx: 0, new_beam: true }));
    }

    #[test]
    fn test_prb_conflict_keeps_shared_beam() {
        let config = BeamConfig { beams_per_period: 2, beam_duration: 1 };
        let mut res = UlResources::new(Some(config), 20, 20);
        let t = SlotTime::new(2, 2);
        res.reserve(t, 7, vec![(0, 0x3000)]).unwrap();
        let r = res.reserve(t, 7, vec![(0, 0x1000)]);
        assert_eq!(r.unwrap_err(), ReserveFailure::Prb { prb: 0 });
        // beam 7 still holds slot 0, slot 1 stays free
        assert_eq!(res.beams.allocate(t, 8), Some(BeamAlloc { idx: 1, new_beam: true }));
    }

    #[test]
    fn test_shared_beam_held_until_last_release() {
        let config = BeamConfig { beams_per_period: 1, beam_duration: 1 };
        let mut res = UlResources::new(Some(config), 20, 20);
        let t = SlotTime::new(2, 2);
        let a = res.reserve(t, 7, vec![(0, 0x3000)]).unwrap();
        let b = res.reserve(t, 7, vec![(1, 0x3000)]).unwrap();
        assert!(a.beam.new_beam);
        assert!(!b.beam.new_beam);

        // UE B still transmits on beam 7
        res.release(&a);
        assert_eq!(res.reserve(t, 3, vec![(2, 0x3000)]).unwrap_err(), ReserveFailure::Beam);
        assert_eq!(res.map.occupied(0, t, 0), 0);
        assert_eq!(res.map.occupied(0, t, 1), 0x3000);

        res.release(&b);
        assert_eq!(res.reserve(t, 3, vec![(2, 0x3000)]).map(|r| r.beam), Ok(BeamAlloc { idx: 0, new_beam: true }));
    }

    #[test]
    fn test_release_after_period_reuse_is_ignored() {
        let config = BeamConfig { beams_per_period: 1, beam_duration: 1 };
        let mut res = UlResources::new(Some(config), 20, 20);
        let t = SlotTime::new(2, 2);
        let old = res.reserve(t, 7, vec![(0, 0x3000)]).unwrap();

        // the same buffer entry now serves a later beam period
        let later = t.advance(20, 20);
        res.reserve(later, 7, vec![(0, 0x3000)]).unwrap();
        res.release(&old);
        assert_eq!(res.reserve(later, 3, vec![(1, 0x3000)]).unwrap_err(), ReserveFailure::Beam);
    }
}
