//! PUCCH Occasions
//!
//! Each UE keeps a circular table of pending PUCCH occasions, one entry per
//! uplink slot of a scheduling period. ACK/NACK bits, the SR flag and CSI report
//! bits destined to the same uplink slot accumulate in the same entry until the
//! slot is reached and a PUCCH reception request is built from it.

use super::frame_structure::FrameStructure;
use super::occupation::Reservation;
use common::types::{SlotTime, MAX_FRAME_NUMBER};

/// Position of an occasion inside a UE's [`OccasionTable`]
///
/// Only the table produces indices, so an index is always in range for the
/// table that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccasionIndex(usize);

impl OccasionIndex {
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Stable occasion position of `time` in a table of `size` entries
///
/// Counts the uplink slots of completed frames, of completed periods within the
/// frame and the ordinal of `time` within its period. `time` must be an uplink
/// slot.
pub fn pucch_occasion_index(time: SlotTime, fs: &FrameStructure, size: usize) -> usize {
    let frame_start = time.frame as u64 * fs.ul_slots_per_frame() as u64;
    let period_start = (time.slot / fs.slots_per_period()) as u64 * fs.ul_slots_per_period() as u64;
    let in_period = fs.ul_slots_before(time.slot) as u64;
    ((frame_start + period_start + in_period) % size.max(1) as u64) as usize
}

/// Number of occasion entries needed to look `horizon` slots ahead
///
/// The table spans a power-of-two number of TDD periods so that the index
/// sequence stays continuous across the SFN wrap.
pub fn occasion_table_size(fs: &FrameStructure, horizon: u16) -> usize {
    let periods = (horizon / fs.slots_per_period() + 1) as u32;
    let periods = periods.next_power_of_two().min(MAX_FRAME_NUMBER as u32);
    (periods as usize * fs.ul_slots_per_period() as usize).max(1)
}

/// UCI multiplexed on one PUCCH occasion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduledPucch {
    pub active: bool,
    /// Uplink slot the occasion is transmitted in
    pub time: SlotTime,
    /// HARQ-ACK bits (DAI counter)
    pub dai_c: u8,
    pub sr_flag: bool,
    pub csi_bits: u16,
    /// PUCCH resource indicator within the selected resource set
    pub resource_indicator: u8,
    /// Common resource index when the fallback table is used
    pub r_pucch: Option<u8>,
    pub simultaneous_harqcsi: bool,
    /// Index into the PDSCH-to-HARQ timing set
    pub timing_indicator: u8,
    pub prb_start: u16,
    pub second_hop_prb: u16,
    pub start_symb: u8,
    pub nr_of_symb: u8,
    /// Resources held in the occupation map
    pub(crate) reservation: Option<Reservation>,
}

impl ScheduledPucch {
    /// Total UCI bits carried
    pub fn uci_bits(&self) -> u16 {
        self.dai_c as u16 + self.sr_flag as u16 + self.csi_bits
    }
}

/// Circular table of a UE's PUCCH occasions
#[derive(Debug, Clone)]
pub struct OccasionTable {
    occasions: Vec<ScheduledPucch>,
}

impl OccasionTable {
    pub fn new(size: usize) -> Self {
        Self {
            occasions: vec![ScheduledPucch::default(); size.max(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.occasions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occasions.is_empty()
    }

    /// Index of the occasion transmitted at `time`
    pub fn index_for(&self, time: SlotTime, fs: &FrameStructure) -> OccasionIndex {
        OccasionIndex(pucch_occasion_index(time, fs, self.occasions.len()))
    }

    pub fn get(&self, idx: OccasionIndex) -> &ScheduledPucch {
        &self.occasions[idx.0]
    }

    pub fn get_mut(&mut self, idx: OccasionIndex) -> &mut ScheduledPucch {
        &mut self.occasions[idx.0]
    }

    /// Clear the occasion, handing back the resources it held
    pub fn reset(&mut self, idx: OccasionIndex) -> Option<Reservation> {
        std::mem::take(&mut self.occasions[idx.0]).reservation
    }

    /// Active occasions
    pub fn active(&self) -> impl Iterator<Item = (OccasionIndex, &ScheduledPucch)> {
        self.occasions
            .iter()
            .enumerate()
            .filter(|(_, o)| o.active)
            .map(|(i, o)| (OccasionIndex(i), o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::frame_structure::TddPattern;
    use common::types::SubcarrierSpacing;
    use std::collections::HashSet;

    fn tdd() -> FrameStructure {
        let pattern = TddPattern { period_slots: 10, dl_slots: 7, dl_symbols: 6, ul_slots: 2, ul_symbols: 4 };
        FrameStructure::tdd(SubcarrierSpacing::Scs30, &pattern).unwrap()
    }

    #[test]
    fn test_index_repeats_every_scheduling_period() {
        let fs = tdd();
        let size = occasion_table_size(&fs, 12);
        // 12 slots ahead needs two 10-slot periods of 3 UL slots
        assert_eq!(size, 6);

        let span = 2 * fs.slots_per_period() as u32;
        for abs in 0..(1024 * 20u32) {
            let t = SlotTime::from_absolute(abs, 20);
            if !fs.is_ul_slot(t.slot) {
                continue;
            }
            let later = t.advance(span, 20);
            assert_eq!(
                pucch_occasion_index(t, &fs, size),
                pucch_occasion_index(later, &fs, size),
                "{} vs {}", t, later
            );
        }
    }

    #[test]
    fn test_index_distinct_within_period() {
        let fs = tdd();
        let size = occasion_table_size(&fs, 12);
        let mut seen = HashSet::new();
        for s in 0..20 {
            if fs.is_ul_slot(s) {
                assert!(seen.insert(pucch_occasion_index(SlotTime::new(7, s), &fs, size)));
            }
        }
        assert_eq!(seen.len(), size);
    }

    #[test]
    fn test_fdd_index() {
        let fs = FrameStructure::fdd(SubcarrierSpacing::Scs15);
        let size = occasion_table_size(&fs, 8);
        assert_eq!(size, 10);
        assert_eq!(pucch_occasion_index(SlotTime::new(3, 4), &fs, size), 4);
        assert_eq!(pucch_occasion_index(SlotTime::new(1023, 9), &fs, size), 9);
    }

    #[test]
    fn test_reset_clears_occasion() {
        let fs = tdd();
        let mut table = OccasionTable::new(occasion_table_size(&fs, 12));
        let t = SlotTime::new(5, 8);
        let idx = table.index_for(t, &fs);
        {
            let o = table.get_mut(idx);
            o.active = true;
            o.time = t;
            o.dai_c = 2;
            o.sr_flag = true;
        }
        assert_eq!(table.get(idx).uci_bits(), 3);
        assert_eq!(table.active().count(), 1);

        assert!(table.reset(idx).is_none());
        assert_eq!(*table.get(idx), ScheduledPucch::default());
        assert_eq!(table.active().count(), 0);
    }
}
