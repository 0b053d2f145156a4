//! Scheduling Request Occasions
//!
//! Every uplink slot, each SR resource whose periodicity hits the slot gets a
//! PUCCH occasion: either the SR flag is added to an occasion already carrying
//! ACK/NACK on the same resource or a new format 0/1 occasion is opened.

use super::occupation::{ReserveFailure, UlResources};
use super::pucch_config::{PucchConfigError, PucchResourceId};
use super::pucch_pdu::occasion_allocation;
use super::scheduler::CellContext;
use super::ue::UeContext;
use common::types::SlotTime;
use tracing::{debug, error, warn};

/// Position of SR resource `resource` in PUCCH resource set 0
fn sr_resource_indicator(ue: &UeContext, resource: PucchResourceId) -> Result<u8, PucchConfigError> {
    ue.config.pucch_config.resource_indicator(0, resource)
}

/// Open or extend the UE's SR occasions of uplink slot `now`
///
/// Returns the number of SR occasions placed.
pub fn sr_reporting(cell: &CellContext, resources: &mut UlResources, ue: &mut UeContext, now: SlotTime) -> usize {
    if !cell.frame.is_ul_slot(now.slot) || ue.is_suspended() {
        return 0;
    }
    let rnti = ue.rnti();
    let abs_slot = now.absolute_slot(cell.slots_per_frame());
    let sr_resources = ue.config.pucch_config.sr_resources.clone();
    let mut placed = 0;

    for sr in sr_resources.iter() {
        if !sr.periodicity.is_occasion(abs_slot) {
            continue;
        }
        debug!("{} Scheduling Request occasion for UE {} on SR resource {}", now, rnti, sr.id);

        let ri = match sr_resource_indicator(ue, sr.resource) {
            Ok(ri) => ri,
            Err(e) => {
                error!("UE {} SR resource {}: {}", rnti, sr.id, e);
                continue;
            }
        };

        let idx = ue.occasions.index_for(now, &cell.frame);
        let occasion = ue.occasions.get(idx);
        if occasion.active && occasion.time == now {
            if occasion.resource_indicator == ri {
                ue.occasions.get_mut(idx).sr_flag = true;
                placed += 1;
            } else {
                warn!(
                    "UE {} {} PUCCH occasion uses resource indicator {}, SR resource {} needs {}",
                    rnti, now, occasion.resource_indicator, sr.resource, ri
                );
            }
            continue;
        }
        if occasion.active {
            error!(
                "UE {} PUCCH occasion {} holds {} instead of {}, resetting it",
                rnti,
                idx.value(),
                occasion.time,
                now
            );
            if let Some(reservation) = ue.occasions.reset(idx) {
                resources.release(&reservation);
            }
            continue;
        }

        let mut candidate = occasion.clone();
        candidate.sr_flag = true;
        candidate.resource_indicator = ri;
        candidate.r_pucch = None;
        let allocation = match occasion_allocation(&ue.config, &candidate) {
            Ok(allocation) => allocation,
            Err(e) => {
                error!("UE {} no PUCCH resource for SR: {}", rnti, e);
                continue;
            }
        };
        let cells = allocation.cells(ue.config.ul_bwp.bwp_start);
        let reservation = match resources.reserve(now, ue.beam_index, cells) {
            Ok(reservation) => reservation,
            Err(ReserveFailure::Beam) => {
                error!("UE {} cannot allocate SR in any available beam at {}", rnti, now);
                continue;
            }
            Err(ReserveFailure::Prb { prb }) => {
                error!("UE {} cannot schedule SR at {}: PRB {} not available", rnti, now, prb);
                continue;
            }
        };

        let occasion = ue.occasions.get_mut(idx);
        *occasion = candidate;
        occasion.active = true;
        occasion.time = now;
        occasion.prb_start = allocation.prb_start;
        occasion.second_hop_prb = allocation.second_hop_prb.unwrap_or(0);
        occasion.start_symb = allocation.start_symbol;
        occasion.nr_of_symb = allocation.nr_of_symbols;
        occasion.reservation = Some(reservation);
        placed += 1;
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::acknack::acknack_scheduling;
    use crate::mac::test_utils::{test_cell, test_ue};

    #[test]
    fn test_sr_period_hit() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ue = test_ue(&cell, 0x4601);
        // SR period 20 offset 8 on 20-slot frames: slot 8 of every frame
        let miss = SlotTime::new(3, 9);
        assert_eq!(sr_reporting(&cell, &mut res, &mut ue, miss), 0);
        assert_eq!(ue.occasions.active().count(), 0);

        let hit = SlotTime::new(3, 8);
        assert_eq!(sr_reporting(&cell, &mut res, &mut ue, hit), 1);
        let idx = ue.occasions.index_for(hit, &cell.frame);
        let occasion = ue.occasions.get(idx);
        assert!(occasion.active && occasion.sr_flag);
        assert_eq!(occasion.dai_c, 0);
        assert_eq!(occasion.r_pucch, None);
        assert!(occasion.reservation.is_some());
    }

    #[test]
    fn test_sr_joins_acknack_occasion() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ue = test_ue(&cell, 0x4601);
        let (idx, _) = acknack_scheduling(&cell, &mut res, &mut ue, SlotTime::new(3, 6), 0, None, false).unwrap();

        assert_eq!(sr_reporting(&cell, &mut res, &mut ue, SlotTime::new(3, 8)), 1);
        let occasion = ue.occasions.get(idx);
        assert_eq!(occasion.dai_c, 1);
        assert!(occasion.sr_flag);
    }

    #[test]
    fn test_sr_other_resource_keeps_occasion() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ue = test_ue(&cell, 0x4601);
        let (idx, _) = acknack_scheduling(&cell, &mut res, &mut ue, SlotTime::new(3, 6), 0, None, false).unwrap();
        ue.occasions.get_mut(idx).resource_indicator = 1;

        assert_eq!(sr_reporting(&cell, &mut res, &mut ue, SlotTime::new(3, 8)), 0);
        let occasion = ue.occasions.get(idx);
        assert!(occasion.active);
        assert!(!occasion.sr_flag);
    }

    #[test]
    fn test_suspended_ue_skipped() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ue = test_ue(&cell, 0x4601);
        ue.ul_failure = true;
        assert_eq!(sr_reporting(&cell, &mut res, &mut ue, SlotTime::new(3, 8)), 0);
        ue.ul_failure = false;
        ue.transmission_interrupted = true;
        assert_eq!(sr_reporting(&cell, &mut res, &mut ue, SlotTime::new(3, 8)), 0);
    }

    #[test]
    fn test_sr_prb_conflict() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut first = test_ue(&cell, 0x4601);
        let mut second = test_ue(&cell, 0x4602);
        let t = SlotTime::new(3, 8);
        assert_eq!(sr_reporting(&cell, &mut res, &mut first, t), 1);
        // both UEs share the SR resource in this configuration
        assert_eq!(sr_reporting(&cell, &mut res, &mut second, t), 0);
        assert_eq!(second.occasions.active().count(), 0);
    }
}
