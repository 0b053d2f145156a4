//! PUCCH Reception Requests
//!
//! Turns the occasion due in the current uplink slot into a PUCCH PDU of the
//! slot's UL TTI request and releases the occasion.

use super::occasion::ScheduledPucch;
use super::occupation::UlResources;
use super::pucch_config::{common_pucch_allocation, PucchAllocation, PucchConfigError};
use super::scheduler::CellContext;
use super::ue::{UeConfig, UeContext};
use common::types::SlotTime;
use interfaces::{PucchPdu, UlPdu, UlTtiRequestBuffer};
use tracing::{debug, error, warn};

/// UCI bits that select the PUCCH resource set of an occasion
///
/// An SR alone travels on its own format 0/1 resource in set 0.
pub fn resource_selection_bits(occasion: &ScheduledPucch) -> u16 {
    occasion.dai_c as u16 + occasion.csi_bits
}

/// PRBs and symbols an occasion is transmitted on
pub fn occasion_allocation(config: &UeConfig, occasion: &ScheduledPucch) -> Result<PucchAllocation, PucchConfigError> {
    if let Some(r_pucch) = occasion.r_pucch {
        return common_pucch_allocation(config.ul_bwp.pucch_resource_common, r_pucch, config.ul_bwp.bwp_size);
    }
    let pucch_config = &config.pucch_config;
    let id = pucch_config.resource_id(resource_selection_bits(occasion), occasion.resource_indicator)?;
    Ok(PucchAllocation::from_resource(pucch_config.resource(id)?))
}

/// Build the PUCCH PDU for `occasion`
pub fn build_pucch_pdu(ue: &UeContext, occasion: &ScheduledPucch) -> Result<PucchPdu, PucchConfigError> {
    let allocation = occasion_allocation(&ue.config, occasion)?;
    let format_config = ue
        .config
        .pucch_config
        .format_config(allocation.format)
        .cloned()
        .unwrap_or_default();
    Ok(PucchPdu {
        rnti: ue.rnti(),
        format_type: allocation.format,
        bwp_start: ue.config.ul_bwp.bwp_start,
        bwp_size: ue.config.ul_bwp.bwp_size,
        prb_start: allocation.prb_start,
        prb_size: allocation.nr_of_prbs,
        start_symbol_index: allocation.start_symbol,
        nr_of_symbols: allocation.nr_of_symbols,
        freq_hop_flag: allocation.second_hop_prb.is_some(),
        second_hop_prb: allocation.second_hop_prb.unwrap_or(0),
        initial_cyclic_shift: allocation.initial_cyclic_shift,
        time_domain_occ_idx: allocation.time_domain_occ,
        pi2_bpsk: format_config.pi2_bpsk,
        add_dmrs_flag: format_config.additional_dmrs,
        sr_flag: occasion.sr_flag,
        bit_len_harq: occasion.dai_c as u16,
        bit_len_csi_part1: occasion.csi_bits,
    })
}

/// Request reception of the UE's occasion in `time`, if it has one
///
/// Returns true if a PDU was added.
pub fn schedule_pucch(
    cell: &CellContext,
    resources: &mut UlResources,
    ue: &mut UeContext,
    time: SlotTime,
    ul_tti: &mut UlTtiRequestBuffer,
) -> bool {
    let rnti = ue.rnti();
    let idx = ue.occasions.index_for(time, &cell.frame);
    let occasion = ue.occasions.get(idx);
    if !occasion.active {
        return false;
    }
    if occasion.time != time {
        error!(
            "UE {} PUCCH frame/slot mismatch: occasion {} vs. request {}, not scheduling PUCCH",
            rnti, occasion.time, time
        );
        if let Some(reservation) = ue.occasions.reset(idx) {
            resources.release(&reservation);
        }
        return false;
    }

    debug!(
        "UE {} PUCCH[{}] reception in {}: O_ack {} O_sr {} O_csi {}",
        rnti,
        idx.value(),
        time,
        occasion.dai_c,
        occasion.sr_flag as u8,
        occasion.csi_bits
    );
    let pdu = build_pucch_pdu(ue, occasion);
    // the occupation map keeps the PRBs until the slot is cleared
    ue.occasions.reset(idx);

    let pdu = match pdu {
        Ok(pdu) => pdu,
        Err(e) => {
            error!("UE {} cannot build PUCCH PDU for {}: {}", rnti, time, e);
            return false;
        }
    };
    let request = ul_tti.get_mut(time);
    if request.time() != time {
        warn!(
            "UL TTI request holds {} while scheduling PUCCH for {}",
            request.time(),
            time
        );
    }
    match request.push(UlPdu::Pucch(pdu)) {
        Ok(()) => true,
        Err(e) => {
            error!("UE {} dropping PUCCH for {}: {}", rnti, time, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::acknack::acknack_scheduling;
    use crate::mac::test_utils::{test_cell, test_ue};
    use interfaces::{PucchFormatType, MAX_UL_PDUS_PER_SLOT};

    #[test]
    fn test_pdu_for_acknack_occasion() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ue = test_ue(&cell, 0x4601);
        let mut ul_tti = UlTtiRequestBuffer::new(40, cell.slots_per_frame());

        let (idx, _) = acknack_scheduling(&cell, &mut res, &mut ue, SlotTime::new(4, 6), 0, None, false).unwrap();
        ue.occasions.get_mut(idx).sr_flag = true;

        let target = SlotTime::new(4, 8);
        ul_tti.prepare(target);
        assert!(schedule_pucch(&cell, &mut res, &mut ue, target, &mut ul_tti));
        assert!(!ue.occasions.get(idx).active);

        let request = ul_tti.take(target);
        let pdu = request.pucch_pdus().next().unwrap();
        assert_eq!(pdu.format_type, PucchFormatType::Format0);
        assert_eq!(pdu.bit_len_harq, 1);
        assert!(pdu.sr_flag);
        assert_eq!(pdu.bit_len_csi_part1, 0);
        assert_eq!(pdu.start_symbol_index, 13);
    }

    #[test]
    fn test_inactive_occasion_is_skipped() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ue = test_ue(&cell, 0x4601);
        let mut ul_tti = UlTtiRequestBuffer::new(40, cell.slots_per_frame());
        let t = SlotTime::new(0, 9);
        ul_tti.prepare(t);
        assert!(!schedule_pucch(&cell, &mut res, &mut ue, t, &mut ul_tti));
        assert_eq!(ul_tti.take(t).pdus.len(), 0);
    }

    #[test]
    fn test_mismatched_occasion_is_dropped() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ue = test_ue(&cell, 0x4601);
        let mut ul_tti = UlTtiRequestBuffer::new(40, cell.slots_per_frame());

        let (idx, _) = acknack_scheduling(&cell, &mut res, &mut ue, SlotTime::new(4, 6), 0, None, false).unwrap();
        // the same index one period later
        let later = SlotTime::new(5, 8);
        assert_eq!(ue.occasions.index_for(later, &cell.frame), idx);
        ul_tti.prepare(later);
        assert!(!schedule_pucch(&cell, &mut res, &mut ue, later, &mut ul_tti));
        assert!(!ue.occasions.get(idx).active);
        assert!(ul_tti.take(later).pdus.is_empty());
    }

    #[test]
    fn test_full_request_drops_pdu() {
        let cell = test_cell();
        let mut res = UlResources::new(None, 40, cell.slots_per_frame());
        let mut ul_tti = UlTtiRequestBuffer::new(40, cell.slots_per_frame());
        let target = SlotTime::new(4, 8);
        ul_tti.prepare(target);

        let mut scheduled = 0;
        for n in 0..(MAX_UL_PDUS_PER_SLOT as u16 + 1) {
            let mut ue = test_ue(&cell, 0x4601 + n);
            let idx = ue.occasions.index_for(target, &cell.frame);
            let occasion = ue.occasions.get_mut(idx);
            occasion.active = true;
            occasion.time = target;
            occasion.sr_flag = true;
            if schedule_pucch(&cell, &mut res, &mut ue, target, &mut ul_tti) {
                scheduled += 1;
            }
        }
        assert_eq!(scheduled, MAX_UL_PDUS_PER_SLOT);
        assert_eq!(ul_tti.take(target).pdus.len(), MAX_UL_PDUS_PER_SLOT);
    }
}
