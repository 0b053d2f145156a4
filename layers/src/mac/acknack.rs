//! HARQ-ACK Scheduling on PUCCH
//!
//! Places one ACK/NACK bit for a PDSCH sent in the current slot on a PUCCH
//! occasion. Candidate occasions follow the PDSCH-to-HARQ timing set in order;
//! an occasion already active in the target slot is reused when the added bit
//! still fits, otherwise a new one is opened on free resources.

use super::occasion::OccasionIndex;
use super::occupation::{ReserveFailure, UlResources};
use super::pucch_pdu::occasion_allocation;
use super::scheduler::CellContext;
use super::ue::UeContext;
use common::types::SlotTime;
use interfaces::PucchFormatType;
use tracing::{debug, error, trace};

/// Most ACK/NACK bits multiplexed with CSI on a long format
const MAX_ACK_BITS_WITH_CSI: u8 = 3;

/// Schedule one ACK/NACK bit for a PDSCH transmitted at `now`
///
/// `r_pucch` selects a common PUCCH resource, `is_common` forces the fallback
/// timing set of DCI 1_0. Returns the occasion now carrying the bit with the
/// timing indicator to signal in the DCI, or `None` when no timing candidate
/// has room.
pub fn acknack_scheduling(
    cell: &CellContext,
    resources: &mut UlResources,
    ue: &mut UeContext,
    now: SlotTime,
    ue_beam: u16,
    r_pucch: Option<u8>,
    is_common: bool,
) -> Option<(OccasionIndex, u8)> {
    let spf = cell.slots_per_frame();
    let koffset = cell.config.ntn_koffset as u32;
    let min_fb_time = cell.min_feedback_time();
    let rnti = ue.rnti();

    let timing = ue.config.pucch_config.feedback_timing(is_common).to_vec();
    for (f, &fb) in timing.iter().enumerate() {
        let delay = fb as u32 + koffset;
        if delay < min_fb_time {
            continue;
        }
        let target = now.advance(delay, spf);
        if !cell.frame.is_ul_slot(target.slot) {
            continue;
        }
        let idx = ue.occasions.index_for(target, &cell.frame);
        let occasion = ue.occasions.get(idx);

        if occasion.active && occasion.time == target {
            trace!(
                "UE {} DL {} UL_ACK {}: occasion holds DAI {} CSI {}",
                rnti, now, target, occasion.dai_c, occasion.csi_bits
            );
            if occasion.csi_bits == 0 && occasion.dai_c == 2 {
                continue;
            }
            if occasion.csi_bits > 0 && !occasion.simultaneous_harqcsi {
                continue;
            }
            if occasion.csi_bits > 0 {
                // room for this bit and a possible SR bit
                let o_uci = occasion.csi_bits + occasion.dai_c as u16 + 2;
                match ue.config.pucch_config.fits_code_rate(o_uci, occasion.resource_indicator) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        error!("UE {} code rate check at {}: {}", rnti, target, e);
                        continue;
                    }
                }
                if occasion.dai_c >= MAX_ACK_BITS_WITH_CSI {
                    continue;
                }
            }
            let occasion = ue.occasions.get_mut(idx);
            occasion.timing_indicator = f as u8;
            occasion.dai_c += 1;
            debug!(
                "UE {} DL {} UL_ACK {}: ACK/NACK in PUCCH {} timing indicator {} DAI {} CSI {}",
                rnti, now, target, idx.value(), f, occasion.dai_c, occasion.csi_bits
            );
            return Some((idx, f as u8));
        }

        if occasion.active {
            error!(
                "UE {} PUCCH occasion {} holds {} instead of {}, resetting it",
                rnti,
                idx.value(),
                occasion.time,
                target
            );
            if let Some(reservation) = ue.occasions.reset(idx) {
                resources.release(&reservation);
            }
            continue;
        }

        // unoccupied occasion
        let mut candidate = ue.occasions.get(idx).clone();
        candidate.dai_c = 1;
        candidate.resource_indicator = 0;
        candidate.r_pucch = r_pucch;
        let allocation = match occasion_allocation(&ue.config, &candidate) {
            Ok(allocation) if matches!(allocation.format, PucchFormatType::Format0 | PucchFormatType::Format1) => {
                allocation
            }
            Ok(allocation) => {
                error!(
                    "UE {} first resource of PUCCH resource set 0 has {:?}",
                    rnti, allocation.format
                );
                return None;
            }
            Err(e) => {
                error!("UE {} no PUCCH resource for ACK/NACK: {}", rnti, e);
                return None;
            }
        };
        let cells = allocation.cells(ue.config.ul_bwp.bwp_start);
        let reservation = match resources.reserve(target, ue_beam, cells) {
            Ok(reservation) => reservation,
            Err(ReserveFailure::Beam) => {
                debug!("UE {} DL {} UL_ACK {}: no beam left, trying next occasion", rnti, now, target);
                continue;
            }
            Err(ReserveFailure::Prb { prb }) => {
                debug!("UE {} DL {} UL_ACK {}: PRB {} occupied, trying next occasion", rnti, now, target, prb);
                continue;
            }
        };

        let occasion = ue.occasions.get_mut(idx);
        *occasion = candidate;
        occasion.active = true;
        occasion.time = target;
        occasion.timing_indicator = f as u8;
        occasion.prb_start = allocation.prb_start;
        occasion.second_hop_prb = allocation.second_hop_prb.unwrap_or(0);
        occasion.start_symb = allocation.start_symbol;
        occasion.nr_of_symb = allocation.nr_of_symbols;
        occasion.reservation = Some(reservation);
        debug!(
            "UE {} DL {} UL_ACK {}: new PUCCH {} timing indicator {}",
            rnti, now, target, idx.value(), f
        );
        return Some((idx, f as u8));
    }

    debug!("UE {} DL {}: no PUCCH occasion for this HARQ process", rnti, now);
    None
}
