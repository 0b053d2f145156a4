//! Periodic CSI Report Occasions
//!
//! CSI reports are placed on PUCCH `max_fb_time` slots ahead, before any
//! ACK/NACK can target the same slot, so their occasion is always opened fresh
//! on the long format resource of the report.

use super::occupation::{ReserveFailure, UlResources};
use super::pucch_config::PucchAllocation;
use super::scheduler::CellContext;
use super::ue::UeContext;
use common::types::SlotTime;
use tracing::{debug, error};

/// PUCCH resource set of formats 2, 3 and 4
const LONG_FORMAT_RESOURCE_SET: usize = 1;

/// Open the UE's CSI occasions for the reports due `max_fb_time` slots after `now`
///
/// Returns the number of reports placed.
pub fn csi_meas_reporting(cell: &CellContext, resources: &mut UlResources, ue: &mut UeContext, now: SlotTime) -> usize {
    if ue.is_suspended() {
        return 0;
    }
    let rnti = ue.rnti();
    let spf = cell.slots_per_frame();
    let ahead = ue.config.max_fb_time() as u32 + cell.config.ntn_koffset as u32;
    let sched = now.advance(ahead, spf);
    let abs_slot = sched.absolute_slot(spf);
    let bwp_id = ue.config.ul_bwp.bwp_id;
    let mut placed = 0;

    for report_idx in 0..ue.config.csi_reports.len() {
        let template = &ue.config.csi_reports[report_idx];
        if template.ul_bwp_id != bwp_id || !template.is_due(abs_slot) {
            continue;
        }
        if !cell.frame.is_ul_slot(sched.slot) {
            error!(
                "UE {} CSI report {} due in {}, which is not an uplink slot",
                rnti, template.report_config_id, sched
            );
            continue;
        }
        debug!("UE {} CSI report {} in {}", rnti, template.report_config_id, sched);

        let pucch_config = &ue.config.pucch_config;
        let ri = match pucch_config.resource_indicator(LONG_FORMAT_RESOURCE_SET, template.pucch_resource) {
            Ok(ri) => ri,
            Err(e) => {
                error!("UE {} CSI report {}: {}", rnti, template.report_config_id, e);
                continue;
            }
        };
        let resource = match pucch_config.resource(template.pucch_resource) {
            Ok(resource) => resource,
            Err(e) => {
                error!("UE {} CSI report {}: {}", rnti, template.report_config_id, e);
                continue;
            }
        };
        let allocation = PucchAllocation::from_resource(resource);
        let simultaneous_harqcsi = pucch_config
            .format_config(allocation.format)
            .is_some_and(|c| c.simultaneous_harq_ack_csi);
        let csi_bits = template.bit_length() as u16;
        let report_config_id = template.report_config_id;

        let idx = ue.occasions.index_for(sched, &cell.frame);
        if ue.occasions.get(idx).active {
            error!(
                "UE {} CSI occasion {} for {} is already in use by {}, resetting it",
                rnti,
                idx.value(),
                sched,
                ue.occasions.get(idx).time
            );
            if let Some(reservation) = ue.occasions.reset(idx) {
                resources.release(&reservation);
            }
            continue;
        }

        let cells = allocation.cells(ue.config.ul_bwp.bwp_start);
        let reservation = match resources.reserve(sched, ue.beam_index, cells) {
            Ok(reservation) => reservation,
            Err(ReserveFailure::Beam) => {
                error!("UE {} cannot allocate CSI report on PUCCH in any available beam at {}", rnti, sched);
                continue;
            }
            Err(ReserveFailure::Prb { prb }) => {
                error!(
                    "{} PRB {} in {} not free, cannot schedule CSI report {} of UE {} on PUCCH",
                    now, prb, sched, report_config_id, rnti
                );
                continue;
            }
        };

        let occasion = ue.occasions.get_mut(idx);
        occasion.active = true;
        occasion.time = sched;
        occasion.r_pucch = None;
        occasion.resource_indicator = ri;
        occasion.csi_bits += csi_bits;
        occasion.simultaneous_harqcsi = simultaneous_harqcsi;
        occasion.prb_start = allocation.prb_start;
        occasion.second_hop_prb = allocation.second_hop_prb.unwrap_or(0);
        occasion.start_symb = allocation.start_symbol;
        occasion.nr_of_symb = allocation.nr_of_symbols;
        occasion.reservation = Some(reservation);
        debug!(
            "UE {} {:?} PUCCH for CSI in {}: PRB {}+{}, simultaneous HARQ {}, {} bits",
            rnti, allocation.format, sched, allocation.prb_start, allocation.nr_of_prbs, simultaneous_harqcsi, occasion.csi_bits
        );
        placed += 1;
    }
    placed
}
