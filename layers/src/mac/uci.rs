//! UCI Reception
//!
//! Applies the UCI the PHY decoded on PUCCH to the UE's MAC state: HARQ-ACK
//! bits resolve the HARQ processes awaiting feedback in order, SR raises the
//! UE's SR flag, CSI part 1 is decoded into measurement results and the
//! reported link quality drives PUCCH power control.

use super::csi_report::{decode_csi_part1, CsiDecodeError, CsiReport};
use super::harq::{FeedbackMatch, HarqOutcome, HarqPid};
use super::link_adaptation::{
    limit_tpc_by_rssi, mcs_from_cqi, pdcch_closed_loop_adjust, tpc_command, ul_cqi_to_snr_x10,
};
use super::scheduler::CellContext;
use super::ue::UeContext;
use common::types::SlotTime;
use common::utils::bytes_to_hex;
use interfaces::{CrcStatus, UciPduBitmap, UciPucchFormat01, UciPucchFormat234, UL_CQI_INVALID};
use tracing::{debug, error, trace, warn};

/// Next HARQ process to consume a feedback bit received at `now`
fn next_feedback_process(ue: &mut UeContext, now: SlotTime) -> Option<HarqPid> {
    let rnti = ue.rnti();
    match ue.harq.find_harq(rnti, now) {
        FeedbackMatch::Matched(pid) => Some(pid),
        FeedbackMatch::NotDue(pid) => {
            error!(
                "UE {} HARQ feedback at {} does not match process {} awaiting feedback",
                rnti,
                now,
                pid.value()
            );
            None
        }
        FeedbackMatch::Empty => {
            error!("UE {} HARQ feedback at {} with no process awaiting feedback", rnti, now);
            None
        }
    }
}

fn apply_harq_feedback(ue: &mut UeContext, pid: HarqPid, success: bool) {
    let rnti = ue.rnti();
    ue.harq.take_head(pid);
    if ue.harq.handle_feedback(rnti, pid, success) == HarqOutcome::Aborted {
        ue.stats.dl_harq_errors += 1;
    }
}

/// TPC command for a PUCCH received with `ul_cqi` and `rssi`
fn pucch_tpc(cell: &CellContext, ue: &mut UeContext, ul_cqi: u8, rssi: Option<u16>, measurable: bool) -> u8 {
    let mut tpc = 1;
    if measurable && ul_cqi != UL_CQI_INVALID {
        let snr_x10 = ul_cqi_to_snr_x10(ul_cqi);
        ue.pucch_snr_x10 = snr_x10;
        tpc = tpc_command(cell.config.pucch_target_snr_x10, snr_x10);
    }
    limit_tpc_by_rssi(tpc, rssi, cell.config.pucch_rssi_threshold_x10)
}

/// Handle UCI received on PUCCH format 0 or 1 in slot `now`
pub fn handle_uci_format01(cell: &CellContext, ue: &mut UeContext, now: SlotTime, uci: &UciPucchFormat01) {
    let rnti = ue.rnti();

    if uci.pdu_bitmap.contains(UciPduBitmap::HARQ) {
        let confidence = uci.harq.harq_confidence_level;
        for (bit, &value) in uci.harq.harq_values.iter().enumerate() {
            let Some(pid) = next_feedback_process(ue, now) else {
                break;
            };
            let dtx = confidence != 0;
            ue.pdcch_cl_adjust = pdcch_closed_loop_adjust(ue.pdcch_cl_adjust, dtx);
            if dtx {
                // no feedback detected: the process keeps waiting until it goes stale
                ue.harq.mark_dtx(pid);
                ue.stats.pucch0_dtx += 1;
                debug!(
                    "UE {} {} HARQ bit {} for process {} not detected",
                    rnti,
                    now,
                    bit,
                    pid.value()
                );
                break;
            }
            trace!("UE {} {} HARQ process {} feedback {}", rnti, now, pid.value(), value);
            apply_harq_feedback(ue, pid, value == 0);
        }
        ue.tpc1 = pucch_tpc(cell, ue, uci.ul_cqi, uci.rssi, confidence == 0);
    }

    if uci.pdu_bitmap.contains(UciPduBitmap::SR)
        && uci.sr.sr_indication
        && uci.sr.sr_confidence_level == 0
        && uci.ul_cqi >= cell.config.sr_min_ul_cqi
    {
        debug!("UE {} {} SR received", rnti, now);
        ue.sr = true;
        ue.stats.sr_received += 1;
    }
}

/// Handle UCI received on PUCCH format 2, 3 or 4 in slot `now`
pub fn handle_uci_format234(cell: &CellContext, ue: &mut UeContext, now: SlotTime, uci: &UciPucchFormat234) {
    let rnti = ue.rnti();
    ue.tpc1 = pucch_tpc(cell, ue, uci.ul_cqi, uci.rssi, true);

    if uci.pdu_bitmap.contains(UciPduBitmap::HARQ) {
        let payload = &uci.harq.harq_payload;
        let crc_ok = uci.harq.harq_crc != CrcStatus::Fail;
        for bit in 0..uci.harq.harq_bit_len as usize {
            let Some(&byte) = payload.get(bit >> 3) else {
                warn!("UE {} HARQ payload shorter than {} bits", rnti, uci.harq.harq_bit_len);
                break;
            };
            let Some(pid) = next_feedback_process(ue, now) else {
                break;
            };
            let acked = (byte >> (bit & 7)) & 0x01 == 1;
            trace!("UE {} {} HARQ process {} ack {} crc ok {}", rnti, now, pid.value(), acked, crc_ok);
            apply_harq_feedback(ue, pid, crc_ok && acked);
        }
    }

    if uci.pdu_bitmap.contains(UciPduBitmap::SR) {
        let bytes = (uci.sr.sr_bit_len as usize).div_ceil(8);
        if uci.sr.sr_payload.iter().take(bytes).any(|b| *b != 0) {
            debug!("UE {} {} SR received", rnti, now);
            ue.sr = true;
            ue.stats.sr_received += 1;
        }
    }

    if uci.pdu_bitmap.contains(UciPduBitmap::CSI_PART1) {
        if uci.csi_part1.crc == CrcStatus::Fail {
            warn!("UE {} {} CSI part 1 CRC failed, dropping reports", rnti, now);
            ue.stats.csi_reports_dropped += 1;
        } else {
            handle_csi_part1(cell, ue, now, &uci.csi_part1.payload, uci.csi_part1.bit_len as usize);
        }
    }

    if uci.pdu_bitmap.contains(UciPduBitmap::CSI_PART2) {
        debug!(
            "UE {} {} CSI part 2 not handled: {}",
            rnti,
            now,
            bytes_to_hex(&uci.csi_part2.payload)
        );
    }
}

/// Decode the CSI part 1 payload received at `now` and store the results
fn handle_csi_part1(cell: &CellContext, ue: &mut UeContext, now: SlotTime, payload: &[u8], bit_len: usize) {
    let rnti = ue.rnti();
    let abs_slot = now.absolute_slot(cell.slots_per_frame());
    trace!("UE {} {} CSI part 1 ({} bits): {}", rnti, now, bit_len, bytes_to_hex(payload));
    let decoded = decode_csi_part1(&ue.config.csi_reports, payload, bit_len, abs_slot, ue.config.ul_bwp.bwp_id);
    if decoded.is_empty() {
        warn!("UE {} {} CSI part 1 without a scheduled report", rnti, now);
    }

    for report in decoded {
        let id = report.report_config_id;
        match report.result {
            Ok(CsiReport::Rsrp { ssb_based, measurements }) => {
                let Some(strongest) = measurements.first().copied() else {
                    continue;
                };
                ue.stats.cumul_rsrp += strongest.value as i64;
                ue.stats.num_rsrp_meas += 1;
                if ssb_based && cell.beams_enabled() && ue.beam_index != strongest.resource_id as u16 {
                    debug!(
                        "UE {} moving from beam {} to SSB {} ({} dBm)",
                        rnti, ue.beam_index, strongest.resource_id, strongest.value
                    );
                    ue.beam_index = strongest.resource_id as u16;
                }
                ue.csi.rsrp = measurements;
            }
            Ok(CsiReport::Sinr { sinr_index, .. }) => {
                ue.csi.sinr_index = Some(sinr_index);
            }
            Ok(CsiReport::ChannelQuality(cq)) => {
                let cqi_table = ue
                    .config
                    .csi_reports
                    .iter()
                    .find(|t| t.report_config_id == id)
                    .map(|t| ue.config.cqi_table(t))
                    .unwrap_or_default();
                ue.dl_max_mcs = mcs_from_cqi(ue.config.mcs_table, cqi_table, cq.wb_cqi_1tb);
                debug!(
                    "UE {} CSI report {}: RI {} PMI {}/{} CQI {} -> max MCS {}",
                    rnti,
                    id,
                    cq.ri + 1,
                    cq.pmi_x1,
                    cq.pmi_x2,
                    cq.wb_cqi_1tb,
                    ue.dl_max_mcs
                );
                ue.csi.channel_quality = Some(cq);
            }
            Err(e @ CsiDecodeError::UnsupportedQuantity(_)) => {
                error!("UE {} CSI report {}: {}", rnti, id, e);
                ue.stats.csi_reports_dropped += 1;
                continue;
            }
            Err(e) => {
                warn!("UE {} CSI report {} dropped: {}", rnti, id, e);
                ue.stats.csi_reports_dropped += 1;
                continue;
            }
        }
        ue.stats.csi_reports_decoded += 1;
    }
}
