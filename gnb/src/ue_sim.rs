//! Simulated UE feedback
//!
//! Answers every PUCCH reception request with the UCI a UE would send: HARQ
//! bits following a fixed NACK/DTX pattern, SRs on a share of the SR occasions
//! and CSI part 1 payloads laid out after the UE's report configuration.

use crate::config::SimulationConfig;
use bytes::Bytes;
use common::bits::BitPacker;
use common::types::{Rnti, SlotTime};
use interfaces::{CrcStatus, PucchFormatType, PucchPdu, UciIndication, UciPucchFormat01, UciPucchFormat234, UlTtiRequest};
use layers::mac::csi_report::{CsiReportTemplate, ReportQuantity};
use layers::mac::UeConfig;
use std::collections::HashMap;
use tracing::{trace, warn};

/// Measurement values carried by simulated CSI reports
#[derive(Debug, Clone, Copy)]
pub struct CsiValues {
    pub rsrp_index: u8,
    pub sinr_index: u8,
    pub cqi: u8,
}

/// Append one report with the first allowed rank and `values`
fn encode_report(template: &CsiReportTemplate, values: &CsiValues, packer: &mut BitPacker) {
    let start = packer.bit_len();
    let quantity = template.quantity;
    if quantity.is_beam_report() {
        let beam = &template.beam_bitlen;
        let nb = beam.nb_ssbri_cri.max(1) as usize;
        for i in 0..nb {
            packer.write_bits(i as u32, beam.cri_ssbri_bitlen as usize);
        }
        let abs = if matches!(quantity, ReportQuantity::CriRsrp | ReportQuantity::SsbIndexRsrp) {
            values.rsrp_index
        } else {
            values.sinr_index
        };
        packer.write_bits(abs as u32, 7);
        for _ in 1..nb {
            packer.write_bits(1, 4);
        }
    } else if quantity.is_channel_quality_report() {
        let bitlen = &template.meas_bitlen;
        let ri = bitlen.rank_from_index(0).unwrap_or(0) as usize;
        packer.write_bits(0, bitlen.cri_bitlen as usize);
        packer.write_bits(0, bitlen.ri_bitlen as usize);
        packer.write_bits(0, bitlen.li_bitlen[ri] as usize);
        packer.pad(bitlen.max_bitlen() - bitlen.reported_bitlen(ri));
        packer.write_bits(0, bitlen.pmi_x1_bitlen[ri] as usize);
        packer.write_bits(0, bitlen.pmi_x2_bitlen[ri] as usize);
        let cqi_bits = bitlen.cqi_bitlen[ri] as usize;
        if cqi_bits > 0 {
            packer.write_bits(values.cqi as u32, 4);
            if cqi_bits > 4 {
                packer.write_bits(values.cqi as u32, 4);
            }
        }
    }
    let written = packer.bit_len() - start;
    packer.pad(template.bit_length().saturating_sub(written));
}

/// CSI part 1 payload of every report in `templates` due in `abs_slot`
pub fn encode_csi_part1(
    templates: &[CsiReportTemplate],
    abs_slot: u32,
    ul_bwp_id: u8,
    values: &CsiValues,
) -> (Bytes, usize) {
    let mut packer = BitPacker::new();
    for template in templates
        .iter()
        .filter(|t| t.ul_bwp_id == ul_bwp_id && t.is_due(abs_slot))
    {
        encode_report(template, values, &mut packer);
    }
    packer.finish()
}

fn every(counter: u64, n: u32) -> bool {
    n != 0 && counter % n as u64 == 0
}

/// All simulated UEs of the cell
pub struct UeSimulator {
    config: SimulationConfig,
    ues: HashMap<Rnti, UeConfig>,
    slots_per_frame: u16,
    harq_bits: u64,
    short_receptions: u64,
    sr_occasions: u64,
}

impl UeSimulator {
    pub fn new(config: SimulationConfig, ues: &[UeConfig], slots_per_frame: u16) -> Self {
        Self {
            config,
            ues: ues.iter().map(|ue| (ue.rnti, ue.clone())).collect(),
            slots_per_frame,
            harq_bits: 0,
            short_receptions: 0,
            sr_occasions: 0,
        }
    }

    fn next_harq_ack(&mut self) -> bool {
        self.harq_bits += 1;
        !every(self.harq_bits, self.config.nack_every)
    }

    fn next_sr(&mut self) -> bool {
        self.sr_occasions += 1;
        every(self.sr_occasions, self.config.sr_every)
    }

    fn values(&self) -> CsiValues {
        CsiValues {
            rsrp_index: self.config.rsrp_index,
            sinr_index: self.config.sinr_index,
            cqi: self.config.cqi,
        }
    }

    /// UCI answering every PUCCH PDU of `request`
    pub fn respond(&mut self, request: &UlTtiRequest) -> Vec<UciIndication> {
        let time = request.time();
        request
            .pucch_pdus()
            .map(|pdu| match pdu.format_type {
                PucchFormatType::Format0 | PucchFormatType::Format1 => self.format01(pdu),
                PucchFormatType::Format2 | PucchFormatType::Format3 | PucchFormatType::Format4 => {
                    self.format234(time, pdu)
                }
            })
            .collect()
    }

    fn format01(&mut self, pdu: &PucchPdu) -> UciIndication {
        let pucch_format = if pdu.format_type == PucchFormatType::Format0 { 0 } else { 1 };
        let mut uci = UciPucchFormat01::new(pdu.rnti, pucch_format, self.config.ul_cqi);
        uci.rssi = self.config.rssi;
        self.short_receptions += 1;
        let dtx = every(self.short_receptions, self.config.dtx_every);

        if pdu.bit_len_harq > 0 {
            let values = (0..pdu.bit_len_harq)
                .map(|_| if self.next_harq_ack() { 0 } else { 1 })
                .collect();
            uci = uci.with_harq(values, dtx as u8);
        }
        if pdu.sr_flag {
            let sr = self.next_sr();
            uci = uci.with_sr(sr, dtx as u8);
        }
        trace!("UE {} answers {:?} request: {:?}", pdu.rnti, pdu.format_type, uci);
        UciIndication::Pucch01(uci)
    }

    fn format234(&mut self, time: SlotTime, pdu: &PucchPdu) -> UciIndication {
        let pucch_format = match pdu.format_type {
            PucchFormatType::Format3 => 3,
            PucchFormatType::Format4 => 4,
            _ => 2,
        };
        let mut uci = UciPucchFormat234::new(pdu.rnti, pucch_format, self.config.ul_cqi);
        uci.rssi = self.config.rssi;

        if pdu.bit_len_harq > 0 {
            let mut packed = vec![0u8; (pdu.bit_len_harq as usize).div_ceil(8)];
            for bit in 0..pdu.bit_len_harq as usize {
                if self.next_harq_ack() {
                    packed[bit >> 3] |= 1 << (bit & 7);
                }
            }
            uci = uci.with_harq(CrcStatus::Pass, Bytes::from(packed), pdu.bit_len_harq);
        }
        if pdu.sr_flag {
            let sr = self.next_sr();
            uci = uci.with_sr(Bytes::from(vec![sr as u8]), 1);
        }
        if pdu.bit_len_csi_part1 > 0 {
            match self.ues.get(&pdu.rnti) {
                Some(ue) => {
                    let abs_slot = time.absolute_slot(self.slots_per_frame);
                    let (payload, len) =
                        encode_csi_part1(&ue.csi_reports, abs_slot, ue.ul_bwp.bwp_id, &self.values());
                    if len != pdu.bit_len_csi_part1 as usize {
                        warn!(
                            "UE {} CSI part 1 of {} bits, {} requested",
                            pdu.rnti, len, pdu.bit_len_csi_part1
                        );
                    }
                    uci = uci.with_csi_part1(CrcStatus::Pass, payload, len as u16);
                }
                None => warn!("No simulated UE {} for CSI request", pdu.rnti),
            }
        }
        UciIndication::Pucch234(uci)
    }
}
