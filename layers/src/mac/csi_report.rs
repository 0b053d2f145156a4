//! CSI Report Decoding
//!
//! Periodic CSI reports carried in CSI part 1 of a PUCCH format 2/3/4
//! transmission. Each configured report has a static bit layout derived from
//! its CSI-ReportConfig; the layout of CRI/RI/LI/PMI/CQI reports depends on the
//! rank the UE reports, so the rank is decoded before any rank dependent field
//! (3GPP TS 38.212 Section 6.3.1.1.2).

use super::link_adaptation::CqiTable;
use super::pucch_config::{Periodicity, PucchResourceId};
use common::bits::{BitCursor, BitError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

/// Ranks a report layout is described for
pub const MAX_RANKS: usize = 8;

/// Width of the absolute RSRP/SINR field
const ABS_MEAS_BITLEN: usize = 7;
/// Width of a differential RSRP/SINR field
const DIFF_MEAS_BITLEN: usize = 4;
/// Width of each wideband CQI field
const WB_CQI_BITLEN: usize = 4;

const MIN_RSRP_INDEX: u8 = 16;
const MAX_RSRP_INDEX: u8 = 113;

/// reportQuantity of a CSI-ReportConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportQuantity {
    None,
    CriRiPmiCqi,
    CriRiI1,
    CriRiI1Cqi,
    CriRiCqi,
    CriRsrp,
    SsbIndexRsrp,
    CriRiLiPmiCqi,
    CriSinr,
    SsbIndexSinr,
}

impl ReportQuantity {
    /// L1-RSRP or L1-SINR beam report
    pub fn is_beam_report(&self) -> bool {
        matches!(
            self,
            ReportQuantity::CriRsrp
                | ReportQuantity::SsbIndexRsrp
                | ReportQuantity::CriSinr
                | ReportQuantity::SsbIndexSinr
        )
    }

    /// Report built from CRI, RI and optionally LI, PMI and CQI
    pub fn is_channel_quality_report(&self) -> bool {
        matches!(
            self,
            ReportQuantity::CriRiCqi | ReportQuantity::CriRiPmiCqi | ReportQuantity::CriRiLiPmiCqi
        )
    }

    /// Beam report measured on SSBs rather than CSI-RS
    pub fn is_ssb_based(&self) -> bool {
        matches!(self, ReportQuantity::SsbIndexRsrp | ReportQuantity::SsbIndexSinr)
    }
}

/// Field widths of a CRI/RI/LI/PMI/CQI report, per reported rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsiMeasBitlen {
    pub cri_bitlen: u8,
    pub ri_bitlen: u8,
    /// Allowed ranks; bit `r` set allows rank `r + 1`
    pub ri_restriction: u8,
    pub li_bitlen: [u8; MAX_RANKS],
    pub pmi_x1_bitlen: [u8; MAX_RANKS],
    pub pmi_x2_bitlen: [u8; MAX_RANKS],
    pub cqi_bitlen: [u8; MAX_RANKS],
}

impl Default for CsiMeasBitlen {
    fn default() -> Self {
        Self {
            cri_bitlen: 0,
            ri_bitlen: 0,
            ri_restriction: 0x01,
            li_bitlen: [0; MAX_RANKS],
            pmi_x1_bitlen: [0; MAX_RANKS],
            pmi_x2_bitlen: [0; MAX_RANKS],
            cqi_bitlen: [0; MAX_RANKS],
        }
    }
}

impl CsiMeasBitlen {
    /// Bits actually carried when rank index `ri` (rank - 1) is reported
    pub fn reported_bitlen(&self, ri: usize) -> usize {
        let ri = ri.min(MAX_RANKS - 1);
        self.cri_bitlen as usize
            + self.ri_bitlen as usize
            + self.li_bitlen[ri] as usize
            + self.pmi_x1_bitlen[ri] as usize
            + self.pmi_x2_bitlen[ri] as usize
            + self.cqi_bitlen[ri] as usize
    }

    /// Report size, padded to the largest rank layout
    pub fn max_bitlen(&self) -> usize {
        (0..MAX_RANKS).map(|ri| self.reported_bitlen(ri)).max().unwrap_or(0)
    }

    /// Rank index (rank - 1) addressed by the `ri_index`-th allowed rank
    pub fn rank_from_index(&self, ri_index: u32) -> Option<u8> {
        (0..MAX_RANKS as u8)
            .filter(|r| (self.ri_restriction >> r) & 0x01 != 0)
            .nth(ri_index as usize)
    }
}

/// Field widths of an L1-RSRP/L1-SINR beam report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamReportBitlen {
    /// Number of reported resources (nrofReportedRS)
    pub nb_ssbri_cri: u8,
    pub cri_ssbri_bitlen: u8,
}

impl Default for BeamReportBitlen {
    fn default() -> Self {
        Self {
            nb_ssbri_cri: 1,
            cri_ssbri_bitlen: 0,
        }
    }
}

impl BeamReportBitlen {
    pub fn bit_length(&self) -> usize {
        let nb = self.nb_ssbri_cri.max(1) as usize;
        nb * self.cri_ssbri_bitlen as usize + ABS_MEAS_BITLEN + (nb - 1) * DIFF_MEAS_BITLEN
    }
}

/// Static layout of one periodic CSI report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiReportTemplate {
    pub report_config_id: u8,
    pub quantity: ReportQuantity,
    pub periodicity: Periodicity,
    /// PUCCH resource the report is sent on
    pub pucch_resource: PucchResourceId,
    /// UL BWP the PUCCH resource belongs to
    #[serde(default)]
    pub ul_bwp_id: u8,
    #[serde(default)]
    pub cqi_table: CqiTable,
    #[serde(default)]
    pub meas_bitlen: CsiMeasBitlen,
    #[serde(default)]
    pub beam_bitlen: BeamReportBitlen,
    /// SSB indices addressed by SSBRI
    #[serde(default)]
    pub ssb_index_list: Vec<u8>,
    /// NZP CSI-RS resource ids addressed by CRI
    #[serde(default)]
    pub csi_rs_index_list: Vec<u8>,
}

/// Errors while decoding one CSI report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsiDecodeError {
    #[error("report quantity {0:?} is not supported")]
    UnsupportedQuantity(ReportQuantity),

    #[error("CSI payload truncated: {0}")]
    Truncated(#[from] BitError),

    #[error("RSRP index {0} outside the reportable range")]
    InvalidRsrpIndex(u8),

    #[error("RI index {ri_index} does not address an allowed rank (restriction {restriction:#04x})")]
    InvalidRank { ri_index: u32, restriction: u8 },

    #[error("resource indicator {0} has no configured resource")]
    ResourceIndexOutOfRange(u32),
}

/// One measured reference signal of a beam report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamMeasurement {
    /// SSB index or NZP CSI-RS resource id
    pub resource_id: u8,
    /// RSRP in dBm
    pub value: i16,
}

/// A decoded CSI report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsiReport {
    /// Strongest resource first
    Rsrp {
        ssb_based: bool,
        measurements: Vec<BeamMeasurement>,
    },
    Sinr {
        ssb_based: bool,
        /// Absolute index of the first resource
        sinr_index: u8,
        resources: Vec<u8>,
        /// Differential indices of the other resources
        diff_sinr: Vec<u8>,
    },
    ChannelQuality(ChannelQualityReport),
}

/// Fields of a CRI/RI/LI/PMI/CQI report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelQualityReport {
    pub cri: u8,
    /// Rank index, rank - 1
    pub ri: u8,
    pub li: u8,
    pub pmi_x1: u32,
    pub pmi_x2: u32,
    pub wb_cqi_1tb: u8,
    pub wb_cqi_2tb: Option<u8>,
}

/// RSRP in dBm of reported index `index` (TS 38.133 Table 10.1.6.1-1)
pub fn rsrp_dbm(index: u8) -> Option<i16> {
    (MIN_RSRP_INDEX..=MAX_RSRP_INDEX)
        .contains(&index)
        .then(|| index as i16 - 157)
}

/// Differential RSRP in dB of reported index `index` (TS 38.133 Table 10.1.6.1-2)
pub fn diff_rsrp_db(index: u8) -> i16 {
    -2 * (index & 0x0f) as i16
}

impl CsiReportTemplate {
    /// Bits the report occupies in CSI part 1
    pub fn bit_length(&self) -> usize {
        if self.quantity.is_beam_report() {
            self.beam_bitlen.bit_length()
        } else if self.quantity.is_channel_quality_report() {
            self.meas_bitlen.max_bitlen()
        } else {
            0
        }
    }

    /// True if the report is due in absolute slot `abs_slot`
    pub fn is_due(&self, abs_slot: u32) -> bool {
        self.periodicity.is_occasion(abs_slot)
    }

    /// Decode the report starting at the cursor position
    ///
    /// On success the cursor is left just after the report.
    pub fn decode(&self, cursor: &mut BitCursor<'_>) -> Result<CsiReport, CsiDecodeError> {
        match self.quantity {
            ReportQuantity::CriRsrp | ReportQuantity::SsbIndexRsrp => self.decode_rsrp(cursor),
            ReportQuantity::CriSinr | ReportQuantity::SsbIndexSinr => self.decode_sinr(cursor),
            ReportQuantity::CriRiCqi | ReportQuantity::CriRiPmiCqi | ReportQuantity::CriRiLiPmiCqi => {
                self.decode_channel_quality(cursor).map(CsiReport::ChannelQuality)
            }
            quantity @ (ReportQuantity::None | ReportQuantity::CriRiI1 | ReportQuantity::CriRiI1Cqi) => {
                Err(CsiDecodeError::UnsupportedQuantity(quantity))
            }
        }
    }

    fn resource_list(&self) -> &[u8] {
        if self.quantity.is_ssb_based() {
            &self.ssb_index_list
        } else {
            &self.csi_rs_index_list
        }
    }

    /// SSBRI/CRI fields of a beam report, all sent ahead of the measurements
    fn decode_resource_indicators(&self, cursor: &mut BitCursor<'_>) -> Result<Vec<u8>, CsiDecodeError> {
        let bitlen = self.beam_bitlen.cri_ssbri_bitlen as usize;
        let list = self.resource_list();
        (0..self.beam_bitlen.nb_ssbri_cri.max(1))
            .map(|_| {
                let field = cursor.read_bits(bitlen)?;
                list.get(field as usize)
                    .copied()
                    .ok_or(CsiDecodeError::ResourceIndexOutOfRange(field))
            })
            .collect()
    }

    fn decode_rsrp(&self, cursor: &mut BitCursor<'_>) -> Result<CsiReport, CsiDecodeError> {
        let resources = self.decode_resource_indicators(cursor)?;
        let index = cursor.read_bits(ABS_MEAS_BITLEN)? as u8;
        let diffs = (1..resources.len())
            .map(|_| cursor.read_bits(DIFF_MEAS_BITLEN).map(|d| d as u8))
            .collect::<Result<Vec<_>, _>>()?;
        let strongest = rsrp_dbm(index).ok_or(CsiDecodeError::InvalidRsrpIndex(index))?;

        let measurements = resources
            .iter()
            .enumerate()
            .map(|(i, &resource_id)| BeamMeasurement {
                resource_id,
                value: if i == 0 {
                    strongest
                } else {
                    strongest + diff_rsrp_db(diffs[i - 1])
                },
            })
            .collect();
        trace!("RSRP report: {:?}", measurements);
        Ok(CsiReport::Rsrp {
            ssb_based: self.quantity.is_ssb_based(),
            measurements,
        })
    }

    fn decode_sinr(&self, cursor: &mut BitCursor<'_>) -> Result<CsiReport, CsiDecodeError> {
        let resources = self.decode_resource_indicators(cursor)?;
        let sinr_index = cursor.read_bits(ABS_MEAS_BITLEN)? as u8;
        let diff_sinr = (1..resources.len())
            .map(|_| cursor.read_bits(DIFF_MEAS_BITLEN).map(|d| d as u8))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CsiReport::Sinr {
            ssb_based: self.quantity.is_ssb_based(),
            sinr_index,
            resources,
            diff_sinr,
        })
    }

    fn decode_channel_quality(&self, cursor: &mut BitCursor<'_>) -> Result<ChannelQualityReport, CsiDecodeError> {
        let bitlen = &self.meas_bitlen;
        let mut report = ChannelQualityReport {
            cri: cursor.read_bits(bitlen.cri_bitlen as usize)? as u8,
            ..Default::default()
        };

        let ri_index = cursor.read_bits(bitlen.ri_bitlen as usize)?;
        report.ri = bitlen.rank_from_index(ri_index).ok_or(CsiDecodeError::InvalidRank {
            ri_index,
            restriction: bitlen.ri_restriction,
        })?;
        let ri = report.ri as usize;

        report.li = cursor.read_bits(bitlen.li_bitlen[ri] as usize)? as u8;

        // padding fills the gap to the largest report bit length of the
        // template over all allowed ranks, not to the payload bit length
        let padding = bitlen.max_bitlen() - bitlen.reported_bitlen(ri);
        cursor.skip(padding)?;

        report.pmi_x1 = cursor.read_bits(bitlen.pmi_x1_bitlen[ri] as usize)?;
        report.pmi_x2 = cursor.read_bits(bitlen.pmi_x2_bitlen[ri] as usize)?;

        if bitlen.cqi_bitlen[ri] > 0 {
            report.wb_cqi_1tb = cursor.read_bits(WB_CQI_BITLEN)? as u8;
            if bitlen.cqi_bitlen[ri] as usize > WB_CQI_BITLEN {
                report.wb_cqi_2tb = Some(cursor.read_bits(WB_CQI_BITLEN)? as u8);
            }
        }
        trace!("CSI report {}: {:?}", self.report_config_id, report);
        Ok(report)
    }
}

/// Result of decoding one scheduled report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReport {
    pub report_config_id: u8,
    pub result: Result<CsiReport, CsiDecodeError>,
}

/// Decode every report of `templates` due in `abs_slot` from a CSI part 1 payload
///
/// Reports on another UL BWP are not part of the payload. After each report
/// the cursor moves to the report's configured end whatever the outcome, so a
/// bad field only costs that one report. An unsupported quantity or a payload
/// too short for the next report ends decoding.
pub fn decode_csi_part1(
    templates: &[CsiReportTemplate],
    payload: &[u8],
    bit_len: usize,
    abs_slot: u32,
    ul_bwp_id: u8,
) -> Vec<DecodedReport> {
    let mut cursor = BitCursor::new(payload, bit_len);
    let mut decoded = Vec::new();

    for template in templates.iter() {
        if template.ul_bwp_id != ul_bwp_id || !template.is_due(abs_slot) {
            continue;
        }
        let start = cursor.position();
        let result = template.decode(&mut cursor);
        let stop = matches!(result, Err(CsiDecodeError::UnsupportedQuantity(_)));
        decoded.push(DecodedReport {
            report_config_id: template.report_config_id,
            result,
        });
        if stop {
            break;
        }
        if let Err(e) = cursor.seek(start + template.bit_length()) {
            warn!("CSI part 1 ends inside report {}: {}", template.report_config_id, e);
            break;
        }
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::bits::BitPacker;

    fn ssb_rsrp_template(nb: u8) -> CsiReportTemplate {
        CsiReportTemplate {
            report_config_id: 0,
            quantity: ReportQuantity::SsbIndexRsrp,
            periodicity: Periodicity::new(20, 5),
            pucch_resource: 10,
            ul_bwp_id: 0,
            cqi_table: CqiTable::Table1,
            meas_bitlen: CsiMeasBitlen::default(),
            beam_bitlen: BeamReportBitlen { nb_ssbri_cri: nb, cri_ssbri_bitlen: 2 },
            ssb_index_list: vec![0, 4, 8, 12],
            csi_rs_index_list: vec![],
        }
    }

    fn cqi_template() -> CsiReportTemplate {
        // rank 1: cri 1 + ri 1 + pmi 2+4 + cqi 4 = 12
        // rank 2: cri 1 + ri 1 + li 1 + pmi 2+1 + cqi 4 = 10
        let mut meas = CsiMeasBitlen {
            cri_bitlen: 1,
            ri_bitlen: 1,
            ri_restriction: 0b0000_0011,
            ..Default::default()
        };
        meas.li_bitlen[1] = 1;
        meas.pmi_x1_bitlen[0] = 2;
        meas.pmi_x2_bitlen[0] = 4;
        meas.pmi_x1_bitlen[1] = 2;
        meas.pmi_x2_bitlen[1] = 1;
        meas.cqi_bitlen[0] = 4;
        meas.cqi_bitlen[1] = 4;
        CsiReportTemplate {
            report_config_id: 1,
            quantity: ReportQuantity::CriRiLiPmiCqi,
            periodicity: Periodicity::new(20, 5),
            pucch_resource: 10,
            ul_bwp_id: 0,
            cqi_table: CqiTable::Table1,
            meas_bitlen: meas,
            beam_bitlen: BeamReportBitlen::default(),
            ssb_index_list: vec![],
            csi_rs_index_list: vec![0, 1],
        }
    }

    #[test]
    fn test_rsrp_table() {
        assert_eq!(rsrp_dbm(15), None);
        assert_eq!(rsrp_dbm(16), Some(-141));
        assert_eq!(rsrp_dbm(113), Some(-44));
        assert_eq!(rsrp_dbm(114), None);
        assert_eq!(diff_rsrp_db(0), 0);
        assert_eq!(diff_rsrp_db(15), -30);
    }

    #[test]
    fn test_ssb_rsrp_report() {
        let template = ssb_rsrp_template(2);
        assert_eq!(template.bit_length(), 2 * 2 + 7 + 4);

        let mut packer = BitPacker::new();
        packer.write_bits(1, 2).write_bits(3, 2).write_bits(100, 7).write_bits(2, 4);
        let (payload, len) = packer.finish();

        let mut cursor = BitCursor::new(&payload, len);
        let report = template.decode(&mut cursor).unwrap();
        assert_eq!(
            report,
            CsiReport::Rsrp {
                ssb_based: true,
                measurements: vec![
                    BeamMeasurement { resource_id: 4, value: -57 },
                    BeamMeasurement { resource_id: 12, value: -61 },
                ],
            }
        );
        assert_eq!(cursor.position(), template.bit_length());
    }

    #[test]
    fn test_rsrp_index_below_range_rejected() {
        let template = ssb_rsrp_template(1);
        let mut packer = BitPacker::new();
        packer.write_bits(0, 2).write_bits(10, 7);
        let (payload, len) = packer.finish();

        let mut cursor = BitCursor::new(&payload, len);
        assert_eq!(template.decode(&mut cursor), Err(CsiDecodeError::InvalidRsrpIndex(10)));
    }

    #[test]
    fn test_sinr_report() {
        let mut template = ssb_rsrp_template(2);
        template.quantity = ReportQuantity::CriSinr;
        template.csi_rs_index_list = vec![7, 9];

        let mut packer = BitPacker::new();
        packer.write_bits(1, 2).write_bits(0, 2).write_bits(90, 7).write_bits(5, 4);
        let (payload, len) = packer.finish();

        let mut cursor = BitCursor::new(&payload, len);
        assert_eq!(
            template.decode(&mut cursor).unwrap(),
            CsiReport::Sinr { ssb_based: false, sinr_index: 90, resources: vec![9, 7], diff_sinr: vec![5] }
        );
    }

    #[test]
    fn test_resource_indicator_out_of_range() {
        let mut template = ssb_rsrp_template(1);
        template.ssb_index_list = vec![0, 4];
        let mut packer = BitPacker::new();
        packer.write_bits(3, 2).write_bits(60, 7);
        let (payload, len) = packer.finish();

        let mut cursor = BitCursor::new(&payload, len);
        assert_eq!(template.decode(&mut cursor), Err(CsiDecodeError::ResourceIndexOutOfRange(3)));
    }

    #[test]
    fn test_rank_two_report_skips_padding() {
        let template = cqi_template();
        assert_eq!(template.bit_length(), 12);

        // cri 1, ri index 1 -> rank 2, li 1, 2 padding bits, x1 3, x2 0, cqi 11
        let mut packer = BitPacker::new();
        packer
            .write_bits(1, 1)
            .write_bits(1, 1)
            .write_bits(1, 1)
            .pad(2)
            .write_bits(3, 2)
            .write_bits(0, 1)
            .write_bits(11, 4);
        let (payload, len) = packer.finish();
        assert_eq!(len, 12);

        let mut cursor = BitCursor::new(&payload, len);
        let report = template.decode(&mut cursor).unwrap();
        assert_eq!(
            report,
            CsiReport::ChannelQuality(ChannelQualityReport {
                cri: 1,
                ri: 1,
                li: 1,
                pmi_x1: 3,
                pmi_x2: 0,
                wb_cqi_1tb: 11,
                wb_cqi_2tb: None,
            })
        );
        assert_eq!(cursor.position(), 12);
    }

    #[test]
    fn test_rank_one_report() {
        let template = cqi_template();
        let mut packer = BitPacker::new();
        packer
            .write_bits(0, 1)
            .write_bits(0, 1)
            .write_bits(2, 2)
            .write_bits(9, 4)
            .write_bits(15, 4);
        let (payload, len) = packer.finish();

        let mut cursor = BitCursor::new(&payload, len);
        match template.decode(&mut cursor).unwrap() {
            CsiReport::ChannelQuality(r) => {
                assert_eq!((r.ri, r.pmi_x1, r.pmi_x2, r.wb_cqi_1tb), (0, 2, 9, 15));
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_rank_outside_restriction() {
        let mut template = cqi_template();
        template.meas_bitlen.ri_restriction = 0b0000_0001;
        let mut packer = BitPacker::new();
        packer.write_bits(0, 1).write_bits(1, 1).pad(10);
        let (payload, len) = packer.finish();

        let mut cursor = BitCursor::new(&payload, len);
        assert_eq!(
            template.decode(&mut cursor),
            Err(CsiDecodeError::InvalidRank { ri_index: 1, restriction: 0x01 })
        );
    }

    #[test]
    fn test_two_transport_block_cqi() {
        let mut meas = CsiMeasBitlen { ri_bitlen: 0, ..Default::default() };
        meas.cqi_bitlen[0] = 8;
        let template = CsiReportTemplate {
            quantity: ReportQuantity::CriRiCqi,
            meas_bitlen: meas,
            ..cqi_template()
        };
        let mut packer = BitPacker::new();
        packer.write_bits(12, 4).write_bits(7, 4);
        let (payload, len) = packer.finish();

        let mut cursor = BitCursor::new(&payload, len);
        match template.decode(&mut cursor).unwrap() {
            CsiReport::ChannelQuality(r) => {
                assert_eq!(r.wb_cqi_1tb, 12);
                assert_eq!(r.wb_cqi_2tb, Some(7));
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_part1_realigns_after_bad_report() {
        let rsrp = ssb_rsrp_template(1);
        let cqi = cqi_template();
        let templates = vec![rsrp.clone(), cqi];

        let mut packer = BitPacker::new();
        // invalid RSRP index, then a rank 1 CQI report
        packer.write_bits(0, 2).write_bits(5, 7);
        packer.write_bits(1, 1).write_bits(0, 1).write_bits(1, 2).write_bits(2, 4).write_bits(6, 4);
        let (payload, len) = packer.finish();

        // absolute slot 25 hits period 20 offset 5
        let decoded = decode_csi_part1(&templates, &payload, len, 25, 0);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].result, Err(CsiDecodeError::InvalidRsrpIndex(5)));
        match &decoded[1].result {
            Ok(CsiReport::ChannelQuality(r)) => assert_eq!((r.cri, r.wb_cqi_1tb), (1, 6)),
            other => panic!("unexpected result {:?}", other),
        }

        assert!(decode_csi_part1(&templates, &payload, len, 24, 0).is_empty());
        assert!(decode_csi_part1(&templates, &payload, len, 25, 1).is_empty());
    }

    #[test]
    fn test_unsupported_quantity_stops_decoding() {
        let mut first = ssb_rsrp_template(1);
        first.quantity = ReportQuantity::CriRiI1Cqi;
        let templates = vec![first, ssb_rsrp_template(1)];
        let payload = [0xffu8; 4];

        let decoded = decode_csi_part1(&templates, &payload, 32, 5, 0);
        assert_eq!(decoded.len(), 1);
        assert_eq!(
            decoded[0].result,
            Err(CsiDecodeError::UnsupportedQuantity(ReportQuantity::CriRiI1Cqi))
        );
    }

    #[test]
    fn test_template_from_yaml() {
        let yaml = r#"
report_config_id: 3
quantity: ssb_index_rsrp
periodicity: { period: 40, offset: 3 }
pucch_resource: 12
beam_bitlen: { nb_ssbri_cri: 1, cri_ssbri_bitlen: 3 }
ssb_index_list: [0, 1, 2, 3, 4, 5, 6, 7]
"#;
        let template: CsiReportTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.quantity, ReportQuantity::SsbIndexRsrp);
        assert_eq!(template.bit_length(), 10);
        assert_eq!(template.meas_bitlen.ri_restriction, 0x01);
        assert!(template.is_due(43));
    }
}
