//! PUCCH Configuration
//!
//! Dedicated PUCCH resources and resource sets (PUCCH-Config), the common
//! resource table used before dedicated configuration applies, resource
//! selection by UCI payload size and the code rate limit of long formats.

use interfaces::PucchFormatType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PUCCH resource identifier
pub type PucchResourceId = u8;

/// Maximum payload of a resource set without `max_payload_size`
pub const DEFAULT_MAX_PAYLOAD_SIZE: u16 = 1706;

/// Errors in PUCCH configuration lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PucchConfigError {
    #[error("PUCCH resource set {0} is not configured")]
    ResourceSetMissing(usize),

    #[error("no PUCCH resource set carries {0} UCI bits")]
    PayloadTooLarge(u16),

    #[error("PUCCH resource indicator {indicator} out of range for resource set {set}")]
    IndicatorOutOfRange { indicator: u8, set: usize },

    #[error("PUCCH resource {0} is not configured")]
    ResourceNotFound(PucchResourceId),

    #[error("PUCCH resource {0} is not part of resource set {1}")]
    NotInResourceSet(PucchResourceId, usize),

    #[error("PUCCH resource {id} has format {format:?}, expected {expected}")]
    UnexpectedFormat {
        id: PucchResourceId,
        format: PucchFormatType,
        expected: &'static str,
    },

    #[error("common PUCCH resource table row {0} out of range")]
    CommonRowOutOfRange(u8),

    #[error("common PUCCH resource index {0} out of range")]
    CommonIndexOutOfRange(u8),

    #[error("periodicity of {period} slots with offset {offset} is not allowed")]
    InvalidPeriodicity { period: u16, offset: u16 },
}

/// Format specific part of a PUCCH resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PucchFormat {
    Format0 {
        initial_cyclic_shift: u8,
        nrof_symbols: u8,
        starting_symbol_index: u8,
    },
    Format1 {
        initial_cyclic_shift: u8,
        nrof_symbols: u8,
        starting_symbol_index: u8,
        #[serde(default)]
        time_domain_occ: u8,
    },
    Format2 {
        nrof_prbs: u8,
        nrof_symbols: u8,
        starting_symbol_index: u8,
    },
    Format3 {
        nrof_prbs: u8,
        nrof_symbols: u8,
        starting_symbol_index: u8,
    },
    Format4 {
        nrof_symbols: u8,
        starting_symbol_index: u8,
        #[serde(default = "default_occ_length")]
        occ_length: u8,
    },
}

fn default_occ_length() -> u8 {
    2
}

impl PucchFormat {
    pub fn format_type(&self) -> PucchFormatType {
        match self {
            PucchFormat::Format0 { .. } => PucchFormatType::Format0,
            PucchFormat::Format1 { .. } => PucchFormatType::Format1,
            PucchFormat::Format2 { .. } => PucchFormatType::Format2,
            PucchFormat::Format3 { .. } => PucchFormatType::Format3,
            PucchFormat::Format4 { .. } => PucchFormatType::Format4,
        }
    }

    pub fn nrof_symbols(&self) -> u8 {
        match *self {
            PucchFormat::Format0 { nrof_symbols, .. }
            | PucchFormat::Format1 { nrof_symbols, .. }
            | PucchFormat::Format2 { nrof_symbols, .. }
            | PucchFormat::Format3 { nrof_symbols, .. }
            | PucchFormat::Format4 { nrof_symbols, .. } => nrof_symbols,
        }
    }

    pub fn starting_symbol(&self) -> u8 {
        match *self {
            PucchFormat::Format0 { starting_symbol_index, .. }
            | PucchFormat::Format1 { starting_symbol_index, .. }
            | PucchFormat::Format2 { starting_symbol_index, .. }
            | PucchFormat::Format3 { starting_symbol_index, .. }
            | PucchFormat::Format4 { starting_symbol_index, .. } => starting_symbol_index,
        }
    }

    /// PRBs spanned; one for formats 0, 1 and 4
    pub fn nrof_prbs(&self) -> u8 {
        match *self {
            PucchFormat::Format2 { nrof_prbs, .. } | PucchFormat::Format3 { nrof_prbs, .. } => nrof_prbs,
            _ => 1,
        }
    }

    /// Formats 0 and 1
    pub fn is_short(&self) -> bool {
        matches!(self, PucchFormat::Format0 { .. } | PucchFormat::Format1 { .. })
    }
}

/// One dedicated PUCCH resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchResource {
    pub id: PucchResourceId,
    /// First PRB relative to the BWP
    pub starting_prb: u16,
    /// Intra-slot frequency hopping target
    #[serde(default)]
    pub second_hop_prb: Option<u16>,
    pub format: PucchFormat,
}

/// A PUCCH resource set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchResourceSet {
    pub id: u8,
    /// Resources addressed by the PUCCH resource indicator
    pub resources: Vec<PucchResourceId>,
    /// Largest UCI payload this set serves (sets 1 and above)
    #[serde(default)]
    pub max_payload_size: Option<u16>,
}

/// Maximum code rate of a long PUCCH format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxCodeRate {
    ZeroDot08,
    ZeroDot15,
    ZeroDot25,
    #[default]
    ZeroDot35,
    ZeroDot45,
    ZeroDot60,
    ZeroDot80,
}

impl MaxCodeRate {
    pub fn value(&self) -> f32 {
        match self {
            MaxCodeRate::ZeroDot08 => 0.08,
            MaxCodeRate::ZeroDot15 => 0.15,
            MaxCodeRate::ZeroDot25 => 0.25,
            MaxCodeRate::ZeroDot35 => 0.35,
            MaxCodeRate::ZeroDot45 => 0.45,
            MaxCodeRate::ZeroDot60 => 0.60,
            MaxCodeRate::ZeroDot80 => 0.80,
        }
    }
}

/// PUCCH-FormatConfig of formats 2, 3 and 4
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PucchFormatConfig {
    pub max_code_rate: MaxCodeRate,
    /// HARQ-ACK may be multiplexed with periodic CSI
    pub simultaneous_harq_ack_csi: bool,
    pub pi2_bpsk: bool,
    pub additional_dmrs: bool,
}

/// Slot periodicity with offset (SR and periodic CSI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Periodicity {
    pub period: u16,
    pub offset: u16,
}

const SR_PERIODS: [u16; 13] = [1, 2, 4, 5, 8, 10, 16, 20, 40, 80, 160, 320, 640];
const CSI_PERIODS: [u16; 10] = [4, 5, 8, 10, 16, 20, 40, 80, 160, 320];

impl Periodicity {
    pub fn new(period: u16, offset: u16) -> Self {
        Self { period, offset }
    }

    fn validate(&self, allowed: &[u16]) -> Result<(), PucchConfigError> {
        if !allowed.contains(&self.period) || self.offset >= self.period {
            return Err(PucchConfigError::InvalidPeriodicity {
                period: self.period,
                offset: self.offset,
            });
        }
        Ok(())
    }

    /// Check against the SR periodicities
    pub fn validate_sr(&self) -> Result<(), PucchConfigError> {
        self.validate(&SR_PERIODS)
    }

    /// Check against the periodic CSI report periodicities
    pub fn validate_csi(&self) -> Result<(), PucchConfigError> {
        self.validate(&CSI_PERIODS)
    }

    /// True if absolute slot `abs_slot` is an occasion
    pub fn is_occasion(&self, abs_slot: u32) -> bool {
        let period = self.period.max(1) as i64;
        (abs_slot as i64 - self.offset as i64).rem_euclid(period) == 0
    }
}

/// SchedulingRequestResourceConfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingRequestResource {
    pub id: u8,
    pub periodicity: Periodicity,
    /// Format 0/1 resource carrying the SR
    pub resource: PucchResourceId,
}

/// Dedicated PUCCH configuration of a UE
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchConfig {
    pub resource_sets: Vec<PucchResourceSet>,
    pub resources: Vec<PucchResource>,
    #[serde(default)]
    pub format2: Option<PucchFormatConfig>,
    #[serde(default)]
    pub format3: Option<PucchFormatConfig>,
    #[serde(default)]
    pub format4: Option<PucchFormatConfig>,
    #[serde(default)]
    pub sr_resources: Vec<SchedulingRequestResource>,
    /// PDSCH-to-HARQ feedback timing set (dl-DataToUL-ACK)
    #[serde(default)]
    pub dl_data_to_ul_ack: Vec<u8>,
}

/// PDSCH-to-HARQ timings of fallback DCI 1_0
const FALLBACK_FEEDBACK_TIMING: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

impl PucchConfig {
    /// Check every cross reference of the configuration
    pub fn validate(&self) -> Result<(), PucchConfigError> {
        for set in self.resource_sets.iter() {
            for id in set.resources.iter() {
                self.resource(*id)?;
            }
        }
        for sr in self.sr_resources.iter() {
            sr.periodicity.validate_sr()?;
            let resource = self.resource(sr.resource)?;
            if !resource.format.is_short() {
                return Err(PucchConfigError::UnexpectedFormat {
                    id: resource.id,
                    format: resource.format.format_type(),
                    expected: "format 0 or 1",
                });
            }
        }
        Ok(())
    }

    pub fn resource(&self, id: PucchResourceId) -> Result<&PucchResource, PucchConfigError> {
        self.resources
            .iter()
            .find(|r| r.id == id)
            .ok_or(PucchConfigError::ResourceNotFound(id))
    }

    pub fn resource_set(&self, set: usize) -> Result<&PucchResourceSet, PucchConfigError> {
        self.resource_sets.get(set).ok_or(PucchConfigError::ResourceSetMissing(set))
    }

    /// Resource set serving `o_uci` bits
    ///
    /// Set 0 carries up to 2 bits; the following sets are tried in order until
    /// one whose maximum payload exceeds `o_uci`.
    pub fn resource_set_index(&self, o_uci: u16) -> Result<usize, PucchConfigError> {
        if o_uci < 3 {
            self.resource_set(0)?;
            return Ok(0);
        }
        self.resource_sets
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, set)| o_uci < set.max_payload_size.unwrap_or(DEFAULT_MAX_PAYLOAD_SIZE))
            .map(|(i, _)| i)
            .ok_or(if self.resource_sets.len() < 2 {
                PucchConfigError::ResourceSetMissing(1)
            } else {
                PucchConfigError::PayloadTooLarge(o_uci)
            })
    }

    /// Resource addressed by resource indicator `pri` for an `o_uci` bit payload
    pub fn resource_id(&self, o_uci: u16, pri: u8) -> Result<PucchResourceId, PucchConfigError> {
        let set = self.resource_set_index(o_uci)?;
        self.resource_sets[set]
            .resources
            .get(pri as usize)
            .copied()
            .ok_or(PucchConfigError::IndicatorOutOfRange { indicator: pri, set })
    }

    /// Resource indicator of resource `id` within resource set `set`
    pub fn resource_indicator(&self, set: usize, id: PucchResourceId) -> Result<u8, PucchConfigError> {
        self.resource_set(set)?
            .resources
            .iter()
            .position(|r| *r == id)
            .map(|p| p as u8)
            .ok_or(PucchConfigError::NotInResourceSet(id, set))
    }

    pub fn format_config(&self, format: PucchFormatType) -> Option<&PucchFormatConfig> {
        match format {
            PucchFormatType::Format2 => self.format2.as_ref(),
            PucchFormatType::Format3 => self.format3.as_ref(),
            PucchFormatType::Format4 => self.format4.as_ref(),
            _ => None,
        }
    }

    /// Candidate PDSCH-to-HARQ offsets in slots
    pub fn feedback_timing(&self, fallback_dci: bool) -> &[u8] {
        if fallback_dci || self.dl_data_to_ul_ack.is_empty() {
            &FALLBACK_FEEDBACK_TIMING
        } else {
            &self.dl_data_to_ul_ack
        }
    }

    /// True if `o_uci` bits fit resource indicator `pri` at its maximum code rate
    pub fn fits_code_rate(&self, o_uci: u16, pri: u8) -> Result<bool, PucchConfigError> {
        let id = self.resource_id(o_uci, pri)?;
        let resource = self.resource(id)?;
        let config = self
            .format_config(resource.format.format_type())
            .cloned()
            .unwrap_or_default();
        Ok(fits_code_rate(o_uci, resource, &config))
    }
}

/// CRC bits appended to an `o_uci` bit payload
pub fn pucch_crc_size(o_uci: u16) -> u16 {
    match o_uci {
        0..=11 => 0,
        12..=19 => 6,
        _ => 11,
    }
}

/// DMRS symbols of a format 3/4 resource
pub fn f3_dmrs_symbols(nrof_symbols: u8, additional_dmrs: bool, hopping: bool) -> u8 {
    match nrof_symbols {
        4 => {
            if hopping {
                2
            } else {
                1
            }
        }
        5..=9 => 2,
        10..=14 => {
            if additional_dmrs {
                4
            } else {
                2
            }
        }
        _ => 0,
    }
}

/// Code rate limit of `resource` for `o_uci` payload bits plus CRC
pub fn fits_code_rate(o_uci: u16, resource: &PucchResource, config: &PucchFormatConfig) -> bool {
    let hopping = resource.second_hop_prb.is_some();
    let (prbs, symbols, re_per_prb, qm) = match resource.format {
        PucchFormat::Format0 { .. } | PucchFormat::Format1 { .. } => return o_uci <= 2,
        PucchFormat::Format2 { nrof_prbs, nrof_symbols, .. } => (nrof_prbs, nrof_symbols, 8u32, 2u32),
        PucchFormat::Format3 { nrof_prbs, nrof_symbols, .. } => {
            let data_symbols = nrof_symbols.saturating_sub(f3_dmrs_symbols(nrof_symbols, config.additional_dmrs, hopping));
            (nrof_prbs, data_symbols, 12, if config.pi2_bpsk { 1 } else { 2 })
        }
        PucchFormat::Format4 { nrof_symbols, occ_length, .. } => {
            let data_symbols = nrof_symbols.saturating_sub(f3_dmrs_symbols(nrof_symbols, config.additional_dmrs, hopping));
            (1, data_symbols, 12 / occ_length.max(1) as u32, if config.pi2_bpsk { 1 } else { 2 })
        }
    };
    let total = (o_uci + pucch_crc_size(o_uci)) as f32;
    let capacity = prbs as u32 * symbols as u32 * re_per_prb * qm;
    total <= capacity as f32 * config.max_code_rate.value()
}

/// PRB and symbol span of a PUCCH transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PucchAllocation {
    pub format: PucchFormatType,
    /// First hop PRB relative to the BWP
    pub prb_start: u16,
    pub nr_of_prbs: u16,
    pub second_hop_prb: Option<u16>,
    pub start_symbol: u8,
    pub nr_of_symbols: u8,
    pub initial_cyclic_shift: u8,
    pub time_domain_occ: u8,
}

impl PucchAllocation {
    pub fn from_resource(resource: &PucchResource) -> Self {
        let (initial_cyclic_shift, time_domain_occ) = match resource.format {
            PucchFormat::Format0 { initial_cyclic_shift, .. } => (initial_cyclic_shift, 0),
            PucchFormat::Format1 { initial_cyclic_shift, time_domain_occ, .. } => (initial_cyclic_shift, time_domain_occ),
            _ => (0, 0),
        };
        Self {
            format: resource.format.format_type(),
            prb_start: resource.starting_prb,
            nr_of_prbs: resource.format.nrof_prbs() as u16,
            second_hop_prb: resource.second_hop_prb,
            start_symbol: resource.format.starting_symbol(),
            nr_of_symbols: resource.format.nrof_symbols(),
            initial_cyclic_shift,
            time_domain_occ,
        }
    }

    /// (absolute PRB, symbol bitmap) pairs covered
    ///
    /// With hopping the first hop carries the first half of the symbols
    /// (rounded down) and the second hop the rest.
    pub fn cells(&self, bwp_start: u16) -> Vec<(u16, u16)> {
        let mut cells = Vec::with_capacity(2 * self.nr_of_prbs as usize);
        match self.second_hop_prb {
            Some(second_hop) => {
                let first_len = self.nr_of_symbols / 2;
                let first = common::symbols_to_bitmap(self.start_symbol, first_len);
                let second = common::symbols_to_bitmap(self.start_symbol + first_len, self.nr_of_symbols - first_len);
                for i in 0..self.nr_of_prbs {
                    if first != 0 {
                        cells.push((bwp_start + self.prb_start + i, first));
                    }
                    cells.push((bwp_start + second_hop + i, second));
                }
            }
            None => {
                let mask = common::symbols_to_bitmap(self.start_symbol, self.nr_of_symbols);
                for i in 0..self.nr_of_prbs {
                    cells.push((bwp_start + self.prb_start + i, mask));
                }
            }
        }
        cells
    }
}

/// Row of the common PUCCH resource table
struct CommonPucchRow {
    format: PucchFormatType,
    first_symbol: u8,
    nr_of_symbols: u8,
    /// `None` means a quarter of the BWP
    prb_offset: Option<u16>,
    cyclic_shifts: &'static [u8],
}

const CS_2: &[u8] = &[0, 3];
const CS_3: &[u8] = &[0, 4, 8];
const CS_F1_2: &[u8] = &[0, 6];
const CS_F1_4: &[u8] = &[0, 3, 6, 9];

const fn row(format: PucchFormatType, first_symbol: u8, nr_of_symbols: u8, prb_offset: Option<u16>, cyclic_shifts: &'static [u8]) -> CommonPucchRow {
    CommonPucchRow { format, first_symbol, nr_of_symbols, prb_offset, cyclic_shifts }
}

/// 3GPP TS 38.213 Table 9.2.1-1
const COMMON_PUCCH_TABLE: [CommonPucchRow; 16] = [
    row(PucchFormatType::Format0, 12, 2, Some(0), CS_2),
    row(PucchFormatType::Format0, 12, 2, Some(0), CS_3),
    row(PucchFormatType::Format0, 12, 2, Some(3), CS_3),
    row(PucchFormatType::Format1, 10, 4, Some(0), CS_F1_2),
    row(PucchFormatType::Format1, 10, 4, Some(0), CS_F1_4),
    row(PucchFormatType::Format1, 10, 4, Some(2), CS_F1_4),
    row(PucchFormatType::Format1, 10, 4, Some(4), CS_F1_4),
    row(PucchFormatType::Format1, 4, 10, Some(0), CS_F1_2),
    row(PucchFormatType::Format1, 4, 10, Some(0), CS_F1_4),
    row(PucchFormatType::Format1, 4, 10, Some(2), CS_F1_4),
    row(PucchFormatType::Format1, 4, 10, Some(4), CS_F1_4),
    row(PucchFormatType::Format1, 0, 14, Some(0), CS_F1_2),
    row(PucchFormatType::Format1, 0, 14, Some(0), CS_F1_4),
    row(PucchFormatType::Format1, 0, 14, Some(2), CS_F1_4),
    row(PucchFormatType::Format1, 0, 14, Some(4), CS_F1_4),
    row(PucchFormatType::Format1, 0, 14, None, CS_F1_4),
];

/// Allocation of common resource `r_pucch` from table row `row_index`
pub fn common_pucch_allocation(row_index: u8, r_pucch: u8, bwp_size: u16) -> Result<PucchAllocation, PucchConfigError> {
    let row = COMMON_PUCCH_TABLE
        .get(row_index as usize)
        .ok_or(PucchConfigError::CommonRowOutOfRange(row_index))?;
    if r_pucch > 15 {
        return Err(PucchConfigError::CommonIndexOutOfRange(r_pucch));
    }
    let offset = row.prb_offset.unwrap_or(bwp_size / 4);
    let n_cs = row.cyclic_shifts.len() as u16;
    let r = r_pucch as u16;

    let (prb_start, second_hop_prb, cs_index) = if r < 8 {
        let shift = r / n_cs;
        (offset + shift, bwp_size.saturating_sub(1 + offset + shift), r % n_cs)
    } else {
        let shift = (r - 8) / n_cs;
        (bwp_size.saturating_sub(1 + offset + shift), offset + shift, (r - 8) % n_cs)
    };

    Ok(PucchAllocation {
        format: row.format,
        prb_start,
        nr_of_prbs: 1,
        second_hop_prb: Some(second_hop_prb),
        start_symbol: row.first_symbol,
        nr_of_symbols: row.nr_of_symbols,
        initial_cyclic_shift: row.cyclic_shifts[cs_index as usize],
        time_domain_occ: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f0(id: u8, prb: u16) -> PucchResource {
        PucchResource {
            id,
            starting_prb: prb,
            second_hop_prb: None,
            format: PucchFormat::Format0 { initial_cyclic_shift: 0, nrof_symbols: 2, starting_symbol_index: 12 },
        }
    }

    fn f2(id: u8, prb: u16, nrof_prbs: u8) -> PucchResource {
        PucchResource {
            id,
            starting_prb: prb,
            second_hop_prb: None,
            format: PucchFormat::Format2 { nrof_prbs, nrof_symbols: 2, starting_symbol_index: 12 },
        }
    }

    fn config() -> PucchConfig {
        PucchConfig {
            resource_sets: vec![
                PucchResourceSet { id: 0, resources: vec![0, 1], max_payload_size: None },
                PucchResourceSet { id: 1, resources: vec![2, 3], max_payload_size: Some(12) },
                PucchResourceSet { id: 2, resources: vec![4], max_payload_size: None },
            ],
            resources: vec![f0(0, 0), f0(1, 1), f2(2, 10, 1), f2(3, 12, 4), f2(4, 20, 8)],
            format2: Some(PucchFormatConfig {
                max_code_rate: MaxCodeRate::ZeroDot35,
                simultaneous_harq_ack_csi: true,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_resource_selection_by_payload() {
        let cfg = config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.resource_id(1, 0), Ok(0));
        assert_eq!(cfg.resource_id(2, 1), Ok(1));
        assert_eq!(cfg.resource_id(3, 0), Ok(2));
        assert_eq!(cfg.resource_id(11, 1), Ok(3));
        // the maximum payload itself goes to the next set
        assert_eq!(cfg.resource_id(12, 0), Ok(4));
        assert_eq!(cfg.resource_id(1, 2), Err(PucchConfigError::IndicatorOutOfRange { indicator: 2, set: 0 }));
        assert_eq!(cfg.resource_indicator(1, 3), Ok(1));
        assert_eq!(cfg.resource_indicator(0, 3), Err(PucchConfigError::NotInResourceSet(3, 0)));
    }

    #[test]
    fn test_crc_size() {
        assert_eq!(pucch_crc_size(11), 0);
        assert_eq!(pucch_crc_size(12), 6);
        assert_eq!(pucch_crc_size(19), 6);
        assert_eq!(pucch_crc_size(20), 11);
    }

    #[test]
    fn test_format2_code_rate() {
        let cfg = config();
        // 1 PRB x 2 symbols x 8 REs x QPSK x 0.35 = 11.2 bits
        assert_eq!(cfg.fits_code_rate(11, 0), Ok(true));
        assert_eq!(cfg.fits_code_rate(5, 0), Ok(true));
        let small = f2(9, 0, 1);
        let rate = PucchFormatConfig::default();
        assert!(fits_code_rate(11, &small, &rate));
        // 12 bits need 6 CRC bits
        assert!(!fits_code_rate(12, &small, &rate));
    }

    #[test]
    fn test_code_rate_monotonic() {
        let rate = PucchFormatConfig { max_code_rate: MaxCodeRate::ZeroDot60, ..Default::default() };
        for resource in [f2(0, 0, 2), f2(1, 0, 16)] {
            let mut accepted = true;
            for bits in 1..600 {
                let fits = fits_code_rate(bits, &resource, &rate);
                assert!(accepted || !fits, "acceptance returned at {} bits", bits);
                accepted = fits;
            }
            assert!(!accepted);
        }
    }

    #[test]
    fn test_format3_dmrs() {
        assert_eq!(f3_dmrs_symbols(4, false, false), 1);
        assert_eq!(f3_dmrs_symbols(4, false, true), 2);
        assert_eq!(f3_dmrs_symbols(7, true, false), 2);
        assert_eq!(f3_dmrs_symbols(14, true, false), 4);
        assert_eq!(f3_dmrs_symbols(14, false, true), 2);

        let resource = PucchResource {
            id: 0,
            starting_prb: 0,
            second_hop_prb: None,
            format: PucchFormat::Format3 { nrof_prbs: 1, nrof_symbols: 4, starting_symbol_index: 10 },
        };
        // 1 PRB x 3 data symbols x 12 REs x BPSK x 0.25 = 9 bits
        let rate = PucchFormatConfig { max_code_rate: MaxCodeRate::ZeroDot25, pi2_bpsk: true, ..Default::default() };
        assert!(fits_code_rate(9, &resource, &rate));
        assert!(!fits_code_rate(10, &resource, &rate));
    }

    #[test]
    fn test_common_table() {
        // row 0 with 2 cyclic shifts, r = 3 -> second PRB, shift 3
        let alloc = common_pucch_allocation(0, 3, 106).unwrap();
        assert_eq!(alloc.format, PucchFormatType::Format0);
        assert_eq!(alloc.prb_start, 1);
        assert_eq!(alloc.second_hop_prb, Some(104));
        assert_eq!(alloc.initial_cyclic_shift, 3);
        assert_eq!((alloc.start_symbol, alloc.nr_of_symbols), (12, 2));

        // mirrored for r >= 8
        let alloc = common_pucch_allocation(2, 9, 106).unwrap();
        assert_eq!(alloc.prb_start, 102);
        assert_eq!(alloc.second_hop_prb, Some(3));
        assert_eq!(alloc.initial_cyclic_shift, 4);

        let alloc = common_pucch_allocation(15, 0, 100).unwrap();
        assert_eq!(alloc.format, PucchFormatType::Format1);
        assert_eq!(alloc.prb_start, 25);
        assert_eq!(alloc.nr_of_symbols, 14);

        assert!(common_pucch_allocation(16, 0, 106).is_err());
        assert!(common_pucch_allocation(0, 16, 106).is_err());
    }

    #[test]
    fn test_allocation_cells() {
        let alloc = common_pucch_allocation(0, 0, 106).unwrap();
        assert_eq!(alloc.cells(10), vec![(10, 1 << 12), (10 + 105, 1 << 13)]);

        let alloc = PucchAllocation::from_resource(&f2(2, 4, 2));
        assert_eq!(alloc.cells(0), vec![(4, 0x3000), (5, 0x3000)]);
    }

    #[test]
    fn test_periodicity() {
        let sr = Periodicity::new(20, 5);
        assert!(sr.validate_sr().is_ok());
        assert!(sr.is_occasion(25));
        assert!(!sr.is_occasion(24));
        assert!(sr.is_occasion(5));
        assert!(!sr.is_occasion(0));
        assert!(Periodicity::new(3, 0).validate_sr().is_err());
        assert!(Periodicity::new(20, 20).validate_sr().is_err());
        assert!(Periodicity::new(2, 0).validate_csi().is_err());
    }

    #[test]
    fn test_feedback_timing() {
        let mut cfg = config();
        assert_eq!(cfg.feedback_timing(false), &FALLBACK_FEEDBACK_TIMING);
        cfg.dl_data_to_ul_ack = vec![2, 4];
        assert_eq!(cfg.feedback_timing(false), &[2, 4]);
        assert_eq!(cfg.feedback_timing(true).len(), 8);
    }

    #[test]
    fn test_deserialize_resource() {
        let yaml = r#"
id: 5
starting_prb: 40
second_hop_prb: 60
format:
  type: format1
  initial_cyclic_shift: 0
  nrof_symbols: 14
  starting_symbol_index: 0
"#;
        let resource: PucchResource = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(resource.format.format_type(), PucchFormatType::Format1);
        assert_eq!(resource.second_hop_prb, Some(60));
        assert!(resource.format.is_short());
    }
}
