//! Link Adaptation
//!
//! MCS recommendation from reported CQI (3GPP TS 38.214 Tables 5.2.2.1-2/3/4
//! and 5.1.3.1-1/2/3), PUCCH transmit power control and the PDCCH aggregation
//! closed loop driven by short format DTX.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// MCS returned when no table based recommendation is possible
pub const DEFAULT_MCS: u8 = 9;

/// TPC step in 0.1 dB around the PUCCH SNR target
const TPC_STEP_X10: i32 = 30;

/// PDSCH MCS table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McsTable {
    #[default]
    Qam64,
    Qam256,
    Qam64LowSe,
}

/// CQI table of a CSI report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CqiTable {
    #[default]
    Table1,
    Table2,
    Table3,
}

/// (modulation order, code rate x 1024 x 10) per CQI 1..=15
const CQI_TABLE_1: [(u8, u32); 15] = [
    (2, 780), (2, 1200), (2, 1930), (2, 3080), (2, 4490), (2, 6020), (4, 3780), (4, 4900),
    (4, 6160), (6, 4660), (6, 5670), (6, 6660), (6, 7720), (6, 8730), (6, 9480),
];

const CQI_TABLE_2: [(u8, u32); 15] = [
    (2, 780), (2, 1930), (2, 4490), (4, 3780), (4, 4900), (4, 6160), (6, 4660), (6, 5670),
    (6, 6660), (6, 7720), (6, 8730), (8, 7110), (8, 7970), (8, 8850), (8, 9480),
];

const CQI_TABLE_3: [(u8, u32); 15] = [
    (2, 300), (2, 500), (2, 780), (2, 1200), (2, 1930), (2, 3080), (2, 4490), (2, 6020),
    (4, 3780), (4, 4900), (4, 6160), (6, 4660), (6, 5670), (6, 6660), (6, 7720),
];

/// (modulation order, code rate x 1024 x 10) per MCS index
const MCS_TABLE_1: [(u8, u32); 29] = [
    (2, 1200), (2, 1570), (2, 1930), (2, 2510), (2, 3080), (2, 3790), (2, 4490), (2, 5260),
    (2, 6020), (2, 6790), (4, 3400), (4, 3780), (4, 4340), (4, 4900), (4, 5530), (4, 6160),
    (4, 6580), (6, 4380), (6, 4660), (6, 5170), (6, 5670), (6, 6160), (6, 6660), (6, 7190),
    (6, 7720), (6, 8220), (6, 8730), (6, 9100), (6, 9480),
];

const MCS_TABLE_2: [(u8, u32); 28] = [
    (2, 1200), (2, 1930), (2, 3080), (2, 4490), (2, 6020), (4, 3780), (4, 4340), (4, 4900),
    (4, 5530), (4, 6160), (4, 6580), (6, 4660), (6, 5170), (6, 5670), (6, 6160), (6, 6660),
    (6, 7190), (6, 7720), (6, 8220), (6, 8730), (8, 6825), (8, 7110), (8, 7540), (8, 7970),
    (8, 8410), (8, 8850), (8, 9165), (8, 9480),
];

const MCS_TABLE_3: [(u8, u32); 29] = [
    (2, 300), (2, 400), (2, 500), (2, 640), (2, 780), (2, 990), (2, 1200), (2, 1570),
    (2, 1930), (2, 2510), (2, 3080), (2, 3790), (2, 4490), (2, 5260), (2, 6020), (4, 3400),
    (4, 3780), (4, 4340), (4, 4900), (4, 5530), (4, 6160), (6, 4380), (6, 4660), (6, 5170),
    (6, 5670), (6, 6160), (6, 6660), (6, 7190), (6, 7720),
];

impl McsTable {
    fn entries(&self) -> &'static [(u8, u32)] {
        match self {
            McsTable::Qam64 => &MCS_TABLE_1,
            McsTable::Qam256 => &MCS_TABLE_2,
            McsTable::Qam64LowSe => &MCS_TABLE_3,
        }
    }

    /// Highest MCS index of the table
    pub fn max_mcs(&self) -> u8 {
        (self.entries().len() - 1) as u8
    }

    /// Modulation order of `mcs`
    pub fn modulation_order(&self, mcs: u8) -> Option<u8> {
        self.entries().get(mcs as usize).map(|(qm, _)| *qm)
    }

    /// Target code rate x 1024 x 10 of `mcs`
    pub fn code_rate_x10(&self, mcs: u8) -> Option<u32> {
        self.entries().get(mcs as usize).map(|(_, r)| *r)
    }

    fn matches(&self, cqi_table: CqiTable) -> bool {
        matches!(
            (self, cqi_table),
            (McsTable::Qam64, CqiTable::Table1)
                | (McsTable::Qam256, CqiTable::Table2)
                | (McsTable::Qam64LowSe, CqiTable::Table3)
        )
    }
}

impl CqiTable {
    /// (modulation order, code rate x 1024 x 10) of `cqi`; CQI 0 is out of range
    pub fn entry(&self, cqi: u8) -> Option<(u8, u32)> {
        let table = match self {
            CqiTable::Table1 => &CQI_TABLE_1,
            CqiTable::Table2 => &CQI_TABLE_2,
            CqiTable::Table3 => &CQI_TABLE_3,
        };
        cqi.checked_sub(1).and_then(|i| table.get(i as usize)).copied()
    }
}

/// MCS recommended for wideband CQI `cqi`
///
/// The first MCS with the CQI's modulation order and at least its code rate.
pub fn mcs_from_cqi(mcs_table: McsTable, cqi_table: CqiTable, cqi: u8) -> u8 {
    if !mcs_table.matches(cqi_table) {
        warn!("MCS table {:?} does not match CQI table {:?}", mcs_table, cqi_table);
        return DEFAULT_MCS;
    }
    let Some((cqi_qm, cqi_rate)) = cqi_table.entry(cqi) else {
        warn!("CQI {} out of range", cqi);
        return DEFAULT_MCS;
    };
    mcs_table
        .entries()
        .iter()
        .position(|&(qm, rate)| qm == cqi_qm && rate >= cqi_rate)
        .map_or(mcs_table.max_mcs(), |mcs| mcs as u8)
}

/// PUCCH SNR x10 from a reported UL CQI
pub fn ul_cqi_to_snr_x10(ul_cqi: u8) -> i32 {
    ul_cqi as i32 * 5 - 640
}

/// TPC command for a measured SNR x10 against `target_snr_x10`
///
/// 0: -1 dB, 1: 0 dB, 2: +1 dB, 3: +3 dB
pub fn tpc_command(target_snr_x10: i32, snr_x10: i32) -> u8 {
    if snr_x10 > target_snr_x10 + TPC_STEP_X10 {
        0
    } else if snr_x10 < target_snr_x10 - 3 * TPC_STEP_X10 {
        3
    } else if snr_x10 < target_snr_x10 - TPC_STEP_X10 {
        2
    } else {
        1
    }
}

/// Reported RSSI (0.1 dB steps, 0 = -128 dBFS) in dBFS x10
pub fn rssi_to_dbfs_x10(rssi: u16) -> i32 {
    rssi as i32 - 1280
}

/// Never ask for more power once the received level exceeds `threshold_dbfs_x10`
pub fn limit_tpc_by_rssi(tpc: u8, rssi: Option<u16>, threshold_dbfs_x10: i32) -> u8 {
    match rssi {
        Some(rssi) if rssi_to_dbfs_x10(rssi) > threshold_dbfs_x10 => tpc.min(1),
        _ => tpc,
    }
}

/// Step up of the PDCCH aggregation adjustment on missed feedback
const PDCCH_CL_DTX_STEP: f32 = 0.05;
/// Step down on detected feedback
const PDCCH_CL_DETECTED_STEP: f32 = 0.01;

/// Closed loop adjustment of PDCCH robustness, kept in [0, 1]
pub fn pdcch_closed_loop_adjust(adjust: f32, dtx: bool) -> f32 {
    if dtx {
        (adjust + PDCCH_CL_DTX_STEP).min(1.0)
    } else {
        (adjust - PDCCH_CL_DETECTED_STEP).max(0.0)
    }
}
