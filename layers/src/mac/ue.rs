//! UE Context
//!
//! Per-UE MAC state used by the UCI path: dedicated configuration, HARQ
//! processes, pending PUCCH occasions, power control and CSI results.

use super::csi_report::{BeamMeasurement, ChannelQualityReport, CsiReportTemplate};
use super::harq::{HarqEntity, MAX_HARQ_PROCESSES};
use super::link_adaptation::{CqiTable, McsTable, DEFAULT_MCS};
use super::occasion::OccasionTable;
use super::pucch_config::PucchConfig;
use crate::LayerError;
use common::types::Rnti;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Active uplink bandwidth part of a UE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlBwpConfig {
    #[serde(default)]
    pub bwp_id: u8,
    /// First common resource block of the BWP
    #[serde(default)]
    pub bwp_start: u16,
    pub bwp_size: u16,
    /// Row of the common PUCCH resource table (pucch-ResourceCommon)
    #[serde(default)]
    pub pucch_resource_common: u8,
}

/// DCI format used to schedule the UE's PDSCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlDciFormat {
    #[serde(rename = "format1_0")]
    Format1_0,
    #[default]
    #[serde(rename = "format1_1")]
    Format1_1,
}

fn default_num_harq_processes() -> usize {
    MAX_HARQ_PROCESSES
}

/// Dedicated configuration of a connected UE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeConfig {
    pub rnti: Rnti,
    /// Beam the UE is served on
    #[serde(default)]
    pub beam_index: u16,
    pub ul_bwp: UlBwpConfig,
    pub pucch_config: PucchConfig,
    #[serde(default)]
    pub csi_reports: Vec<CsiReportTemplate>,
    #[serde(default)]
    pub dl_dci_format: DlDciFormat,
    #[serde(default)]
    pub mcs_table: McsTable,
    #[serde(default = "default_num_harq_processes")]
    pub num_harq_processes: usize,
}

impl UeConfig {
    /// Check the dedicated configuration before the UE is admitted
    pub fn validate(&self) -> Result<(), LayerError> {
        self.pucch_config
            .validate()
            .map_err(|e| LayerError::InvalidConfiguration(format!("UE {}: {}", self.rnti, e)))?;
        if self.num_harq_processes == 0 || self.num_harq_processes > MAX_HARQ_PROCESSES {
            return Err(LayerError::InvalidConfiguration(format!(
                "UE {}: {} HARQ processes",
                self.rnti, self.num_harq_processes
            )));
        }
        for report in self.csi_reports.iter() {
            report.periodicity.validate_csi().map_err(|e| {
                LayerError::InvalidConfiguration(format!(
                    "UE {} CSI report {}: {}",
                    self.rnti, report.report_config_id, e
                ))
            })?;
        }
        Ok(())
    }

    /// Largest PDSCH-to-HARQ offset of the dedicated timing set
    pub fn max_fb_time(&self) -> u8 {
        self.pucch_config
            .feedback_timing(false)
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// CQI table a report's CQI is interpreted against
    ///
    /// Configured tables only apply to PDSCH scheduled with DCI 1_1.
    pub fn cqi_table(&self, template: &CsiReportTemplate) -> CqiTable {
        match self.dl_dci_format {
            DlDciFormat::Format1_1 => template.cqi_table,
            DlDciFormat::Format1_0 => CqiTable::Table1,
        }
    }
}

/// Per-UE MAC statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UeMacStats {
    /// DL HARQ processes aborted at the round limit
    pub dl_harq_errors: u64,
    /// Format 0/1 receptions without detected feedback
    pub pucch0_dtx: u64,
    pub cumul_rsrp: i64,
    pub num_rsrp_meas: u64,
    pub csi_reports_decoded: u64,
    pub csi_reports_dropped: u64,
    /// ACK/NACK opportunities without a PUCCH occasion
    pub pucch_dropped: u64,
    pub sr_received: u64,
}

/// Latest CSI measurement results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsiMeasurements {
    /// Last beam report, strongest resource first
    pub rsrp: Vec<BeamMeasurement>,
    pub sinr_index: Option<u8>,
    pub channel_quality: Option<ChannelQualityReport>,
}

/// MAC state of one connected UE
#[derive(Debug, Clone)]
pub struct UeContext {
    pub config: UeConfig,
    pub harq: HarqEntity,
    pub occasions: OccasionTable,
    /// Current serving beam
    pub beam_index: u16,
    /// Pending scheduling request
    pub sr: bool,
    /// Latest PUCCH TPC command
    pub tpc1: u8,
    pub pucch_snr_x10: i32,
    /// PDCCH robustness adjustment in [0, 1]
    pub pdcch_cl_adjust: f32,
    /// MCS recommended by the latest CQI
    pub dl_max_mcs: u8,
    pub ul_failure: bool,
    pub transmission_interrupted: bool,
    pub csi: CsiMeasurements,
    pub stats: UeMacStats,
}

impl UeContext {
    pub fn new(config: UeConfig, occasion_table_size: usize, harq_round_max: u8) -> Result<Self, LayerError> {
        config.validate()?;
        debug!(
            "UE {}: {} HARQ processes, {} PUCCH occasions, {} CSI reports",
            config.rnti,
            config.num_harq_processes,
            occasion_table_size,
            config.csi_reports.len()
        );
        Ok(Self {
            harq: HarqEntity::new(config.num_harq_processes, harq_round_max),
            occasions: OccasionTable::new(occasion_table_size),
            beam_index: config.beam_index,
            sr: false,
            tpc1: 1,
            pucch_snr_x10: 0,
            pdcch_cl_adjust: 0.0,
            dl_max_mcs: DEFAULT_MCS,
            ul_failure: false,
            transmission_interrupted: false,
            csi: CsiMeasurements::default(),
            stats: UeMacStats::default(),
            config,
        })
    }

    pub fn rnti(&self) -> Rnti {
        self.config.rnti
    }

    /// Not eligible for SR and CSI occasions
    pub fn is_suspended(&self) -> bool {
        self.ul_failure || self.transmission_interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UE_YAML: &str = r#"
rnti: 17921
ul_bwp:
  bwp_size: 106
pucch_config:
  resource_sets:
    - { id: 0, resources: [0] }
    - { id: 1, resources: [1], max_payload_size: 64 }
  resources:
    - id: 0
      starting_prb: 0
      format: { type: format0, initial_cyclic_shift: 0, nrof_symbols: 1, starting_symbol_index: 13 }
    - id: 1
      starting_prb: 10
      format: { type: format2, nrof_prbs: 2, nrof_symbols: 1, starting_symbol_index: 13 }
  format2: { max_code_rate: zero_dot35, simultaneous_harq_ack_csi: true }
  sr_resources:
    - { id: 0, periodicity: { period: 20, offset: 5 }, resource: 0 }
  dl_data_to_ul_ack: [2, 3, 4, 6]
csi_reports:
  - report_config_id: 0
    quantity: ssb_index_rsrp
    periodicity: { period: 40, offset: 7 }
    pucch_resource: 1
    ssb_index_list: [0]
"#;

    #[test]
    fn test_ue_config_from_yaml() {
        let config: UeConfig = serde_yaml::from_str(UE_YAML).unwrap();
        assert_eq!(config.rnti, Rnti(0x4601));
        assert_eq!(config.num_harq_processes, 16);
        assert_eq!(config.dl_dci_format, DlDciFormat::Format1_1);
        assert_eq!(config.max_fb_time(), 6);
        assert!(config.validate().is_ok());

        let ue = UeContext::new(config, 10, 4).unwrap();
        assert_eq!(ue.occasions.len(), 10);
        assert_eq!(ue.dl_max_mcs, DEFAULT_MCS);
        assert!(!ue.is_suspended());
    }

    #[test]
    fn test_cqi_table_follows_dci_format() {
        let mut config: UeConfig = serde_yaml::from_str(UE_YAML).unwrap();
        config.csi_reports[0].cqi_table = CqiTable::Table2;
        let template = config.csi_reports[0].clone();
        assert_eq!(config.cqi_table(&template), CqiTable::Table2);
        config.dl_dci_format = DlDciFormat::Format1_0;
        assert_eq!(config.cqi_table(&template), CqiTable::Table1);
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let mut config: UeConfig = serde_yaml::from_str(UE_YAML).unwrap();
        config.csi_reports[0].periodicity.period = 7;
        assert!(matches!(
            UeContext::new(config.clone(), 10, 4),
            Err(LayerError::InvalidConfiguration(_))
        ));

        config.csi_reports.clear();
        config.num_harq_processes = 0;
        assert!(config.validate().is_err());
    }
}
