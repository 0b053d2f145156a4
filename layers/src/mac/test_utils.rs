//! Shared cell and UE fixtures for the MAC unit tests

use super::frame_structure::TddPattern;
use super::occasion::occasion_table_size;
use super::occupation::BeamConfig;
use super::scheduler::CellContext;
use super::ue::{UeConfig, UeContext};
use super::MacConfig;
use common::types::{Rnti, SubcarrierSpacing};

/// 30 kHz TDD cell, DDDDDDDSUU, no analog beams
pub(crate) fn test_cell() -> CellContext {
    let config = MacConfig {
        scs: SubcarrierSpacing::Scs30,
        tdd: Some(TddPattern {
            period_slots: 10,
            dl_slots: 7,
            dl_symbols: 6,
            ul_slots: 2,
            ul_symbols: 0,
        }),
        ..MacConfig::default()
    };
    CellContext::new(config).unwrap()
}

/// Same cell serving a single analog beam per slot
pub(crate) fn test_beam_cell() -> CellContext {
    let config = MacConfig {
        beams: Some(BeamConfig { beams_per_period: 1, beam_duration: 1 }),
        ..test_cell().config
    };
    CellContext::new(config).unwrap()
}

pub(crate) const TEST_UE_YAML: &str = r#"
rnti: 0
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
    - { id: 0, periodicity: { period: 20, offset: 8 }, resource: 0 }
  dl_data_to_ul_ack: [2, 3, 4, 6]
csi_reports:
  - report_config_id: 0
    quantity: ssb_index_rsrp
    periodicity: { period: 40, offset: 9 }
    pucch_resource: 1
    beam_bitlen: { nb_ssbri_cri: 1, cri_ssbri_bitlen: 0 }
    ssb_index_list: [0]
"#;

pub(crate) fn test_ue_config(rnti: u16) -> UeConfig {
    let mut config: UeConfig = serde_yaml::from_str(TEST_UE_YAML).unwrap();
    config.rnti = Rnti(rnti);
    config
}

/// UE with SR in slot 8 of every frame and an SSB RSRP report in slot 9 of even frames
pub(crate) fn test_ue(cell: &CellContext, rnti: u16) -> UeContext {
    let config = test_ue_config(rnti);
    let horizon = config.max_fb_time() as u16 + cell.config.ntn_koffset;
    let size = occasion_table_size(&cell.frame, horizon);
    UeContext::new(config, size, cell.config.harq_round_max).unwrap()
}
