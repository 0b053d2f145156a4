//! Medium Access Control (MAC) Layer Implementation
//!
//! Implements the UCI part of the 5G NR MAC layer according to 3GPP TS 38.321
//! and TS 38.213 clause 9: PUCCH occasions for HARQ-ACK, SR and periodic CSI,
//! and the handling of the UCI the PHY decodes from them.

pub mod acknack;
pub mod csi;
pub mod csi_report;
pub mod frame_structure;
pub mod harq;
pub mod link_adaptation;
pub mod occasion;
pub mod occupation;
pub mod pucch_config;
pub mod pucch_pdu;
pub mod scheduler;
pub mod sr;
pub mod uci;
pub mod ue;

#[cfg(test)]
pub(crate) mod test_utils;

use crate::LayerError;
use async_trait::async_trait;
use common::types::{CellId, Rnti, SlotTime, SubcarrierSpacing};
use interfaces::{UciIndication, UlTtiRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use frame_structure::TddPattern;
pub use occupation::BeamConfig;
pub use scheduler::{CellContext, DlFeedback, MacScheduler};
pub use ue::{UeConfig, UeMacStats};

/// MAC layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    /// Cell ID
    pub cell_id: CellId,
    /// Subcarrier spacing
    pub scs: SubcarrierSpacing,
    /// TDD pattern, FDD when absent
    pub tdd: Option<TddPattern>,
    /// Minimum PDSCH-to-PUCCH processing time in slots
    pub min_rxtx_time: u16,
    /// NTN K-offset in slots
    pub ntn_koffset: u16,
    /// Transmissions of a DL transport block before it is dropped
    pub harq_round_max: u8,
    /// PUCCH SNR target in 0.1 dB
    pub pucch_target_snr_x10: i32,
    /// RSSI above which no power increase is requested, 0.1 dBFS
    pub pucch_rssi_threshold_x10: i32,
    /// Minimum UL CQI for accepting an SR on format 0/1
    pub sr_min_ul_cqi: u8,
    /// Analog beam settings, none for digital beamforming
    pub beams: Option<BeamConfig>,
    /// Slots buffered ahead for PUCCH reservations
    pub ul_buffer_slots: usize,
    /// Maximum number of UEs
    pub max_ues: usize,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            cell_id: CellId(1),
            scs: SubcarrierSpacing::Scs30,
            tdd: None,
            min_rxtx_time: 2,
            ntn_koffset: 0,
            harq_round_max: 4,
            pucch_target_snr_x10: 200,
            pucch_rssi_threshold_x10: -200,
            sr_min_ul_cqi: 148,
            beams: None,
            ul_buffer_slots: 40,
            max_ues: 64,
        }
    }
}

/// MAC-PHY interface for the uplink control path
#[async_trait]
pub trait MacPhyInterface: Send + Sync {
    /// Slot tick: returns the UL TTI request of slot `now`
    async fn slot_indication(&self, now: SlotTime) -> Result<UlTtiRequest, LayerError>;

    /// UCI decoded from the PUCCHs of slot `now`
    ///
    /// Returns the number of PDUs applied to a known UE.
    async fn uci_indication(&self, now: SlotTime, pdus: Vec<UciIndication>) -> Result<usize, LayerError>;
}

/// MAC layer: the scheduler behind one lock shared by the slot and UCI paths
pub struct MacLayer {
    config: MacConfig,
    scheduler: Arc<Mutex<MacScheduler>>,
    initialized: bool,
}

impl MacLayer {
    /// Create a new MAC layer instance
    pub fn new(config: MacConfig) -> Result<Self, LayerError> {
        let scheduler = MacScheduler::new(config.clone())?;
        Ok(Self {
            config,
            scheduler: Arc::new(Mutex::new(scheduler)),
            initialized: false,
        })
    }

    pub fn config(&self) -> &MacConfig {
        &self.config
    }

    /// Shared handle to the scheduler
    pub fn scheduler(&self) -> Arc<Mutex<MacScheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub async fn initialize(&mut self) -> Result<(), LayerError> {
        info!("Initializing MAC layer");
        debug!(
            "MAC config: cell_id={}, scs={:?}, tdd={:?}, koffset={}",
            self.config.cell_id.0, self.config.scs, self.config.tdd, self.config.ntn_koffset
        );
        self.initialized = true;
        info!("MAC layer initialized successfully");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), LayerError> {
        info!("Shutting down MAC layer");
        self.initialized = false;
        Ok(())
    }

    fn check_initialized(&self) -> Result<(), LayerError> {
        if self.initialized {
            Ok(())
        } else {
            Err(LayerError::NotInitialized)
        }
    }

    pub async fn add_ue(&self, config: UeConfig) -> Result<(), LayerError> {
        self.check_initialized()?;
        self.scheduler.lock().await.add_ue(config)
    }

    pub async fn remove_ue(&self, rnti: Rnti) -> Result<(), LayerError> {
        self.check_initialized()?;
        self.scheduler.lock().await.remove_ue(rnti).map(|_| ())
    }

    /// See [`MacScheduler::schedule_dl_feedback`]
    pub async fn schedule_dl_feedback(
        &self,
        rnti: Rnti,
        now: SlotTime,
        beam: u16,
        r_pucch: Option<u8>,
        is_common: bool,
    ) -> Result<Option<DlFeedback>, LayerError> {
        self.check_initialized()?;
        self.scheduler
            .lock()
            .await
            .schedule_dl_feedback(rnti, now, beam, r_pucch, is_common)
    }

    /// Statistics of every connected UE
    pub async fn ue_stats(&self) -> Vec<(Rnti, UeMacStats)> {
        let scheduler = self.scheduler.lock().await;
        scheduler
            .rntis()
            .filter_map(|rnti| scheduler.stats(rnti).map(|s| (rnti, s.clone())))
            .collect()
    }
}

#[async_trait]
impl MacPhyInterface for MacLayer {
    async fn slot_indication(&self, now: SlotTime) -> Result<UlTtiRequest, LayerError> {
        self.check_initialized()?;
        let mut scheduler = self.scheduler.lock().await;
        Ok(scheduler.slot_indication(now))
    }

    async fn uci_indication(&self, now: SlotTime, pdus: Vec<UciIndication>) -> Result<usize, LayerError> {
        self.check_initialized()?;
        let mut scheduler = self.scheduler.lock().await;
        let mut applied = 0;
        for pdu in pdus.iter() {
            match scheduler.handle_uci(now, pdu) {
                Ok(()) => applied += 1,
                Err(LayerError::UnknownRnti(rnti)) => {
                    warn!("{}: UCI from unknown UE {}, ignoring", now, rnti);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(applied)
    }
}
