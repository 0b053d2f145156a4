//! MAC Scheduler Implementation
//!
//! Owns the connected UEs, the shared uplink resource occupation and the UL TTI
//! requests of the slots ahead. Every PUCCH routine runs on a `&mut` borrow of
//! the scheduler, so the lock around it covers both the test and the set of a
//! reservation.

use super::acknack::acknack_scheduling;
use super::csi::csi_meas_reporting;
use super::frame_structure::FrameStructure;
use super::harq::HarqPid;
use super::occasion::occasion_table_size;
use super::occupation::UlResources;
use super::pucch_pdu::schedule_pucch;
use super::sr::sr_reporting;
use super::uci::{handle_uci_format01, handle_uci_format234};
use super::ue::{UeConfig, UeContext, UeMacStats};
use super::MacConfig;
use crate::LayerError;
use common::types::{Rnti, SlotTime};
use interfaces::{UciIndication, UlTtiRequest, UlTtiRequestBuffer};
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Largest PDSCH-to-HARQ offset a UE may be configured with
pub const MAX_FEEDBACK_SLOTS: u32 = 15;

/// Cell wide scheduling parameters
#[derive(Debug, Clone)]
pub struct CellContext {
    pub config: MacConfig,
    pub frame: FrameStructure,
}

impl CellContext {
    pub fn new(config: MacConfig) -> Result<Self, LayerError> {
        let frame = match config.tdd.as_ref() {
            Some(pattern) => FrameStructure::tdd(config.scs, pattern)?,
            None => FrameStructure::fdd(config.scs),
        };
        Ok(Self { config, frame })
    }

    pub fn slots_per_frame(&self) -> u16 {
        self.frame.slots_per_frame()
    }

    /// Smallest PDSCH-to-PUCCH delay in slots, K-offset included
    pub fn min_feedback_time(&self) -> u32 {
        self.config.min_rxtx_time as u32 + self.config.ntn_koffset as u32
    }

    pub fn beams_enabled(&self) -> bool {
        self.config.beams.is_some()
    }
}

/// Where the feedback of a DL transmission is expected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlFeedback {
    pub pid: HarqPid,
    /// PUCCH slot carrying the ACK/NACK bit
    pub time: SlotTime,
    /// PDSCH-to-HARQ timing indicator to signal in the DCI
    pub timing_indicator: u8,
    pub retransmission: bool,
}

/// MAC scheduler
pub struct MacScheduler {
    cell: CellContext,
    resources: UlResources,
    ues: BTreeMap<Rnti, UeContext>,
    ul_tti: UlTtiRequestBuffer,
    /// Slots buffered ahead in the occupation map and the UL TTI requests
    buffer_slots: usize,
}

impl MacScheduler {
    /// Create a new MAC scheduler
    pub fn new(config: MacConfig) -> Result<Self, LayerError> {
        let cell = CellContext::new(config)?;
        let needed = (MAX_FEEDBACK_SLOTS + cell.config.ntn_koffset as u32 + 1) as usize;
        if cell.config.ul_buffer_slots < needed {
            return Err(LayerError::InvalidConfiguration(format!(
                "{} buffered UL slots, at least {} needed",
                cell.config.ul_buffer_slots, needed
            )));
        }
        let buffer_slots = cell.config.ul_buffer_slots;
        let spf = cell.slots_per_frame();
        info!(
            "MAC scheduler: cell {} {:?} {:?}, {} UL slots per frame, {} slots buffered",
            cell.config.cell_id.0,
            cell.config.scs,
            cell.frame.duplex_mode(),
            cell.frame.ul_slots_per_frame(),
            buffer_slots
        );
        Ok(Self {
            resources: UlResources::new(cell.config.beams.clone(), buffer_slots, spf),
            ul_tti: UlTtiRequestBuffer::new(buffer_slots, spf),
            ues: BTreeMap::new(),
            buffer_slots,
            cell,
        })
    }

    pub fn cell(&self) -> &CellContext {
        &self.cell
    }

    pub fn num_ues(&self) -> usize {
        self.ues.len()
    }

    pub fn ue(&self, rnti: Rnti) -> Option<&UeContext> {
        self.ues.get(&rnti)
    }

    pub fn ue_mut(&mut self, rnti: Rnti) -> Option<&mut UeContext> {
        self.ues.get_mut(&rnti)
    }

    pub fn rntis(&self) -> impl Iterator<Item = Rnti> + '_ {
        self.ues.keys().copied()
    }

    /// Admit a UE with its dedicated configuration
    pub fn add_ue(&mut self, config: UeConfig) -> Result<(), LayerError> {
        let rnti = config.rnti;
        if self.ues.contains_key(&rnti) {
            return Err(LayerError::InvalidConfiguration(format!("UE {} already exists", rnti)));
        }
        if self.ues.len() >= self.cell.config.max_ues {
            return Err(LayerError::ResourceUnavailable(format!(
                "UE {}: cell already serves {} UEs",
                rnti,
                self.ues.len()
            )));
        }
        let horizon = config.max_fb_time() as u32 + self.cell.config.ntn_koffset as u32;
        if horizon >= self.buffer_slots as u32 {
            return Err(LayerError::InvalidConfiguration(format!(
                "UE {}: feedback {} slots ahead exceeds the {} buffered slots",
                rnti, horizon, self.buffer_slots
            )));
        }
        let table_size = occasion_table_size(&self.cell.frame, horizon as u16);
        let ue = UeContext::new(config, table_size, self.cell.config.harq_round_max)?;
        info!("Added UE {} on beam {}", rnti, ue.beam_index);
        self.ues.insert(rnti, ue);
        Ok(())
    }

    /// Release a UE and every PUCCH resource it still holds
    pub fn remove_ue(&mut self, rnti: Rnti) -> Result<UeContext, LayerError> {
        let mut ue = self.ues.remove(&rnti).ok_or(LayerError::UnknownRnti(rnti))?;
        let active: Vec<_> = ue.occasions.active().map(|(idx, _)| idx).collect();
        for idx in active {
            if let Some(reservation) = ue.occasions.reset(idx) {
                self.resources.release(&reservation);
            }
        }
        info!("Removed UE {}", rnti);
        Ok(ue)
    }

    /// Run the PUCCH scheduling of slot `now` and hand over its UL TTI request
    ///
    /// Periodic CSI is placed for the slot `max_fb_time` ahead, SR for `now`,
    /// then every occasion due in `now` becomes a PUCCH PDU.
    pub fn slot_indication(&mut self, now: SlotTime) -> UlTtiRequest {
        let Self { cell, resources, ues, ul_tti, .. } = self;
        let ul_slot = cell.frame.is_ul_slot(now.slot);
        if ul_slot {
            ul_tti.prepare(now);
        }

        let mut csi = 0;
        let mut sr = 0;
        let mut pucch = 0;
        for ue in ues.values_mut() {
            csi += csi_meas_reporting(cell, resources, ue, now);
        }
        if ul_slot {
            for ue in ues.values_mut() {
                sr += sr_reporting(cell, resources, ue, now);
            }
            for ue in ues.values_mut() {
                if schedule_pucch(cell, resources, ue, now, ul_tti) {
                    pucch += 1;
                }
            }
        }
        if csi + sr + pucch > 0 {
            debug!("{}: {} CSI reports, {} SR occasions, {} PUCCH PDUs", now, csi, sr, pucch);
        }

        let request = ul_tti.take(now);
        resources.clear_slot(now);
        trace!("{}: UL TTI request with {} PDUs", now, request.pdus.len());
        request
    }

    /// Book the ACK/NACK of a PDSCH to `rnti` sent at `now`
    ///
    /// Picks the oldest pending retransmission, or else an idle HARQ process,
    /// and schedules its feedback on PUCCH. `Ok(None)` means no PUCCH occasion
    /// was available and the transmission should not go out in this slot.
    pub fn schedule_dl_feedback(
        &mut self,
        rnti: Rnti,
        now: SlotTime,
        beam: u16,
        r_pucch: Option<u8>,
        is_common: bool,
    ) -> Result<Option<DlFeedback>, LayerError> {
        let Self { cell, resources, ues, .. } = self;
        let ue = ues.get_mut(&rnti).ok_or(LayerError::UnknownRnti(rnti))?;

        let (pid, retransmission) = match ue.harq.next_retransmission() {
            Some(pid) => (pid, true),
            None => match ue.harq.next_free() {
                Some(pid) => (pid, false),
                None => {
                    return Err(LayerError::ResourceUnavailable(format!(
                        "UE {}: all {} HARQ processes busy",
                        rnti,
                        ue.harq.num_processes()
                    )))
                }
            },
        };

        let Some((idx, timing_indicator)) = acknack_scheduling(cell, resources, ue, now, beam, r_pucch, is_common)
        else {
            warn!("UE {} {}: no PUCCH occasion for HARQ process {}", rnti, now, pid.value());
            ue.stats.pucch_dropped += 1;
            if retransmission {
                ue.harq.requeue_retransmission(pid);
            }
            return Ok(None);
        };

        let time = ue.occasions.get(idx).time;
        ue.harq.expect_feedback(pid, time)?;
        debug!(
            "UE {} {}: HARQ process {} feedback in {} (PDSCH-to-HARQ indicator {})",
            rnti,
            now,
            pid.value(),
            time,
            timing_indicator
        );
        Ok(Some(DlFeedback { pid, time, timing_indicator, retransmission }))
    }

    /// Apply one UCI PDU received in slot `now`
    pub fn handle_uci(&mut self, now: SlotTime, uci: &UciIndication) -> Result<(), LayerError> {
        let rnti = uci.rnti();
        let Self { cell, ues, .. } = self;
        let ue = ues.get_mut(&rnti).ok_or(LayerError::UnknownRnti(rnti))?;
        match uci {
            UciIndication::Pucch01(pdu) => handle_uci_format01(cell, ue, now, pdu),
            UciIndication::Pucch234(pdu) => handle_uci_format234(cell, ue, now, pdu),
        }
        Ok(())
    }

    pub fn stats(&self, rnti: Rnti) -> Option<&UeMacStats> {
        self.ues.get(&rnti).map(|ue| &ue.stats)
    }
}
