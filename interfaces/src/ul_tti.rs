//! UL TTI Requests
//!
//! Per-slot lists of uplink PDUs the PHY must receive. The MAC fills requests for
//! future slots in a ring buffer and hands each one over when its slot comes up.

use crate::InterfaceError;
use common::types::{Rnti, SlotTime};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Upper bound on PDUs in one UL TTI request
pub const MAX_UL_PDUS_PER_SLOT: usize = 32;

/// PUCCH format of a reception request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PucchFormatType {
    Format0,
    Format1,
    Format2,
    Format3,
    Format4,
}

/// PUCCH reception request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchPdu {
    pub rnti: Rnti,
    pub format_type: PucchFormatType,
    /// BWP start in common resource blocks
    pub bwp_start: u16,
    pub bwp_size: u16,
    /// First PRB relative to the BWP
    pub prb_start: u16,
    pub prb_size: u16,
    pub start_symbol_index: u8,
    pub nr_of_symbols: u8,
    pub freq_hop_flag: bool,
    pub second_hop_prb: u16,
    /// Formats 0/1 only
    pub initial_cyclic_shift: u8,
    /// Format 1 only
    pub time_domain_occ_idx: u8,
    /// Formats 3/4 only
    pub pi2_bpsk: bool,
    pub add_dmrs_flag: bool,
    pub sr_flag: bool,
    pub bit_len_harq: u16,
    pub bit_len_csi_part1: u16,
}

/// Any uplink PDU carried in a UL TTI request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UlPdu {
    Pucch(PucchPdu),
}

/// All uplink receptions scheduled in one slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlTtiRequest {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<UlPdu>,
}

impl UlTtiRequest {
    /// Create an empty request for `time`
    pub fn new(time: SlotTime) -> Self {
        Self {
            sfn: time.frame,
            slot: time.slot,
            pdus: Vec::new(),
        }
    }

    /// Slot this request belongs to
    pub fn time(&self) -> SlotTime {
        SlotTime::new(self.sfn, self.slot)
    }

    /// Append a PDU, failing when the request is full
    pub fn push(&mut self, pdu: UlPdu) -> Result<(), InterfaceError> {
        if self.pdus.len() >= MAX_UL_PDUS_PER_SLOT {
            return Err(InterfaceError::BufferFull);
        }
        self.pdus.push(pdu);
        Ok(())
    }

    /// PUCCH PDUs in this request
    pub fn pucch_pdus(&self) -> impl Iterator<Item = &PucchPdu> {
        self.pdus.iter().map(|pdu| match pdu {
            UlPdu::Pucch(pucch) => pucch,
        })
    }
}

/// Ring of UL TTI requests for the slots ahead of the current one
#[derive(Debug, Clone)]
pub struct UlTtiRequestBuffer {
    requests: Vec<UlTtiRequest>,
    slots_per_frame: u16,
}

impl UlTtiRequestBuffer {
    /// Create a buffer covering `size` slots
    pub fn new(size: usize, slots_per_frame: u16) -> Self {
        Self {
            requests: vec![UlTtiRequest::default(); size.max(1)],
            slots_per_frame,
        }
    }

    fn index(&self, time: SlotTime) -> usize {
        time.absolute_slot(self.slots_per_frame) as usize % self.requests.len()
    }

    /// Reset the entry for `time` to an empty request
    pub fn prepare(&mut self, time: SlotTime) {
        let idx = self.index(time);
        trace!("Preparing UL TTI request {} at buffer index {}", time, idx);
        self.requests[idx] = UlTtiRequest::new(time);
    }

    /// Entry that `time` maps to; it may still hold an older slot's request
    pub fn get_mut(&mut self, time: SlotTime) -> &mut UlTtiRequest {
        let idx = self.index(time);
        &mut self.requests[idx]
    }

    /// Hand over the request for `time`, leaving an empty one behind
    pub fn take(&mut self, time: SlotTime) -> UlTtiRequest {
        let idx = self.index(time);
        std::mem::replace(&mut self.requests[idx], UlTtiRequest::new(time))
    }
}
