//! Frame Structure
//!
//! Slot pattern of the cell: which slots may carry uplink transmissions and how
//! many uplink slots every TDD period and every frame contains.

use crate::LayerError;
use common::types::SubcarrierSpacing;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Duplex mode of the cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    Fdd,
    Tdd,
}

/// TDD UL/DL pattern (TDD-UL-DL-ConfigCommon pattern1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TddPattern {
    /// Pattern periodicity in slots
    pub period_slots: u16,
    /// Full downlink slots at the start of the period
    pub dl_slots: u16,
    /// Downlink symbols in the first slot after the DL slots
    #[serde(default)]
    pub dl_symbols: u8,
    /// Full uplink slots at the end of the period
    pub ul_slots: u16,
    /// Uplink symbols in the last slot before the UL slots
    #[serde(default)]
    pub ul_symbols: u8,
}

/// Usage of one slot in the period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Downlink,
    Uplink,
    /// Flexible slot with DL symbols at the start and UL symbols at the end
    Mixed { dl_symbols: u8, ul_symbols: u8 },
}

/// Slot layout of the cell
#[derive(Debug, Clone)]
pub struct FrameStructure {
    duplex_mode: DuplexMode,
    slots_per_frame: u16,
    slot_types: Vec<SlotType>,
    ul_slots_per_period: u16,
}

impl FrameStructure {
    /// Paired spectrum: every slot is uplink capable
    pub fn fdd(scs: SubcarrierSpacing) -> Self {
        let slots_per_frame = scs.slots_per_frame();
        Self {
            duplex_mode: DuplexMode::Fdd,
            slots_per_frame,
            slot_types: vec![SlotType::Uplink; slots_per_frame as usize],
            ul_slots_per_period: slots_per_frame,
        }
    }

    /// Unpaired spectrum following `pattern`
    pub fn tdd(scs: SubcarrierSpacing, pattern: &TddPattern) -> Result<Self, LayerError> {
        let slots_per_frame = scs.slots_per_frame();
        let period = pattern.period_slots;
        if period == 0 || slots_per_frame % period != 0 {
            return Err(LayerError::InvalidConfiguration(format!(
                "TDD period of {} slots does not divide a frame of {} slots",
                period, slots_per_frame
            )));
        }
        if pattern.dl_slots + pattern.ul_slots > period {
            return Err(LayerError::InvalidConfiguration(format!(
                "TDD pattern with {} DL and {} UL slots exceeds period {}",
                pattern.dl_slots, pattern.ul_slots, period
            )));
        }
        if pattern.dl_symbols as u16 + pattern.ul_symbols as u16 > 14 {
            return Err(LayerError::InvalidConfiguration(format!(
                "Mixed slot with {} DL and {} UL symbols exceeds 14 symbols",
                pattern.dl_symbols, pattern.ul_symbols
            )));
        }

        let first_ul = period - pattern.ul_slots;
        let slot_types: Vec<SlotType> = (0..period)
            .map(|slot| {
                if slot < pattern.dl_slots {
                    SlotType::Downlink
                } else if slot >= first_ul {
                    SlotType::Uplink
                } else {
                    let dl_symbols = if slot == pattern.dl_slots { pattern.dl_symbols } else { 0 };
                    let ul_symbols = if slot + 1 == first_ul { pattern.ul_symbols } else { 0 };
                    SlotType::Mixed { dl_symbols, ul_symbols }
                }
            })
            .collect();

        let ul_slots_per_period = slot_types.iter().filter(|t| Self::carries_ul(**t)).count() as u16;
        debug!(
            "TDD pattern: period {} slots, {} UL capable slots per period",
            period, ul_slots_per_period
        );

        Ok(Self {
            duplex_mode: DuplexMode::Tdd,
            slots_per_frame,
            slot_types,
            ul_slots_per_period,
        })
    }

    fn carries_ul(slot_type: SlotType) -> bool {
        match slot_type {
            SlotType::Uplink => true,
            SlotType::Mixed { ul_symbols, .. } => ul_symbols > 0,
            SlotType::Downlink => false,
        }
    }

    pub fn duplex_mode(&self) -> DuplexMode {
        self.duplex_mode
    }

    pub fn slots_per_frame(&self) -> u16 {
        self.slots_per_frame
    }

    /// Slots in one TDD period (one frame for FDD)
    pub fn slots_per_period(&self) -> u16 {
        self.slot_types.len() as u16
    }

    pub fn ul_slots_per_period(&self) -> u16 {
        self.ul_slots_per_period
    }

    pub fn ul_slots_per_frame(&self) -> u16 {
        self.ul_slots_per_period * (self.slots_per_frame / self.slots_per_period())
    }

    /// Type of `slot` within its period
    pub fn slot_type(&self, slot: u16) -> SlotType {
        self.slot_types[(slot % self.slots_per_period()) as usize]
    }

    /// True if `slot` has uplink symbols
    pub fn is_ul_slot(&self, slot: u16) -> bool {
        self.duplex_mode == DuplexMode::Fdd || Self::carries_ul(self.slot_type(slot))
    }

    /// True if `slot` can carry a PDSCH
    pub fn is_dl_slot(&self, slot: u16) -> bool {
        match self.slot_type(slot) {
            SlotType::Downlink => true,
            SlotType::Mixed { dl_symbols, .. } => dl_symbols > 0,
            SlotType::Uplink => self.duplex_mode == DuplexMode::Fdd,
        }
    }

    /// Number of uplink slots in the period strictly before `slot`
    pub fn ul_slots_before(&self, slot: u16) -> u16 {
        let in_period = slot % self.slots_per_period();
        (0..in_period).filter(|s| Self::carries_ul(self.slot_types[*s as usize])).count() as u16
    }
}
