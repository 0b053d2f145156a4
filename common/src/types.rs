//! Common Types for the 5G MAC
//!
//! Defines fundamental types used throughout the UCI scheduling and decoding path

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt;

/// Number of distinct system frame numbers (SFN wraps at 1024)
pub const MAX_FRAME_NUMBER: u16 = 1024;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub u16);

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
    /// 120 kHz
    Scs120 = 120,
    /// 240 kHz
    Scs240 = 240,
}

impl SubcarrierSpacing {
    /// Number of slots in a 10 ms frame
    pub fn slots_per_frame(&self) -> u16 {
        match self {
            SubcarrierSpacing::Scs15 => 10,
            SubcarrierSpacing::Scs30 => 20,
            SubcarrierSpacing::Scs60 => 40,
            SubcarrierSpacing::Scs120 => 80,
            SubcarrierSpacing::Scs240 => 160,
        }
    }
}

/// A position on the radio timeline: system frame number plus slot within the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SlotTime {
    /// System frame number (0-1023)
    pub frame: u16,
    /// Slot within the frame
    pub slot: u16,
}

impl SlotTime {
    /// Create a new slot time
    pub fn new(frame: u16, slot: u16) -> Self {
        Self { frame, slot }
    }

    /// Slot count since SFN 0, slot 0
    pub fn absolute_slot(&self, slots_per_frame: u16) -> u32 {
        self.frame as u32 * slots_per_frame as u32 + self.slot as u32
    }

    /// Rebuild a slot time from an absolute slot count, wrapping the SFN
    pub fn from_absolute(absolute: u32, slots_per_frame: u16) -> Self {
        let frame = (absolute / slots_per_frame as u32) % MAX_FRAME_NUMBER as u32;
        Self {
            frame: frame as u16,
            slot: (absolute % slots_per_frame as u32) as u16,
        }
    }

    /// The slot time `slots` slots later, wrapping the SFN at 1024
    pub fn advance(&self, slots: u32, slots_per_frame: u16) -> Self {
        let total = self.slot as u32 + slots;
        Self {
            frame: ((self.frame as u32 + total / slots_per_frame as u32) % MAX_FRAME_NUMBER as u32) as u16,
            slot: (total % slots_per_frame as u32) as u16,
        }
    }

    /// The slot time one slot earlier, wrapping the SFN at 1024
    pub fn previous(&self, slots_per_frame: u16) -> Self {
        if self.slot > 0 {
            Self { frame: self.frame, slot: self.slot - 1 }
        } else {
            Self {
                frame: (self.frame + MAX_FRAME_NUMBER - 1) % MAX_FRAME_NUMBER,
                slot: slots_per_frame - 1,
            }
        }
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4}.{:2}", self.frame, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn test_rnti_display() {
        assert_eq!(Rnti(0x4601).to_string(), "4601");
        assert_eq!(Rnti::new(0x1f).to_string(), "001f");
    }

    #[test]
    fn test_scs_from_khz() {
        assert_eq!(SubcarrierSpacing::from_u32(30), Some(SubcarrierSpacing::Scs30));
        assert_eq!(SubcarrierSpacing::from_u32(45), None);
        assert_eq!(SubcarrierSpacing::Scs30.slots_per_frame(), 20);
    }

    #[test]
    fn test_slot_time_advance_wraps_sfn() {
        let t = SlotTime::new(1023, 18);
        assert_eq!(t.advance(3, 20), SlotTime::new(0, 1));
        assert_eq!(SlotTime::new(5, 3).advance(0, 20), SlotTime::new(5, 3));
        assert_eq!(SlotTime::new(0, 0).previous(20), SlotTime::new(1023, 19));
    }

    #[test]
    fn test_slot_time_absolute() {
        let t = SlotTime::new(2, 5);
        assert_eq!(t.absolute_slot(10), 25);
        assert_eq!(SlotTime::from_absolute(25, 10), t);
        assert_eq!(SlotTime::from_absolute(10240, 10), SlotTime::new(0, 0));
    }
}
