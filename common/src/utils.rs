//! Common Utilities
//!
//! Provides utility functions used across the MAC implementation

use crate::types::SubcarrierSpacing;
use tracing::trace;

/// Convert a byte slice to hex string for debugging
pub fn bytes_to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Symbol occupation bitmap for `len` consecutive symbols starting at `start`
pub fn symbols_to_bitmap(start: u8, len: u8) -> u16 {
    let mask = if len >= 16 { u16::MAX } else { (1u16 << len) - 1 };
    let bitmap = mask.checked_shl(start as u32).unwrap_or(0);
    trace!("Symbol bitmap start={} len={} -> {:#06x}", start, len, bitmap);
    bitmap
}

/// Time utilities for slot/frame calculations
pub mod time {
    use super::SubcarrierSpacing;

    /// Slot duration in microseconds for different SCS
    pub fn slot_duration_us(scs: SubcarrierSpacing) -> u32 {
        match scs {
            SubcarrierSpacing::Scs15 => 1000,    // 1 ms
            SubcarrierSpacing::Scs30 => 500,     // 0.5 ms
            SubcarrierSpacing::Scs60 => 250,     // 0.25 ms
            SubcarrierSpacing::Scs120 => 125,    // 0.125 ms
            SubcarrierSpacing::Scs240 => 62,     // 0.0625 ms (approximated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        let data = vec![0x12, 0x34, 0xAB, 0xCD];
        assert_eq!(bytes_to_hex(&data), "12 34 ab cd");
    }

    #[test]
    fn test_symbols_to_bitmap() {
        assert_eq!(symbols_to_bitmap(12, 2), 0b0011_0000_0000_0000);
        assert_eq!(symbols_to_bitmap(0, 14), 0x3fff);
        assert_eq!(symbols_to_bitmap(3, 1), 0b1000);
        assert_eq!(symbols_to_bitmap(5, 0), 0);
    }

    #[test]
    fn test_slot_duration() {
        assert_eq!(time::slot_duration_us(SubcarrierSpacing::Scs15), 1000);
        assert_eq!(time::slot_duration_us(SubcarrierSpacing::Scs30), 500);
        assert_eq!(time::slot_duration_us(SubcarrierSpacing::Scs120), 125);
    }
}
