//! UCI Indication PDUs
//!
//! Uplink control information received on PUCCH, as delivered by the PHY after
//! demultiplexing one occasion. Field layout follows the FAPI P7 UCI.indication.

use bitflags::bitflags;
use bytes::Bytes;
use common::types::Rnti;
use serde::{Deserialize, Serialize};

/// Reported UL SINR is not available
pub const UL_CQI_INVALID: u8 = 0xff;

bitflags! {
    /// Which UCI fields are present in a PUCCH UCI PDU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct UciPduBitmap: u8 {
        /// Scheduling request
        const SR = 0x01;
        /// HARQ ACK/NACK bits
        const HARQ = 0x02;
        /// CSI part 1
        const CSI_PART1 = 0x04;
        /// CSI part 2
        const CSI_PART2 = 0x08;
    }
}

/// CRC outcome reported for a polar-coded UCI field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CrcStatus {
    #[default]
    Pass,
    Fail,
    NotPresent,
}

/// SR field of a format 0/1 PDU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrPduFormat01 {
    /// SR detected
    pub sr_indication: bool,
    /// 0 = good, 1 = bad
    pub sr_confidence_level: u8,
}

/// HARQ field of a format 0/1 PDU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarqPduFormat01 {
    /// 0 = good, 1 = bad (DTX)
    pub harq_confidence_level: u8,
    /// One value per HARQ bit: 0 = ACK, 1 = NACK
    pub harq_values: Vec<u8>,
}

/// UCI received on PUCCH format 0 or 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UciPucchFormat01 {
    pub rnti: Rnti,
    pub pdu_bitmap: UciPduBitmap,
    /// 0 or 1
    pub pucch_format: u8,
    /// SNR in 0.5 dB steps offset by 64 dB, 0xff if unavailable
    pub ul_cqi: u8,
    /// RSSI in 0.1 dB steps, 0 = -128 dBFS
    pub rssi: Option<u16>,
    pub sr: SrPduFormat01,
    pub harq: HarqPduFormat01,
}

impl UciPucchFormat01 {
    /// Create an empty PDU with no fields present
    pub fn new(rnti: Rnti, pucch_format: u8, ul_cqi: u8) -> Self {
        Self {
            rnti,
            pdu_bitmap: UciPduBitmap::empty(),
            pucch_format,
            ul_cqi,
            rssi: None,
            sr: SrPduFormat01::default(),
            harq: HarqPduFormat01::default(),
        }
    }

    /// Attach HARQ bits
    pub fn with_harq(mut self, harq_values: Vec<u8>, harq_confidence_level: u8) -> Self {
        self.pdu_bitmap |= UciPduBitmap::HARQ;
        self.harq = HarqPduFormat01 { harq_confidence_level, harq_values };
        self
    }

    /// Attach an SR field
    pub fn with_sr(mut self, sr_indication: bool, sr_confidence_level: u8) -> Self {
        self.pdu_bitmap |= UciPduBitmap::SR;
        self.sr = SrPduFormat01 { sr_indication, sr_confidence_level };
        self
    }
}

/// SR field of a format 2/3/4 PDU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrPduFormat234 {
    pub sr_bit_len: u16,
    pub sr_payload: Bytes,
}

/// HARQ field of a format 2/3/4 PDU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarqPduFormat234 {
    pub harq_crc: CrcStatus,
    pub harq_bit_len: u16,
    /// Bit `n` at `payload[n / 8] >> (n % 8)`, 1 = ACK
    pub harq_payload: Bytes,
}

/// One CSI part of a format 2/3/4 PDU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiPartPdu {
    pub crc: CrcStatus,
    pub bit_len: u16,
    pub payload: Bytes,
}

/// UCI received on PUCCH format 2, 3 or 4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UciPucchFormat234 {
    pub rnti: Rnti,
    pub pdu_bitmap: UciPduBitmap,
    /// 2, 3 or 4
    pub pucch_format: u8,
    pub ul_cqi: u8,
    pub rssi: Option<u16>,
    pub sr: SrPduFormat234,
    pub harq: HarqPduFormat234,
    pub csi_part1: CsiPartPdu,
    pub csi_part2: CsiPartPdu,
}

impl UciPucchFormat234 {
    /// Create an empty PDU with no fields present
    pub fn new(rnti: Rnti, pucch_format: u8, ul_cqi: u8) -> Self {
        Self {
            rnti,
            pdu_bitmap: UciPduBitmap::empty(),
            pucch_format,
            ul_cqi,
            rssi: None,
            sr: SrPduFormat234::default(),
            harq: HarqPduFormat234::default(),
            csi_part1: CsiPartPdu::default(),
            csi_part2: CsiPartPdu::default(),
        }
    }

    /// Attach HARQ bits
    pub fn with_harq(mut self, harq_crc: CrcStatus, harq_payload: Bytes, harq_bit_len: u16) -> Self {
        self.pdu_bitmap |= UciPduBitmap::HARQ;
        self.harq = HarqPduFormat234 { harq_crc, harq_bit_len, harq_payload };
        self
    }

    /// Attach SR bits
    pub fn with_sr(mut self, sr_payload: Bytes, sr_bit_len: u16) -> Self {
        self.pdu_bitmap |= UciPduBitmap::SR;
        self.sr = SrPduFormat234 { sr_bit_len, sr_payload };
        self
    }

    /// Attach CSI part 1
    pub fn with_csi_part1(mut self, crc: CrcStatus, payload: Bytes, bit_len: u16) -> Self {
        self.pdu_bitmap |= UciPduBitmap::CSI_PART1;
        self.csi_part1 = CsiPartPdu { crc, bit_len, payload };
        self
    }
}

/// A single UCI PDU of either format family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UciIndication {
    Pucch01(UciPucchFormat01),
    Pucch234(UciPucchFormat234),
}

impl UciIndication {
    /// RNTI the PDU was received from
    pub fn rnti(&self) -> Rnti {
        match self {
            UciIndication::Pucch01(pdu) => pdu.rnti,
            UciIndication::Pucch234(pdu) => pdu.rnti,
        }
    }
}
