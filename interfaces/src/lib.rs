//! MAC-PHY Interface Messages
//! 
//! This crate provides the slot-level messages exchanged between the MAC scheduler and
//! the PHY: UCI indications received on PUCCH and the UL TTI requests describing which
//! PUCCH occasions the PHY must receive.

pub mod ul_tti;
pub mod uci;

use thiserror::Error;

pub use ul_tti::{PucchFormatType, PucchPdu, UlPdu, UlTtiRequest, UlTtiRequestBuffer, MAX_UL_PDUS_PER_SLOT};
pub use uci::{
    CrcStatus, CsiPartPdu, HarqPduFormat01, HarqPduFormat234, SrPduFormat01, SrPduFormat234,
    UciIndication, UciPduBitmap, UciPucchFormat01, UciPucchFormat234, UL_CQI_INVALID,
};

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("Buffer full")]
    BufferFull,
}
