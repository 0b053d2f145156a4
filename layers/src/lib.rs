//! Protocol Stack Layers Library
//! 
//! This crate implements the uplink control information (UCI) part of the 5G NR MAC
//! layer according to 3GPP Release 16: PUCCH occasion scheduling for HARQ-ACK, SR and
//! CSI, and decoding of the UCI the UE sends back.

pub mod mac;

use common::types::Rnti;
use interfaces::InterfaceError;
use thiserror::Error;

/// Common errors for protocol layers
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Layer not initialized")]
    NotInitialized,
    
    #[error("Unknown RNTI {0}")]
    UnknownRnti(Rnti),
    
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),
    
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    
    #[error("Invalid state: {0}")]
    InvalidState(String),
    
    #[error("Interface error: {0}")]
    Interface(#[from] InterfaceError),
}
