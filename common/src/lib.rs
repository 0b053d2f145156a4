//! Common Utilities and Types Library
//! 
//! This crate provides shared types and utilities used across the MAC UCI implementation.

pub mod bits;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use bits::{BitCursor, BitError, BitPacker};
pub use types::*;
pub use utils::*;
