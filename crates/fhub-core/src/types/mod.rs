//! Core data types: decoded trade ticks and per-symbol ticker state.

pub mod ticker;
pub mod trade;

pub use ticker::*;
pub use trade::*;
