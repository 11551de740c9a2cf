//! Shared vocabulary of the exchange and trading processes
//!
//! Everything that crosses a process or thread boundary is defined here:
//! identifiers, order sides, client requests/responses, market updates,
//! the fixed-size wire codec, best bid/offer, and per-ticker configuration.
//!
//! # Modules
//! - `ids`: identifier aliases and INVALID sentinels
//! - `side`: order side with sign and index mappings
//! - `messages`: order-entry records (requests and responses)
//! - `market_update`: market data records and sequenced frames
//! - `wire`: fixed-size little-endian codec for all three record kinds
//! - `bbo`: best bid/offer aggregate
//! - `config`: capacity constants and process/strategy configuration
//! - `errors`: error taxonomy

pub mod bbo;
pub mod config;
pub mod errors;
pub mod ids;
pub mod market_update;
pub mod messages;
pub mod side;
pub mod wire;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bbo::*;
    pub use crate::config::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::market_update::*;
    pub use crate::messages::*;
    pub use crate::side::*;
}
