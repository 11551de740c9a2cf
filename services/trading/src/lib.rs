//! Trading process: algorithmic participant of the exchange
//!
//! Three pipeline stages connected by SPSC rings:
//! - `market_data` joins the incremental and snapshot multicast groups and
//!   reassembles a gap-free update stream
//! - `engine` applies updates to per-ticker books, maintains positions,
//!   features and risk, and drives one strategy
//! - `gateway` carries order-entry traffic over the exchange TCP session

pub mod engine;
pub mod gateway;
pub mod market_data;
pub mod net;
pub mod strategies;
