//! Market data consumption
//!
//! The assembler is the recovery state machine over the two multicast
//! streams; the consumer is its socket-facing shell. Output is a single
//! gap-free update stream on the engine's ring.

pub mod assembler;
pub mod consumer;

pub use assembler::{FeedAssembler, SyncState};
pub use consumer::MarketDataConsumer;
