//! Market data distribution
//!
//! The publisher stamps the gap-free incremental sequence and multicasts
//! every engine update; the synthesizer mirrors the stream and periodically
//! multicasts a complete snapshot for late joiners and recovery.

pub mod publisher;
pub mod snapshot;

pub use publisher::MarketDataPublisher;
pub use snapshot::SnapshotSynthesizer;
