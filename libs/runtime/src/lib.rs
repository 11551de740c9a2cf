//! Concurrency substrate for the exchange and trading processes
//!
//! - `spsc`: single-producer/single-consumer ring buffer, the only channel
//!   allowed to cross a thread boundary
//! - `pool`: fixed-capacity object pool with index handles
//! - `threads`: named thread spawning with best-effort core pinning and the
//!   per-component run flag

pub mod pool;
pub mod spsc;
pub mod threads;

pub use pool::{Pool, NIL};
pub use spsc::{spsc, Consumer, Producer};
pub use threads::{spawn_named, RunFlag};
