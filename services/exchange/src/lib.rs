//! Exchange process: matching venue with multicast market data
//!
//! Three pipeline stages connected by SPSC rings:
//! - `order_server` terminates client TCP sessions and feeds the requests
//!   ring; it drains the responses ring back to the owning session
//! - `matcher` owns one limit order book per ticker and is the sole
//!   producer of responses and market updates
//! - `market_data` stamps the incremental sequence, multicasts each update,
//!   and synthesizes periodic snapshots from its own shadow of the stream

pub mod market_data;
pub mod matcher;
pub mod net;
pub mod order_server;
