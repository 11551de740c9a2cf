//! Capacity constants and process/strategy configuration
//!
//! Capacities are provisioning decisions fixed at startup; exhausting a pool
//! or overrunning an id space is a fatal condition, not backpressure.

use std::fmt;
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::ids::{Qty, QTY_INVALID};

/// Number of tradable instruments.
pub const MAX_TICKERS: usize = 8;
/// Number of order-entry participants.
pub const MAX_CLIENTS: usize = 16;
/// Id space per book for client order ids and market order ids.
pub const MAX_ORDER_IDS: usize = 64 * 1024;
/// Price-level index space per book side pair.
pub const MAX_PRICE_LEVELS: usize = 256;
/// Capacity of the request/response queues.
pub const REQUEST_QUEUE_CAPACITY: usize = 16 * 1024;
/// Capacity of the market-update queues.
pub const UPDATE_QUEUE_CAPACITY: usize = 64 * 1024;

/// Pre-trade risk limits for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskCfg {
    /// Largest single order quantity allowed out.
    pub max_order_size: Qty,
    /// Largest absolute position, counting the order being checked.
    pub max_position: i64,
    /// Total PnL floor; at or below this no new orders go out.
    pub max_loss: Decimal,
}

impl Default for RiskCfg {
    fn default() -> Self {
        Self {
            max_order_size: 0,
            max_position: 0,
            max_loss: Decimal::ZERO,
        }
    }
}

impl fmt::Display for RiskCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RiskCfg{{max-order-size:{} max-position:{} max-loss:{}}}",
            self.max_order_size, self.max_position, self.max_loss
        )
    }
}

/// Per-ticker strategy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeEngineCfg {
    /// Order size used for every passive or aggressive order.
    pub clip: Qty,
    /// Strategy trigger level: price offset for the maker, trade-size ratio
    /// for the taker.
    pub threshold: f64,
    pub risk: RiskCfg,
}

impl Default for TradeEngineCfg {
    fn default() -> Self {
        Self {
            clip: QTY_INVALID,
            threshold: 0.0,
            risk: RiskCfg::default(),
        }
    }
}

impl fmt::Display for TradeEngineCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TradeEngineCfg{{clip:{} threshold:{} {}}}",
            self.clip, self.threshold, self.risk
        )
    }
}

/// Per-ticker configuration table, indexed by ticker id.
pub type TickerCfgMap = [TradeEngineCfg; MAX_TICKERS];

/// Exchange process endpoints and pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// IPv4 address of the interface the multicast publishers egress
    /// through.
    pub iface: String,
    /// TCP port the order server listens on.
    pub order_server_port: u16,
    pub incremental_group: String,
    pub incremental_port: u16,
    pub snapshot_group: String,
    pub snapshot_port: u16,
    /// Wall-clock seconds between snapshot publications.
    pub snapshot_interval_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            iface: "127.0.0.1".to_string(),
            order_server_port: 12345,
            incremental_group: "233.252.14.3".to_string(),
            incremental_port: 20001,
            snapshot_group: "233.252.14.1".to_string(),
            snapshot_port: 20000,
            snapshot_interval_secs: 60,
        }
    }
}

impl ExchangeConfig {
    /// Load from a JSON file; absent fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Trading process endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Order server address, host:port.
    pub order_server_addr: String,
    /// IPv4 address of the interface the multicast groups are joined on.
    pub iface: String,
    pub incremental_group: String,
    pub incremental_port: u16,
    pub snapshot_group: String,
    pub snapshot_port: u16,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            order_server_addr: "127.0.0.1:12345".to_string(),
            iface: "127.0.0.1".to_string(),
            incremental_group: "233.252.14.3".to_string(),
            incremental_port: 20001,
            snapshot_group: "233.252.14.1".to_string(),
            snapshot_port: 20000,
        }
    }
}

impl TradingConfig {
    /// Load from a JSON file; absent fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
