//! Feature engine: signals derived from the book and the tape
//!
//! Two features feed the strategies: a qty-weighted fair price and the
//! ratio of an aggressive trade's size to the liquidity it hit. Both stay
//! NaN until the BBO is fully populated.

use tracing::trace;
use types::prelude::*;

/// Sentinel for a not-yet-computable feature.
pub const FEATURE_INVALID: f64 = f64::NAN;

#[derive(Debug)]
pub struct FeatureEngine {
    mkt_price: f64,
    agg_trade_qty_ratio: f64,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self {
            mkt_price: FEATURE_INVALID,
            agg_trade_qty_ratio: FEATURE_INVALID,
        }
    }

    /// Book changed: refresh the fair price,
    /// `(bid_px * ask_qty + ask_px * bid_qty) / (bid_qty + ask_qty)`.
    pub fn on_book_update(&mut self, ticker_id: TickerId, bbo: &Bbo) {
        if bbo.is_two_sided() {
            self.mkt_price = (bbo.bid_price as f64 * bbo.ask_qty as f64
                + bbo.ask_price as f64 * bbo.bid_qty as f64)
                / (bbo.bid_qty + bbo.ask_qty) as f64;
        }
        trace!(
            target: "trade_engine",
            ticker_id,
            mkt_price = self.mkt_price,
            "feature refresh"
        );
    }

    /// Trade printed: refresh the aggressor size ratio against the side of
    /// the book it consumed.
    pub fn on_trade_update(&mut self, update: &MarketUpdate, bbo: &Bbo) {
        if bbo.is_two_sided() {
            let resting_qty = if update.side == Side::Buy {
                bbo.ask_qty
            } else {
                bbo.bid_qty
            };
            self.agg_trade_qty_ratio = update.qty as f64 / resting_qty as f64;
        }
        trace!(
            target: "trade_engine",
            agg_trade_qty_ratio = self.agg_trade_qty_ratio,
            "feature refresh"
        );
    }

    pub fn mkt_price(&self) -> f64 {
        self.mkt_price
    }

    pub fn agg_trade_qty_ratio(&self) -> f64 {
        self.agg_trade_qty_ratio
    }
}
