//! Passive market making
//!
//! Quotes both sides of the book. When the fair price sits at least
//! `threshold` away from a touch, the quote joins that touch; otherwise it
//! backs off one tick to avoid being picked off.

use tracing::debug;
use types::prelude::*;

use super::StrategyCtx;
use crate::engine::feature::FeatureEngine;

pub struct MarketMaker {
    ticker_cfg: TickerCfgMap,
}

impl MarketMaker {
    pub fn new(ticker_cfg: TickerCfgMap) -> Self {
        Self { ticker_cfg }
    }

    pub fn on_book_update(
        &self,
        ticker_id: TickerId,
        bbo: &Bbo,
        features: &FeatureEngine,
        ctx: &mut StrategyCtx<'_>,
    ) {
        let fair_price = features.mkt_price();
        if !bbo.is_two_sided() || fair_price.is_nan() {
            return;
        }
        debug!(target: "trade_engine", ticker_id, %bbo, fair_price, "maker quoting");

        let cfg = &self.ticker_cfg[ticker_id as usize];
        let bid_price = bbo.bid_price
            - if fair_price - bbo.bid_price as f64 >= cfg.threshold {
                0
            } else {
                1
            };
        let ask_price = bbo.ask_price
            + if bbo.ask_price as f64 - fair_price >= cfg.threshold {
                0
            } else {
                1
            };

        ctx.order_manager.move_orders(
            ctx.requests,
            ctx.risk,
            ctx.positions,
            ticker_id,
            bid_price,
            ask_price,
            cfg.clip,
        );
    }

    pub fn on_trade_update(&self, update: &MarketUpdate) {
        // Passive strategy: trades only matter through the book callbacks.
        debug!(target: "trade_engine", %update, "maker saw trade");
    }

    pub fn on_order_update(&self, response: &ClientResponse, ctx: &mut StrategyCtx<'_>) {
        ctx.order_manager.on_order_update(response);
    }
}
