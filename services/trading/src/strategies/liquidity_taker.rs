//! Aggressive liquidity taking
//!
//! Watches the tape: when an aggressive trade consumes at least
//! `threshold` of the touched side's liquidity, it follows the aggressor
//! by taking the top of the opposite side.

use tracing::debug;
use types::prelude::*;

use super::StrategyCtx;
use crate::engine::feature::FeatureEngine;

pub struct LiquidityTaker {
    ticker_cfg: TickerCfgMap,
}

impl LiquidityTaker {
    pub fn new(ticker_cfg: TickerCfgMap) -> Self {
        Self { ticker_cfg }
    }

    pub fn on_book_update(&self, _ticker_id: TickerId, _bbo: &Bbo) {
        // Aggressive strategy: book changes only matter through the tape.
    }

    pub fn on_trade_update(
        &self,
        update: &MarketUpdate,
        bbo: &Bbo,
        features: &FeatureEngine,
        ctx: &mut StrategyCtx<'_>,
    ) {
        let agg_ratio = features.agg_trade_qty_ratio();
        if !bbo.is_two_sided() || agg_ratio.is_nan() {
            return;
        }
        debug!(target: "trade_engine", %update, agg_ratio, "taker evaluating");

        let cfg = &self.ticker_cfg[update.ticker_id as usize];
        if agg_ratio >= cfg.threshold {
            // Chase the aggressor: lift the ask after aggressive buying,
            // hit the bid after aggressive selling.
            let (bid_price, ask_price) = if update.side == Side::Buy {
                (bbo.ask_price, PRICE_INVALID)
            } else {
                (PRICE_INVALID, bbo.bid_price)
            };
            ctx.order_manager.move_orders(
                ctx.requests,
                ctx.risk,
                ctx.positions,
                update.ticker_id,
                bid_price,
                ask_price,
                cfg.clip,
            );
        }
    }

    pub fn on_order_update(&self, response: &ClientResponse, ctx: &mut StrategyCtx<'_>) {
        ctx.order_manager.on_order_update(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::order_manager::OrderManager;
    use crate::engine::position::PositionKeeper;
    use crate::engine::risk::RiskManager;
    use runtime::{spsc, Consumer, Producer};
    use rust_decimal::Decimal;

    struct World {
        taker: LiquidityTaker,
        order_manager: OrderManager,
        risk: RiskManager,
        positions: PositionKeeper,
        requests: Producer<ClientRequest>,
        received: Consumer<ClientRequest>,
        features: FeatureEngine,
    }

    fn world(threshold: f64) -> World {
        let mut cfg = TickerCfgMap::default();
        cfg[0] = TradeEngineCfg {
            clip: 3,
            threshold,
            risk: RiskCfg {
                max_order_size: 100,
                max_position: 1_000,
                max_loss: Decimal::from(-1_000),
            },
        };
        let (requests, received) = spsc(REQUEST_QUEUE_CAPACITY);
        World {
            taker: LiquidityTaker::new(cfg),
            order_manager: OrderManager::new(2),
            risk: RiskManager::new(cfg),
            positions: PositionKeeper::new(),
            requests,
            received,
            features: FeatureEngine::new(),
        }
    }

    fn bbo() -> Bbo {
        Bbo {
            bid_price: 99,
            bid_qty: 10,
            ask_price: 101,
            ask_qty: 10,
        }
    }

    fn trade(side: Side, qty: Qty) -> MarketUpdate {
        MarketUpdate {
            kind: MarketUpdateKind::Trade,
            order_id: ORDER_ID_INVALID,
            ticker_id: 0,
            side,
            price: 101,
            qty,
            priority: PRIORITY_INVALID,
        }
    }

    #[test]
    fn test_taker_lifts_ask_after_aggressive_buying() {
        let mut w = world(0.5);
        let print = trade(Side::Buy, 8);
        w.features.on_trade_update(&print, &bbo());
        let mut ctx = StrategyCtx {
            order_manager: &mut w.order_manager,
            risk: &w.risk,
            positions: &w.positions,
            requests: &mut w.requests,
        };
        w.taker.on_trade_update(&print, &bbo(), &w.features, &mut ctx);

        let request = w.received.pop().unwrap();
        assert_eq!(request.side, Side::Buy);
        assert_eq!(request.price, 101, "buys at the ask");
        assert_eq!(request.qty, 3);
        assert!(w.received.pop().is_none(), "one-sided order only");
    }

    #[test]
    fn test_taker_hits_bid_after_aggressive_selling() {
        let mut w = world(0.5);
        let print = trade(Side::Sell, 9);
        w.features.on_trade_update(&print, &bbo());
        let mut ctx = StrategyCtx {
            order_manager: &mut w.order_manager,
            risk: &w.risk,
            positions: &w.positions,
            requests: &mut w.requests,
        };
        w.taker.on_trade_update(&print, &bbo(), &w.features, &mut ctx);

        let request = w.received.pop().unwrap();
        assert_eq!(request.side, Side::Sell);
        assert_eq!(request.price, 99, "sells at the bid");
    }

    #[test]
    fn test_small_trades_are_ignored() {
        let mut w = world(0.5);
        let print = trade(Side::Buy, 2);
        w.features.on_trade_update(&print, &bbo());
        let mut ctx = StrategyCtx {
            order_manager: &mut w.order_manager,
            risk: &w.risk,
            positions: &w.positions,
            requests: &mut w.requests,
        };
        w.taker.on_trade_update(&print, &bbo(), &w.features, &mut ctx);
        assert!(w.received.pop().is_none());
    }
}
