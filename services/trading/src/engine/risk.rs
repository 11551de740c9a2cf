//! Pre-trade risk checks

use std::fmt;

use tracing::debug;
use types::prelude::*;

use super::position::PositionKeeper;

/// Outcome of a pre-trade check; anything but `Allowed` blocks the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskCheckResult {
    Invalid,
    OrderTooLarge,
    PositionTooLarge,
    LossTooLarge,
    Allowed,
}

impl fmt::Display for RiskCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "INVALID",
            Self::OrderTooLarge => "ORDER_TOO_LARGE",
            Self::PositionTooLarge => "POSITION_TOO_LARGE",
            Self::LossTooLarge => "LOSS_TOO_LARGE",
            Self::Allowed => "ALLOWED",
        };
        write!(f, "{s}")
    }
}

/// Per-ticker risk limits evaluated against live position state.
pub struct RiskManager {
    ticker_cfg: TickerCfgMap,
}

impl RiskManager {
    pub fn new(ticker_cfg: TickerCfgMap) -> Self {
        Self { ticker_cfg }
    }

    /// Check whether an order of `qty` on `side` may go out for `ticker`.
    pub fn check_pre_trade(
        &self,
        positions: &PositionKeeper,
        ticker_id: TickerId,
        side: Side,
        qty: Qty,
    ) -> RiskCheckResult {
        let risk = &self.ticker_cfg[ticker_id as usize].risk;
        let position = positions.position(ticker_id);

        let result = if qty > risk.max_order_size {
            RiskCheckResult::OrderTooLarge
        } else if (position.position + side.sign() * qty as i64).abs() > risk.max_position {
            RiskCheckResult::PositionTooLarge
        } else if position.total_pnl < risk.max_loss {
            RiskCheckResult::LossTooLarge
        } else {
            RiskCheckResult::Allowed
        };
        if result != RiskCheckResult::Allowed {
            debug!(target: "trade_engine", ticker_id, %side, qty, %result, "order blocked");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn cfg(max_order_size: Qty, max_position: i64, max_loss: i64) -> TickerCfgMap {
        let mut map = TickerCfgMap::default();
        map[0].risk = RiskCfg {
            max_order_size,
            max_position,
            max_loss: Decimal::from(max_loss),
        };
        map
    }

    fn keeper_with_fill(side: Side, price: Price, qty: Qty) -> PositionKeeper {
        let mut keeper = PositionKeeper::new();
        keeper.add_fill(&ClientResponse {
            kind: ClientResponseKind::Filled,
            client_id: 1,
            ticker_id: 0,
            client_order_id: 1,
            market_order_id: 1,
            side,
            price,
            exec_qty: qty,
            leaves_qty: 0,
        });
        keeper
    }

    #[test]
    fn test_order_too_large() {
        let risk = RiskManager::new(cfg(10, 100, -100));
        let positions = PositionKeeper::new();
        assert_eq!(
            risk.check_pre_trade(&positions, 0, Side::Buy, 11),
            RiskCheckResult::OrderTooLarge
        );
        assert_eq!(
            risk.check_pre_trade(&positions, 0, Side::Buy, 10),
            RiskCheckResult::Allowed
        );
    }

    #[test]
    fn test_position_too_large_counts_pending_order() {
        let risk = RiskManager::new(cfg(50, 20, -100));
        let positions = keeper_with_fill(Side::Buy, 100, 15);
        assert_eq!(
            risk.check_pre_trade(&positions, 0, Side::Buy, 10),
            RiskCheckResult::PositionTooLarge
        );
        // Reducing the position is allowed.
        assert_eq!(
            risk.check_pre_trade(&positions, 0, Side::Sell, 10),
            RiskCheckResult::Allowed
        );
    }

    #[test]
    fn test_loss_too_large() {
        let risk = RiskManager::new(cfg(50, 100, -5));
        // Buy 10 at 100, mark at mid 94: -60 unrealized.
        let mut positions = keeper_with_fill(Side::Buy, 100, 10);
        positions.update_bbo(
            0,
            &Bbo {
                bid_price: 93,
                bid_qty: 1,
                ask_price: 95,
                ask_qty: 1,
            },
        );
        assert_eq!(
            risk.check_pre_trade(&positions, 0, Side::Buy, 1),
            RiskCheckResult::LossTooLarge
        );
    }
}
