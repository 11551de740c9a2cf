//! Position and PnL tracking
//!
//! One record per ticker: signed position, realized and unrealized PnL,
//! per-side open-VWAP numerators and cumulative volume. Money amounts are
//! `Decimal` so the books balance exactly.

use std::fmt;

use rust_decimal::Decimal;
use tracing::debug;
use types::prelude::*;

/// Position state for one ticker.
#[derive(Debug, Clone)]
pub struct PositionInfo {
    pub position: i64,
    pub real_pnl: Decimal,
    pub unreal_pnl: Decimal,
    pub total_pnl: Decimal,
    /// Σ price·qty of the open side, indexed by [`Side::index`].
    open_vwap: [Decimal; 2],
    pub volume: Qty,
    bbo: Bbo,
}

impl Default for PositionInfo {
    fn default() -> Self {
        Self {
            position: 0,
            real_pnl: Decimal::ZERO,
            unreal_pnl: Decimal::ZERO,
            total_pnl: Decimal::ZERO,
            open_vwap: [Decimal::ZERO; 2],
            volume: 0,
            bbo: Bbo::default(),
        }
    }
}

impl fmt::Display for PositionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position{{pos:{} u-pnl:{} r-pnl:{} t-pnl:{} vol:{} {}}}",
            self.position, self.unreal_pnl, self.real_pnl, self.total_pnl, self.volume, self.bbo
        )
    }
}

impl PositionInfo {
    /// Fold one fill into the position.
    ///
    /// Adding in the direction of the position accumulates that side's
    /// VWAP numerator. Trading against it realizes
    /// `min(exec, |old|) · (opp_vwap − px) · sign` and rebases the
    /// surviving side; a flip re-seeds the new side from the residual.
    fn add_fill(&mut self, response: &ClientResponse) {
        let old_position = self.position;
        let side_index = response.side.index();
        let opp_index = response.side.opposite().index();
        let side_sign = response.side.sign();
        let exec = response.exec_qty as i64;
        let price = Decimal::from(response.price);

        self.position += exec * side_sign;
        self.volume += response.exec_qty;

        if old_position * side_sign >= 0 {
            self.open_vwap[side_index] += price * Decimal::from(exec);
        } else {
            let opp_vwap = self.open_vwap[opp_index] / Decimal::from(old_position.abs());
            self.open_vwap[opp_index] = opp_vwap * Decimal::from(self.position.abs());
            self.real_pnl += Decimal::from(exec.min(old_position.abs()))
                * (opp_vwap - price)
                * Decimal::from(side_sign);
            if self.position * old_position < 0 {
                // Position flipped through zero.
                self.open_vwap[side_index] = price * Decimal::from(self.position.abs());
                self.open_vwap[opp_index] = Decimal::ZERO;
            }
        }

        if self.position == 0 {
            self.open_vwap = [Decimal::ZERO; 2];
            self.unreal_pnl = Decimal::ZERO;
        } else {
            self.mark_unrealized(price);
        }
        self.total_pnl = self.unreal_pnl + self.real_pnl;
    }

    /// BBO moved: re-mark the open position against the new mid.
    fn update_bbo(&mut self, bbo: &Bbo) {
        self.bbo = *bbo;
        if self.position != 0 && bbo.is_two_sided() {
            let mid =
                (Decimal::from(bbo.bid_price) + Decimal::from(bbo.ask_price)) / Decimal::from(2);
            self.mark_unrealized(mid);
            self.total_pnl = self.unreal_pnl + self.real_pnl;
        }
    }

    fn mark_unrealized(&mut self, reference_price: Decimal) {
        let abs = Decimal::from(self.position.abs());
        self.unreal_pnl = if self.position > 0 {
            (reference_price - self.open_vwap[Side::Buy.index()] / abs) * abs
        } else {
            (self.open_vwap[Side::Sell.index()] / abs - reference_price) * abs
        };
    }
}

/// Positions for every ticker.
pub struct PositionKeeper {
    positions: Vec<PositionInfo>,
}

impl Default for PositionKeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionKeeper {
    pub fn new() -> Self {
        Self {
            positions: vec![PositionInfo::default(); MAX_TICKERS],
        }
    }

    pub fn add_fill(&mut self, response: &ClientResponse) {
        let position = &mut self.positions[response.ticker_id as usize];
        position.add_fill(response);
        debug!(target: "trade_engine", %position, %response, "fill absorbed");
    }

    pub fn update_bbo(&mut self, ticker_id: TickerId, bbo: &Bbo) {
        self.positions[ticker_id as usize].update_bbo(bbo);
    }

    pub fn position(&self, ticker_id: TickerId) -> &PositionInfo {
        &self.positions[ticker_id as usize]
    }
}
