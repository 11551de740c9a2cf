//! Trading strategies
//!
//! Each strategy reacts to book, trade and order callbacks from the trade
//! engine and expresses itself exclusively through the order manager (or,
//! for the random flow, raw requests). Dispatch is a tagged enum in the
//! engine so the hot path stays monomorphic.

pub mod liquidity_taker;
pub mod market_maker;
pub mod random_flow;

pub use liquidity_taker::LiquidityTaker;
pub use market_maker::MarketMaker;
pub use random_flow::RandomFlow;

use runtime::Producer;
use types::prelude::*;

use crate::engine::order_manager::OrderManager;
use crate::engine::position::PositionKeeper;
use crate::engine::risk::RiskManager;

/// Everything a strategy may touch when it acts.
pub struct StrategyCtx<'a> {
    pub order_manager: &'a mut OrderManager,
    pub risk: &'a RiskManager,
    pub positions: &'a PositionKeeper,
    pub requests: &'a mut Producer<ClientRequest>,
}
