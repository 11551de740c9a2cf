//! Trade engine: the strategy-side pipeline
//!
//! One thread drains the gateway's responses ring and the consumer's
//! update ring (non-blocking, alternating), applies updates to per-ticker
//! books, and feeds the position keeper, feature engine and the configured
//! strategy. All strategy order flow funnels through the order manager and
//! its pre-trade risk check.

pub mod feature;
pub mod market_order_book;
pub mod order_manager;
pub mod position;
pub mod risk;

pub use feature::FeatureEngine;
pub use market_order_book::{BookEvent, MarketOrderBook};
pub use order_manager::OrderManager;
pub use position::PositionKeeper;
pub use risk::RiskManager;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use runtime::{Consumer, Producer, RunFlag};
use tracing::{debug, info};
use types::prelude::*;

use crate::strategies::{LiquidityTaker, MarketMaker, RandomFlow, StrategyCtx};

/// Which strategy drives the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoType {
    Maker,
    Taker,
    Random,
}

enum Algo {
    Maker(MarketMaker),
    Taker(LiquidityTaker),
    Random(RandomFlow),
}

/// Cross-thread view of when the engine last saw an event; the main
/// thread uses it to detect a quiesced run.
#[derive(Clone)]
pub struct EventClock {
    base: Instant,
    last_event_nanos: Arc<AtomicU64>,
}

impl EventClock {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            last_event_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    fn touch(&self) {
        self.last_event_nanos
            .store(self.base.elapsed().as_nanos() as u64, Ordering::Release);
    }

    /// Time since the engine last processed any event.
    pub fn silent_for(&self) -> Duration {
        let elapsed = self.base.elapsed().as_nanos() as u64;
        let last = self.last_event_nanos.load(Ordering::Acquire);
        Duration::from_nanos(elapsed.saturating_sub(last))
    }
}

pub struct TradeEngine {
    client_id: ClientId,
    books: Vec<MarketOrderBook>,
    features: FeatureEngine,
    positions: PositionKeeper,
    risk: RiskManager,
    order_manager: OrderManager,
    algo: Algo,
    requests: Producer<ClientRequest>,
    responses: Consumer<ClientResponse>,
    updates: Consumer<MarketUpdate>,
    clock: EventClock,
    run: RunFlag,
}

impl TradeEngine {
    pub fn new(
        client_id: ClientId,
        algo_type: AlgoType,
        ticker_cfg: TickerCfgMap,
        requests: Producer<ClientRequest>,
        responses: Consumer<ClientResponse>,
        updates: Consumer<MarketUpdate>,
        run: RunFlag,
    ) -> Self {
        let algo = match algo_type {
            AlgoType::Maker => Algo::Maker(MarketMaker::new(ticker_cfg)),
            AlgoType::Taker => Algo::Taker(LiquidityTaker::new(ticker_cfg)),
            AlgoType::Random => Algo::Random(RandomFlow::new(client_id)),
        };
        info!(target: "trade_engine", client_id, ?algo_type, "trade engine configured");
        Self {
            client_id,
            books: (0..MAX_TICKERS as TickerId)
                .map(MarketOrderBook::new)
                .collect(),
            features: FeatureEngine::new(),
            positions: PositionKeeper::new(),
            risk: RiskManager::new(ticker_cfg),
            order_manager: OrderManager::new(client_id),
            algo,
            requests,
            responses,
            updates,
            clock: EventClock::new(),
            run,
        }
    }

    /// Shareable idle detector for the orchestrating thread.
    pub fn clock(&self) -> EventClock {
        self.clock.clone()
    }

    /// Drain both inbound rings once. Returns whether any event arrived.
    pub fn poll(&mut self) -> bool {
        let mut worked = false;
        while let Some(response) = self.responses.pop() {
            self.on_order_response(&response);
            self.clock.touch();
            worked = true;
        }
        while let Some(update) = self.updates.pop() {
            self.on_market_update(&update);
            self.clock.touch();
            worked = true;
        }
        worked
    }

    pub fn run(&mut self) {
        debug!(target: "trade_engine", client_id = self.client_id, "trade engine running");
        while self.run.is_running() {
            if !self.poll() {
                if let Algo::Random(flow) = &mut self.algo {
                    flow.on_idle(&mut self.requests);
                }
                std::hint::spin_loop();
            }
        }
        for ticker_id in 0..MAX_TICKERS as TickerId {
            info!(
                target: "trade_engine",
                ticker_id,
                position = %self.positions.position(ticker_id),
                "final position"
            );
        }
        debug!(target: "trade_engine", "trade engine stopped");
    }

    fn on_order_response(&mut self, response: &ClientResponse) {
        debug!(target: "trade_engine", %response, "processing response");
        if response.kind == ClientResponseKind::Filled {
            self.positions.add_fill(response);
        }
        let mut ctx = StrategyCtx {
            order_manager: &mut self.order_manager,
            risk: &self.risk,
            positions: &self.positions,
            requests: &mut self.requests,
        };
        match &self.algo {
            Algo::Maker(maker) => maker.on_order_update(response, &mut ctx),
            Algo::Taker(taker) => taker.on_order_update(response, &mut ctx),
            Algo::Random(_) => {}
        }
    }

    fn on_market_update(&mut self, update: &MarketUpdate) {
        debug!(target: "trade_engine", %update, "processing update");
        let ticker = update.ticker_id as usize;
        assert!(
            ticker < self.books.len(),
            "unknown ticker on market data: {update}"
        );
        match self.books[ticker].apply(update) {
            BookEvent::TradeSeen => self.on_trade_update(update),
            BookEvent::BookChanged => self.on_book_update(update.ticker_id),
        }
    }

    fn on_book_update(&mut self, ticker_id: TickerId) {
        let bbo = *self.books[ticker_id as usize].bbo();
        self.positions.update_bbo(ticker_id, &bbo);
        self.features.on_book_update(ticker_id, &bbo);

        let mut ctx = StrategyCtx {
            order_manager: &mut self.order_manager,
            risk: &self.risk,
            positions: &self.positions,
            requests: &mut self.requests,
        };
        match &self.algo {
            Algo::Maker(maker) => maker.on_book_update(ticker_id, &bbo, &self.features, &mut ctx),
            Algo::Taker(taker) => taker.on_book_update(ticker_id, &bbo),
            Algo::Random(_) => {}
        }
    }

    fn on_trade_update(&mut self, update: &MarketUpdate) {
        let bbo = *self.books[update.ticker_id as usize].bbo();
        self.features.on_trade_update(update, &bbo);

        let mut ctx = StrategyCtx {
            order_manager: &mut self.order_manager,
            risk: &self.risk,
            positions: &self.positions,
            requests: &mut self.requests,
        };
        match &self.algo {
            Algo::Maker(maker) => maker.on_trade_update(update),
            Algo::Taker(taker) => taker.on_trade_update(update, &bbo, &self.features, &mut ctx),
            Algo::Random(_) => {}
        }
    }

    pub fn book(&self, ticker_id: TickerId) -> &MarketOrderBook {
        &self.books[ticker_id as usize]
    }

    pub fn positions(&self) -> &PositionKeeper {
        &self.positions
    }

    pub fn order_manager(&self) -> &OrderManager {
        &self.order_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::spsc;

    fn engine(algo_type: AlgoType, ticker_cfg: TickerCfgMap) -> (
        TradeEngine,
        Producer<ClientResponse>,
        Producer<MarketUpdate>,
        Consumer<ClientRequest>,
    ) {
        let (req_tx, req_rx) = spsc(REQUEST_QUEUE_CAPACITY);
        let (resp_tx, resp_rx) = spsc(REQUEST_QUEUE_CAPACITY);
        let (upd_tx, upd_rx) = spsc(UPDATE_QUEUE_CAPACITY);
        let engine = TradeEngine::new(
            1,
            algo_type,
            ticker_cfg,
            req_tx,
            resp_rx,
            upd_rx,
            RunFlag::new(),
        );
        (engine, resp_tx, upd_tx, req_rx)
    }

    fn add(order_id: OrderId, side: Side, price: Price, qty: Qty) -> MarketUpdate {
        MarketUpdate {
            kind: MarketUpdateKind::Add,
            order_id,
            ticker_id: 0,
            side,
            price,
            qty,
            priority: 1,
        }
    }

    #[test]
    fn test_updates_flow_into_books_and_features() {
        let (mut engine, _resp_tx, mut upd_tx, _req_rx) = engine(AlgoType::Random, TickerCfgMap::default());
        upd_tx.push(add(1, Side::Buy, 99, 10)).unwrap();
        upd_tx.push(add(2, Side::Sell, 101, 10)).unwrap();
        assert!(engine.poll());

        assert_eq!(engine.book(0).bbo().bid_price, 99);
        assert_eq!(engine.book(0).bbo().ask_price, 101);
    }

    #[test]
    fn test_fill_reaches_position_keeper() {
        let (mut engine, mut resp_tx, _upd_tx, _req_rx) = engine(AlgoType::Random, TickerCfgMap::default());
        resp_tx
            .push(ClientResponse {
                kind: ClientResponseKind::Filled,
                client_id: 1,
                ticker_id: 0,
                client_order_id: 1,
                market_order_id: 1,
                side: Side::Buy,
                price: 100,
                exec_qty: 5,
                leaves_qty: 0,
            })
            .unwrap();
        assert!(engine.poll());
        assert_eq!(engine.positions().position(0).position, 5);
    }

    #[test]
    #[should_panic(expected = "unknown ticker on market data")]
    fn test_unknown_ticker_is_fatal() {
        let (mut engine, _resp_tx, mut upd_tx, _req_rx) = engine(AlgoType::Random, TickerCfgMap::default());
        let mut update = add(1, Side::Buy, 99, 10);
        update.ticker_id = MAX_TICKERS as TickerId;
        upd_tx.push(update).unwrap();
        engine.poll();
    }

    #[test]
    fn test_event_clock_tracks_activity() {
        let (mut engine, _resp_tx, mut upd_tx, _req_rx) = engine(AlgoType::Random, TickerCfgMap::default());
        let clock = engine.clock();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.silent_for() >= Duration::from_millis(5));

        upd_tx.push(add(1, Side::Buy, 99, 10)).unwrap();
        engine.poll();
        assert!(clock.silent_for() < Duration::from_millis(5));
    }
}
