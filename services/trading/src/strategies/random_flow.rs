//! Random order flow
//!
//! Bootstrap liquidity for test runs: paced random NEW orders around a
//! per-ticker base price, each followed by a cancel of a randomly chosen
//! earlier order. Runs from the engine's idle tick so the requests ring
//! keeps a single producer.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use runtime::Producer;
use tracing::{debug, error};
use types::prelude::*;

const ORDER_PACE: Duration = Duration::from_millis(20);
const MAX_RANDOM_ORDERS: usize = 10_000;

pub struct RandomFlow {
    client_id: ClientId,
    rng: StdRng,
    base_prices: [Price; MAX_TICKERS],
    sent: Vec<ClientRequest>,
    next_order_id: OrderId,
    last_action_at: Instant,
    remaining: usize,
}

impl RandomFlow {
    /// Seeded by client id so each participant replays the same flow.
    pub fn new(client_id: ClientId) -> Self {
        let mut rng = StdRng::seed_from_u64(client_id as u64);
        let mut base_prices = [0; MAX_TICKERS];
        for price in &mut base_prices {
            *price = rng.gen_range(100..200);
        }
        Self {
            client_id,
            rng,
            base_prices,
            sent: Vec::with_capacity(MAX_RANDOM_ORDERS),
            next_order_id: 1,
            last_action_at: Instant::now()
                .checked_sub(ORDER_PACE)
                .unwrap_or_else(Instant::now),
            remaining: MAX_RANDOM_ORDERS,
        }
    }

    /// Called from the engine when both inbound rings are idle.
    pub fn on_idle(&mut self, requests: &mut Producer<ClientRequest>) {
        if self.remaining == 0 || self.last_action_at.elapsed() < ORDER_PACE {
            return;
        }
        self.last_action_at = Instant::now();
        self.remaining -= 1;

        let ticker_id = self.rng.gen_range(0..MAX_TICKERS as TickerId);
        let request = ClientRequest {
            kind: ClientRequestKind::New,
            client_id: self.client_id,
            ticker_id,
            order_id: self.next_order_id,
            side: if self.rng.gen_bool(0.5) {
                Side::Buy
            } else {
                Side::Sell
            },
            price: self.base_prices[ticker_id as usize] + self.rng.gen_range(1..=10),
            qty: self.rng.gen_range(1..=100),
        };
        self.next_order_id += 1;
        self.send(requests, request);
        self.sent.push(request);

        // Tear down a random earlier order to keep the books moving.
        let mut cancel = self.sent[self.rng.gen_range(0..self.sent.len())];
        cancel.kind = ClientRequestKind::Cancel;
        self.send(requests, cancel);
    }

    fn send(&self, requests: &mut Producer<ClientRequest>, request: ClientRequest) {
        debug!(target: "trade_engine", %request, "random flow sending");
        if let Err(dropped) = requests.push(request) {
            error!(target: "trade_engine", request = %dropped, "request ring full, dropping");
        }
    }
}
