//! Matching engine: the single mutator of every limit order book
//!
//! Consumes the requests ring, produces the responses ring (for the order
//! server) and the market-update ring (for the publisher). Both output
//! rings individually preserve the engine's generation order; nothing
//! synchronizes one against the other.

pub mod book;

pub use book::MeOrderBook;

use runtime::{Consumer, Producer, RunFlag};
use tracing::{debug, error, trace};
use types::prelude::*;

/// The engine's two output rings. Queue-full is a provisioning error: the
/// record is logged and dropped, the engine never blocks.
pub struct EngineOutput {
    responses: Producer<ClientResponse>,
    updates: Producer<MarketUpdate>,
}

impl EngineOutput {
    pub fn new(responses: Producer<ClientResponse>, updates: Producer<MarketUpdate>) -> Self {
        Self { responses, updates }
    }

    pub(crate) fn send_response(&mut self, response: ClientResponse) {
        trace!(target: "matcher", %response, "sending");
        if let Err(dropped) = self.responses.push(response) {
            error!(target: "matcher", response = %dropped, "response ring full, dropping");
        }
    }

    pub(crate) fn send_update(&mut self, update: MarketUpdate) {
        trace!(target: "matcher", %update, "publishing");
        if let Err(dropped) = self.updates.push(update) {
            error!(target: "matcher", update = %dropped, "market update ring full, dropping");
        }
    }
}

/// Owns one [`MeOrderBook`] per ticker and drives them from the requests
/// ring on a dedicated thread.
pub struct MatchingEngine {
    books: Vec<MeOrderBook>,
    requests: Consumer<ClientRequest>,
    output: EngineOutput,
    run: RunFlag,
}

impl MatchingEngine {
    pub fn new(
        requests: Consumer<ClientRequest>,
        responses: Producer<ClientResponse>,
        updates: Producer<MarketUpdate>,
        run: RunFlag,
    ) -> Self {
        Self {
            books: (0..MAX_TICKERS as TickerId).map(MeOrderBook::new).collect(),
            requests,
            output: EngineOutput::new(responses, updates),
            run,
        }
    }

    /// Process one pending request, if any. Returns whether work was done.
    pub fn poll(&mut self) -> bool {
        match self.requests.pop() {
            Some(request) => {
                self.process(request);
                true
            }
            None => false,
        }
    }

    fn process(&mut self, request: ClientRequest) {
        debug!(target: "matcher", %request, "processing");
        let ticker = request.ticker_id as usize;
        assert!(
            ticker < self.books.len(),
            "unknown ticker on request: {request}"
        );
        let book = &mut self.books[ticker];
        match request.kind {
            ClientRequestKind::New => book.add(
                &mut self.output,
                request.client_id,
                request.order_id,
                request.side,
                request.price,
                request.qty,
            ),
            ClientRequestKind::Cancel => {
                book.cancel(&mut self.output, request.client_id, request.order_id)
            }
            ClientRequestKind::Invalid => {
                panic!("invalid request kind on live path: {request}")
            }
        }
    }

    /// Busy-spin main loop; exits at a queue-empty check once the run flag
    /// clears.
    pub fn run(&mut self) {
        debug!(target: "matcher", "matching engine running");
        while self.run.is_running() {
            if !self.poll() {
                std::hint::spin_loop();
            }
        }
        for book in &self.books {
            debug!(target: "matcher", "final book state\n{}", book.render());
        }
        debug!(target: "matcher", "matching engine stopped");
    }

    pub fn book(&self, ticker_id: TickerId) -> &MeOrderBook {
        &self.books[ticker_id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::spsc;

    fn engine_with_queues() -> (
        MatchingEngine,
        Producer<ClientRequest>,
        Consumer<ClientResponse>,
        Consumer<MarketUpdate>,
    ) {
        let (req_tx, req_rx) = spsc(REQUEST_QUEUE_CAPACITY);
        let (resp_tx, resp_rx) = spsc(REQUEST_QUEUE_CAPACITY);
        let (upd_tx, upd_rx) = spsc(UPDATE_QUEUE_CAPACITY);
        let engine = MatchingEngine::new(req_rx, resp_tx, upd_tx, RunFlag::new());
        (engine, req_tx, resp_rx, upd_rx)
    }

    fn new_request(
        client_id: ClientId,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
    ) -> ClientRequest {
        ClientRequest {
            kind: ClientRequestKind::New,
            client_id,
            ticker_id: 0,
            order_id,
            side,
            price,
            qty,
        }
    }

    #[test]
    fn test_poll_reports_idle_and_work() {
        let (mut engine, mut req_tx, mut resp_rx, _upd_rx) = engine_with_queues();
        assert!(!engine.poll());

        req_tx
            .push(new_request(1, 10, Side::Buy, 100, 5))
            .unwrap();
        assert!(engine.poll());
        assert_eq!(
            resp_rx.pop().unwrap().kind,
            ClientResponseKind::Accepted
        );
    }

    #[test]
    fn test_requests_route_to_their_ticker() {
        let (mut engine, mut req_tx, _resp_rx, _upd_rx) = engine_with_queues();
        let mut request = new_request(1, 10, Side::Buy, 100, 5);
        request.ticker_id = 2;
        req_tx.push(request).unwrap();
        engine.poll();

        assert_eq!(engine.book(2).live_order_count(), 1);
        assert_eq!(engine.book(0).live_order_count(), 0);
    }

    #[test]
    #[should_panic(expected = "unknown ticker")]
    fn test_unknown_ticker_is_fatal() {
        let (mut engine, mut req_tx, _resp_rx, _upd_rx) = engine_with_queues();
        let mut request = new_request(1, 10, Side::Buy, 100, 5);
        request.ticker_id = MAX_TICKERS as TickerId;
        req_tx.push(request).unwrap();
        engine.poll();
    }

    #[test]
    #[should_panic(expected = "invalid request kind")]
    fn test_invalid_kind_is_fatal() {
        let (mut engine, mut req_tx, _resp_rx, _upd_rx) = engine_with_queues();
        let mut request = ClientRequest::default();
        request.ticker_id = 0;
        req_tx.push(request).unwrap();
        engine.poll();
    }
}
