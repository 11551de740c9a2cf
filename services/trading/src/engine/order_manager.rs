//! Order manager: one working order per (ticker, side)
//!
//! Strategies only express target prices; the manager owns the order state
//! machine, allocates client order ids, runs the pre-trade risk check, and
//! emits NEW/CANCEL requests onto the gateway ring.

use std::fmt;

use runtime::Producer;
use tracing::{debug, error};
use types::prelude::*;

use super::position::PositionKeeper;
use super::risk::{RiskCheckResult, RiskManager};

/// Lifecycle of a managed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmOrderState {
    Invalid,
    PendingNew,
    Live,
    PendingCancel,
    Dead,
}

impl fmt::Display for OmOrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "INVALID",
            Self::PendingNew => "PENDING_NEW",
            Self::Live => "LIVE",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::Dead => "DEAD",
        };
        write!(f, "{s}")
    }
}

/// One managed order slot.
#[derive(Debug, Clone, Copy)]
pub struct OmOrder {
    pub ticker_id: TickerId,
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub state: OmOrderState,
}

impl Default for OmOrder {
    fn default() -> Self {
        Self {
            ticker_id: TICKER_ID_INVALID,
            order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
            state: OmOrderState::Invalid,
        }
    }
}

impl fmt::Display for OmOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OMOrder[ticker:{} oid:{} side:{} px:{} qty:{} state:{}]",
            ticker_id_str(self.ticker_id),
            order_id_str(self.order_id),
            self.side,
            price_str(self.price),
            qty_str(self.qty),
            self.state,
        )
    }
}

pub struct OrderManager {
    client_id: ClientId,
    /// One slot per (ticker, side index).
    orders: Vec<[OmOrder; 2]>,
    next_order_id: OrderId,
}

impl OrderManager {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            orders: vec![[OmOrder::default(); 2]; MAX_TICKERS],
            next_order_id: 1,
        }
    }

    pub fn order(&self, ticker_id: TickerId, side: Side) -> &OmOrder {
        &self.orders[ticker_id as usize][side.index()]
    }

    /// Fold an exchange response into the owning slot.
    pub fn on_order_update(&mut self, response: &ClientResponse) {
        debug!(target: "trade_engine", %response, "order update");
        if response.side == Side::Invalid {
            // Cancel rejects carry no side; there is no slot to update.
            return;
        }
        let order = &mut self.orders[response.ticker_id as usize][response.side.index()];
        match response.kind {
            ClientResponseKind::Accepted => order.state = OmOrderState::Live,
            ClientResponseKind::Canceled => order.state = OmOrderState::Dead,
            ClientResponseKind::Filled => {
                order.qty = response.leaves_qty;
                if order.qty == 0 {
                    order.state = OmOrderState::Dead;
                }
            }
            ClientResponseKind::CancelRejected | ClientResponseKind::Invalid => {}
        }
    }

    /// Send a NEW and move the slot to PENDING_NEW.
    fn new_order(
        &mut self,
        requests: &mut Producer<ClientRequest>,
        ticker_id: TickerId,
        price: Price,
        side: Side,
        qty: Qty,
    ) {
        let order_id = self.next_order_id;
        self.next_order_id += 1;
        let request = ClientRequest {
            kind: ClientRequestKind::New,
            client_id: self.client_id,
            ticker_id,
            order_id,
            side,
            price,
            qty,
        };
        if let Err(dropped) = requests.push(request) {
            error!(target: "trade_engine", request = %dropped, "request ring full, dropping");
            return;
        }
        self.orders[ticker_id as usize][side.index()] = OmOrder {
            ticker_id,
            order_id,
            side,
            price,
            qty,
            state: OmOrderState::PendingNew,
        };
        debug!(target: "trade_engine", %request, "sent new order");
    }

    /// Send a CANCEL for the slot and move it to PENDING_CANCEL.
    fn cancel_order(&mut self, requests: &mut Producer<ClientRequest>, ticker_id: TickerId, side: Side) {
        let order = &mut self.orders[ticker_id as usize][side.index()];
        let request = ClientRequest {
            kind: ClientRequestKind::Cancel,
            client_id: self.client_id,
            ticker_id,
            order_id: order.order_id,
            side,
            price: order.price,
            qty: order.qty,
        };
        if let Err(dropped) = requests.push(request) {
            error!(target: "trade_engine", request = %dropped, "request ring full, dropping");
            return;
        }
        order.state = OmOrderState::PendingCancel;
        debug!(target: "trade_engine", %request, "sent cancel");
    }

    /// Converge one side toward `price`: cancel a mispriced live order,
    /// start a risk-checked new order from a dead slot, leave pending
    /// slots alone. `PRICE_INVALID` means this side wants no order.
    pub fn move_order(
        &mut self,
        requests: &mut Producer<ClientRequest>,
        risk: &RiskManager,
        positions: &PositionKeeper,
        ticker_id: TickerId,
        price: Price,
        side: Side,
        qty: Qty,
    ) {
        let state = self.orders[ticker_id as usize][side.index()].state;
        match state {
            OmOrderState::Live => {
                if self.orders[ticker_id as usize][side.index()].price != price {
                    self.cancel_order(requests, ticker_id, side);
                }
            }
            OmOrderState::Invalid | OmOrderState::Dead => {
                if price != PRICE_INVALID {
                    match risk.check_pre_trade(positions, ticker_id, side, qty) {
                        RiskCheckResult::Allowed => {
                            self.new_order(requests, ticker_id, price, side, qty)
                        }
                        blocked => {
                            debug!(
                                target: "trade_engine",
                                ticker_id, %side, qty, result = %blocked,
                                "risk check failed"
                            );
                        }
                    }
                }
            }
            OmOrderState::PendingNew | OmOrderState::PendingCancel => {}
        }
    }

    /// Converge both sides of one ticker.
    #[allow(clippy::too_many_arguments)]
    pub fn move_orders(
        &mut self,
        requests: &mut Producer<ClientRequest>,
        risk: &RiskManager,
        positions: &PositionKeeper,
        ticker_id: TickerId,
        bid_price: Price,
        ask_price: Price,
        clip: Qty,
    ) {
        self.move_order(requests, risk, positions, ticker_id, bid_price, Side::Buy, clip);
        self.move_order(requests, risk, positions, ticker_id, ask_price, Side::Sell, clip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::{spsc, Consumer};
    use rust_decimal::Decimal;

    fn setup(max_order_size: Qty) -> (
        OrderManager,
        RiskManager,
        PositionKeeper,
        Producer<ClientRequest>,
        Consumer<ClientRequest>,
    ) {
        let mut cfg = TickerCfgMap::default();
        cfg[0].risk = RiskCfg {
            max_order_size,
            max_position: 1_000,
            max_loss: Decimal::from(-1_000),
        };
        let (req_tx, req_rx) = spsc(REQUEST_QUEUE_CAPACITY);
        (
            OrderManager::new(7),
            RiskManager::new(cfg),
            PositionKeeper::new(),
            req_tx,
            req_rx,
        )
    }

    fn accepted(order_id: OrderId, side: Side, price: Price, leaves: Qty) -> ClientResponse {
        ClientResponse {
            kind: ClientResponseKind::Accepted,
            client_id: 7,
            ticker_id: 0,
            client_order_id: order_id,
            market_order_id: order_id,
            side,
            price,
            exec_qty: 0,
            leaves_qty: leaves,
        }
    }

    #[test]
    fn test_dead_slot_sends_new_order() {
        let (mut om, risk, positions, mut tx, mut rx) = setup(100);
        om.move_order(&mut tx, &risk, &positions, 0, 100, Side::Buy, 10);

        let request = rx.pop().unwrap();
        assert_eq!(request.kind, ClientRequestKind::New);
        assert_eq!(request.client_id, 7);
        assert_eq!(request.order_id, 1);
        assert_eq!(request.price, 100);
        assert_eq!(om.order(0, Side::Buy).state, OmOrderState::PendingNew);
    }

    #[test]
    fn test_pending_slot_is_a_noop() {
        let (mut om, risk, positions, mut tx, mut rx) = setup(100);
        om.move_order(&mut tx, &risk, &positions, 0, 100, Side::Buy, 10);
        rx.pop().unwrap();

        om.move_order(&mut tx, &risk, &positions, 0, 105, Side::Buy, 10);
        assert!(rx.pop().is_none(), "pending order must not be touched");
    }

    #[test]
    fn test_live_order_cancels_on_price_change() {
        let (mut om, risk, positions, mut tx, mut rx) = setup(100);
        om.move_order(&mut tx, &risk, &positions, 0, 100, Side::Buy, 10);
        rx.pop().unwrap();
        om.on_order_update(&accepted(1, Side::Buy, 100, 10));
        assert_eq!(om.order(0, Side::Buy).state, OmOrderState::Live);

        // Same price: nothing to do.
        om.move_order(&mut tx, &risk, &positions, 0, 100, Side::Buy, 10);
        assert!(rx.pop().is_none());

        // New target price: cancel first.
        om.move_order(&mut tx, &risk, &positions, 0, 101, Side::Buy, 10);
        let request = rx.pop().unwrap();
        assert_eq!(request.kind, ClientRequestKind::Cancel);
        assert_eq!(request.order_id, 1);
        assert_eq!(om.order(0, Side::Buy).state, OmOrderState::PendingCancel);
    }

    #[test]
    fn test_response_state_transitions() {
        let (mut om, risk, positions, mut tx, mut rx) = setup(100);
        om.move_order(&mut tx, &risk, &positions, 0, 100, Side::Buy, 10);
        rx.pop().unwrap();

        om.on_order_update(&accepted(1, Side::Buy, 100, 10));
        assert_eq!(om.order(0, Side::Buy).state, OmOrderState::Live);

        // Partial fill updates leaves, stays live.
        let mut partial = accepted(1, Side::Buy, 100, 6);
        partial.kind = ClientResponseKind::Filled;
        partial.exec_qty = 4;
        om.on_order_update(&partial);
        assert_eq!(om.order(0, Side::Buy).state, OmOrderState::Live);
        assert_eq!(om.order(0, Side::Buy).qty, 6);

        // Terminal fill goes dead.
        let mut full = accepted(1, Side::Buy, 100, 0);
        full.kind = ClientResponseKind::Filled;
        full.exec_qty = 6;
        om.on_order_update(&full);
        assert_eq!(om.order(0, Side::Buy).state, OmOrderState::Dead);
    }

    #[test]
    fn test_canceled_goes_dead_and_cancel_reject_is_ignored() {
        let (mut om, risk, positions, mut tx, mut rx) = setup(100);
        om.move_order(&mut tx, &risk, &positions, 0, 100, Side::Sell, 10);
        rx.pop().unwrap();
        om.on_order_update(&accepted(1, Side::Sell, 100, 10));

        let mut reject = ClientResponse::default();
        reject.kind = ClientResponseKind::CancelRejected;
        reject.ticker_id = 0;
        om.on_order_update(&reject);
        assert_eq!(om.order(0, Side::Sell).state, OmOrderState::Live);

        let mut canceled = accepted(1, Side::Sell, 100, 10);
        canceled.kind = ClientResponseKind::Canceled;
        om.on_order_update(&canceled);
        assert_eq!(om.order(0, Side::Sell).state, OmOrderState::Dead);
    }

    #[test]
    fn test_risk_block_keeps_slot_dead() {
        let (mut om, risk, positions, mut tx, mut rx) = setup(10);
        om.move_order(&mut tx, &risk, &positions, 0, 100, Side::Buy, 11);
        assert!(rx.pop().is_none(), "blocked order must not reach the ring");
        assert_eq!(om.order(0, Side::Buy).state, OmOrderState::Invalid);
    }

    #[test]
    fn test_invalid_target_price_sends_nothing() {
        let (mut om, risk, positions, mut tx, mut rx) = setup(100);
        om.move_order(&mut tx, &risk, &positions, 0, PRICE_INVALID, Side::Buy, 10);
        assert!(rx.pop().is_none());
    }
}
