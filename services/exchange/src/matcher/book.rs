//! Limit order book with price-time priority matching
//!
//! Orders and price levels live in preallocated pools and link to each
//! other through `u32` handles: each level keeps a circular FIFO of its
//! orders, and the levels of one side form a circular ring ordered
//! best-to-worst (bids descending, asks ascending). Lookup paths are flat
//! arrays: market order id, (client, client order id), and price each map
//! to a handle in O(1).
//!
//! The book is single-threaded; the matching engine is its only caller.

use runtime::{Pool, NIL};
use tracing::debug;
use types::prelude::*;

use super::EngineOutput;

/// A resting order.
struct BookOrder {
    client_id: ClientId,
    client_order_id: OrderId,
    market_order_id: OrderId,
    side: Side,
    price: Price,
    qty: Qty,
    priority: Priority,
    /// Circular FIFO links within the price level.
    prev: u32,
    next: u32,
}

/// One price level: FIFO head plus the best-to-worst ring links.
struct BookLevel {
    side: Side,
    price: Price,
    first_order: u32,
    prev: u32,
    next: u32,
}

/// Exchange-side limit order book for a single ticker.
pub struct MeOrderBook {
    ticker_id: TickerId,
    orders: Pool<BookOrder>,
    levels: Pool<BookLevel>,
    best_bid: u32,
    best_ask: u32,
    /// Direct-mapped price index, `price mod MAX_PRICE_LEVELS`.
    price_to_level: Box<[u32]>,
    /// Market order id to order handle.
    oid_to_order: Box<[u32]>,
    /// (client, client order id) to order handle.
    client_orders: Vec<Box<[u32]>>,
    next_market_order_id: OrderId,
}

fn price_index(price: Price) -> usize {
    price.rem_euclid(MAX_PRICE_LEVELS as i64) as usize
}

impl MeOrderBook {
    pub fn new(ticker_id: TickerId) -> Self {
        Self {
            ticker_id,
            orders: Pool::new("orders", MAX_ORDER_IDS),
            levels: Pool::new("price-levels", MAX_PRICE_LEVELS),
            best_bid: NIL,
            best_ask: NIL,
            price_to_level: vec![NIL; MAX_PRICE_LEVELS].into_boxed_slice(),
            oid_to_order: vec![NIL; MAX_ORDER_IDS].into_boxed_slice(),
            client_orders: (0..MAX_CLIENTS)
                .map(|_| vec![NIL; MAX_ORDER_IDS].into_boxed_slice())
                .collect(),
            next_market_order_id: 1,
        }
    }

    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    /// Handle a NEW request: acknowledge, match against the opposite side,
    /// and rest any remainder.
    pub fn add(
        &mut self,
        out: &mut EngineOutput,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
    ) {
        assert!(
            (client_id as usize) < MAX_CLIENTS && (client_order_id as usize) < MAX_ORDER_IDS,
            "client identifiers out of provisioned range: cid:{client_id} coid:{client_order_id}"
        );

        let market_order_id = self.next_market_order_id;
        self.next_market_order_id += 1;

        out.send_response(ClientResponse {
            kind: ClientResponseKind::Accepted,
            client_id,
            ticker_id: self.ticker_id,
            client_order_id,
            market_order_id,
            side,
            price,
            exec_qty: 0,
            leaves_qty: qty,
        });

        let leaves_qty = self.match_against_book(
            out,
            client_id,
            client_order_id,
            market_order_id,
            side,
            price,
            qty,
        );

        if leaves_qty > 0 {
            let priority = self.next_priority(price);
            let handle = self.orders.alloc(BookOrder {
                client_id,
                client_order_id,
                market_order_id,
                side,
                price,
                qty: leaves_qty,
                priority,
                prev: NIL,
                next: NIL,
            });
            self.insert_order(handle);

            out.send_update(MarketUpdate {
                kind: MarketUpdateKind::Add,
                order_id: market_order_id,
                ticker_id: self.ticker_id,
                side,
                price,
                qty: leaves_qty,
                priority,
            });
        }
    }

    /// Handle a CANCEL request. Unknown orders are rejected without
    /// touching the book or the market data stream.
    pub fn cancel(&mut self, out: &mut EngineOutput, client_id: ClientId, order_id: OrderId) {
        let handle = if (client_id as usize) < MAX_CLIENTS && (order_id as usize) < MAX_ORDER_IDS {
            self.client_orders[client_id as usize][order_id as usize]
        } else {
            NIL
        };

        if handle == NIL {
            debug!(target: "matcher", client_id, order_id, "cancel rejected, no such order");
            out.send_response(ClientResponse {
                kind: ClientResponseKind::CancelRejected,
                client_id,
                ticker_id: self.ticker_id,
                client_order_id: order_id,
                ..ClientResponse::default()
            });
            return;
        }

        let (market_order_id, side, price, qty, priority) = {
            let order = self.orders.get(handle);
            (
                order.market_order_id,
                order.side,
                order.price,
                order.qty,
                order.priority,
            )
        };

        out.send_update(MarketUpdate {
            kind: MarketUpdateKind::Cancel,
            order_id: market_order_id,
            ticker_id: self.ticker_id,
            side,
            price,
            qty: 0,
            priority,
        });
        self.remove_order(handle);

        out.send_response(ClientResponse {
            kind: ClientResponseKind::Canceled,
            client_id,
            ticker_id: self.ticker_id,
            client_order_id: order_id,
            market_order_id,
            side,
            price,
            exec_qty: QTY_INVALID,
            leaves_qty: qty,
        });
    }

    /// Sweep the opposite side while prices cross, filling FIFO at each
    /// level. Returns the aggressor's unmatched remainder.
    #[allow(clippy::too_many_arguments)]
    fn match_against_book(
        &mut self,
        out: &mut EngineOutput,
        client_id: ClientId,
        client_order_id: OrderId,
        market_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
    ) -> Qty {
        let mut leaves_qty = qty;
        while leaves_qty > 0 {
            let best_other = match side {
                Side::Buy => self.best_ask,
                Side::Sell => self.best_bid,
                Side::Invalid => break,
            };
            if best_other == NIL {
                break;
            }
            let level_price = self.levels.get(best_other).price;
            let crosses = match side {
                Side::Buy => price >= level_price,
                Side::Sell => price <= level_price,
                Side::Invalid => false,
            };
            if !crosses {
                break;
            }
            let passive = self.levels.get(best_other).first_order;
            self.execute_match(
                out,
                client_id,
                client_order_id,
                market_order_id,
                side,
                passive,
                &mut leaves_qty,
            );
        }
        leaves_qty
    }

    /// Fill the aggressor against one passive order. The passive price
    /// wins; both parties get a FILLED response and the stream gets a
    /// TRADE followed by the passive order's CANCEL or MODIFY.
    #[allow(clippy::too_many_arguments)]
    fn execute_match(
        &mut self,
        out: &mut EngineOutput,
        client_id: ClientId,
        client_order_id: OrderId,
        market_order_id: OrderId,
        side: Side,
        passive: u32,
        leaves_qty: &mut Qty,
    ) {
        let (p_client, p_coid, p_moid, p_side, p_price, p_priority, p_qty_before) = {
            let order = self.orders.get(passive);
            (
                order.client_id,
                order.client_order_id,
                order.market_order_id,
                order.side,
                order.price,
                order.priority,
                order.qty,
            )
        };

        let fill_qty = (*leaves_qty).min(p_qty_before);
        *leaves_qty -= fill_qty;
        let p_qty_after = p_qty_before - fill_qty;
        self.orders.get_mut(passive).qty = p_qty_after;

        out.send_response(ClientResponse {
            kind: ClientResponseKind::Filled,
            client_id,
            ticker_id: self.ticker_id,
            client_order_id,
            market_order_id,
            side,
            price: p_price,
            exec_qty: fill_qty,
            leaves_qty: *leaves_qty,
        });
        out.send_response(ClientResponse {
            kind: ClientResponseKind::Filled,
            client_id: p_client,
            ticker_id: self.ticker_id,
            client_order_id: p_coid,
            market_order_id: p_moid,
            side: p_side,
            price: p_price,
            exec_qty: fill_qty,
            leaves_qty: p_qty_after,
        });
        out.send_update(MarketUpdate {
            kind: MarketUpdateKind::Trade,
            order_id: ORDER_ID_INVALID,
            ticker_id: self.ticker_id,
            side,
            price: p_price,
            qty: fill_qty,
            priority: PRIORITY_INVALID,
        });

        if p_qty_after == 0 {
            out.send_update(MarketUpdate {
                kind: MarketUpdateKind::Cancel,
                order_id: p_moid,
                ticker_id: self.ticker_id,
                side: p_side,
                price: p_price,
                qty: p_qty_before,
                priority: PRIORITY_INVALID,
            });
            self.remove_order(passive);
        } else {
            out.send_update(MarketUpdate {
                kind: MarketUpdateKind::Modify,
                order_id: p_moid,
                ticker_id: self.ticker_id,
                side: p_side,
                price: p_price,
                qty: p_qty_after,
                priority: p_priority,
            });
        }
    }

    /// Next arrival rank at `price`: one past the current FIFO tail.
    fn next_priority(&self, price: Price) -> Priority {
        let level = self.price_to_level[price_index(price)];
        if level == NIL {
            1
        } else {
            let first = self.levels.get(level).first_order;
            let tail = self.orders.get(first).prev;
            self.orders.get(tail).priority + 1
        }
    }

    /// Link an order at the FIFO tail of its level, creating the level if
    /// this is the first order at that price.
    fn insert_order(&mut self, handle: u32) {
        let (side, price, market_order_id, client_id, client_order_id) = {
            let order = self.orders.get(handle);
            (
                order.side,
                order.price,
                order.market_order_id,
                order.client_id,
                order.client_order_id,
            )
        };

        let level = self.price_to_level[price_index(price)];
        if level == NIL {
            let order = self.orders.get_mut(handle);
            order.prev = handle;
            order.next = handle;
            let level_handle = self.levels.alloc(BookLevel {
                side,
                price,
                first_order: handle,
                prev: NIL,
                next: NIL,
            });
            self.insert_level(level_handle);
        } else {
            let first = self.levels.get(level).first_order;
            let tail = self.orders.get(first).prev;
            self.orders.get_mut(tail).next = handle;
            {
                let order = self.orders.get_mut(handle);
                order.prev = tail;
                order.next = first;
            }
            self.orders.get_mut(first).prev = handle;
        }

        assert!(
            self.oid_to_order[market_order_id as usize] == NIL,
            "market order id {market_order_id} already live"
        );
        self.oid_to_order[market_order_id as usize] = handle;
        self.client_orders[client_id as usize][client_order_id as usize] = handle;
    }

    /// Unlink an order from its level FIFO, dropping the level when it
    /// empties, and release the handle.
    fn remove_order(&mut self, handle: u32) {
        let (price, prev, next, market_order_id, client_id, client_order_id) = {
            let order = self.orders.get(handle);
            (
                order.price,
                order.prev,
                order.next,
                order.market_order_id,
                order.client_id,
                order.client_order_id,
            )
        };
        let level = self.price_to_level[price_index(price)];

        if next == handle {
            self.remove_level(level);
        } else {
            self.orders.get_mut(prev).next = next;
            self.orders.get_mut(next).prev = prev;
            if self.levels.get(level).first_order == handle {
                self.levels.get_mut(level).first_order = next;
            }
        }

        self.oid_to_order[market_order_id as usize] = NIL;
        self.client_orders[client_id as usize][client_order_id as usize] = NIL;
        self.orders.free(handle);
    }

    /// Splice a new level into its side's ring, walking from the best
    /// entry toward worse prices until the slot is found.
    fn insert_level(&mut self, handle: u32) {
        let (side, price) = {
            let level = self.levels.get(handle);
            (level.side, level.price)
        };
        self.price_to_level[price_index(price)] = handle;

        let best = match side {
            Side::Buy => self.best_bid,
            _ => self.best_ask,
        };
        if best == NIL {
            let level = self.levels.get_mut(handle);
            level.prev = handle;
            level.next = handle;
            match side {
                Side::Buy => self.best_bid = handle,
                _ => self.best_ask = handle,
            }
            return;
        }

        let mut target = best;
        loop {
            let target_price = self.levels.get(target).price;
            let new_is_better = match side {
                Side::Buy => price > target_price,
                _ => price < target_price,
            };
            if new_is_better {
                self.link_level_before(handle, target);
                if target == best {
                    match side {
                        Side::Buy => self.best_bid = handle,
                        _ => self.best_ask = handle,
                    }
                }
                return;
            }
            target = self.levels.get(target).next;
            if target == best {
                // Worse than every existing level: tail of the ring.
                self.link_level_before(handle, best);
                return;
            }
        }
    }

    fn link_level_before(&mut self, handle: u32, target: u32) {
        let prev = self.levels.get(target).prev;
        {
            let level = self.levels.get_mut(handle);
            level.prev = prev;
            level.next = target;
        }
        self.levels.get_mut(prev).next = handle;
        self.levels.get_mut(target).prev = handle;
    }

    /// Drop an empty level from its ring, advancing the side head if it
    /// was the best.
    fn remove_level(&mut self, handle: u32) {
        let (side, price, prev, next) = {
            let level = self.levels.get(handle);
            (level.side, level.price, level.prev, level.next)
        };
        let best = match side {
            Side::Buy => self.best_bid,
            _ => self.best_ask,
        };

        if next == handle {
            match side {
                Side::Buy => self.best_bid = NIL,
                _ => self.best_ask = NIL,
            }
        } else {
            self.levels.get_mut(prev).next = next;
            self.levels.get_mut(next).prev = prev;
            if handle == best {
                match side {
                    Side::Buy => self.best_bid = next,
                    _ => self.best_ask = next,
                }
            }
        }

        self.price_to_level[price_index(price)] = NIL;
        self.levels.free(handle);
    }

    pub fn best_bid_price(&self) -> Price {
        if self.best_bid == NIL {
            PRICE_INVALID
        } else {
            self.levels.get(self.best_bid).price
        }
    }

    pub fn best_ask_price(&self) -> Price {
        if self.best_ask == NIL {
            PRICE_INVALID
        } else {
            self.levels.get(self.best_ask).price
        }
    }

    pub fn live_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Prices of one side, best first.
    pub fn level_prices(&self, side: Side) -> Vec<Price> {
        let best = match side {
            Side::Buy => self.best_bid,
            _ => self.best_ask,
        };
        let mut prices = Vec::new();
        if best == NIL {
            return prices;
        }
        let mut at = best;
        loop {
            prices.push(self.levels.get(at).price);
            at = self.levels.get(at).next;
            if at == best {
                break;
            }
        }
        prices
    }

    /// (market order id, qty, priority) FIFO at `price`, head first.
    pub fn orders_at(&self, price: Price) -> Vec<(OrderId, Qty, Priority)> {
        let level = self.price_to_level[price_index(price)];
        let mut entries = Vec::new();
        if level == NIL {
            return entries;
        }
        let first = self.levels.get(level).first_order;
        let mut at = first;
        loop {
            let order = self.orders.get(at);
            entries.push((order.market_order_id, order.qty, order.priority));
            at = order.next;
            if at == first {
                break;
            }
        }
        entries
    }

    /// Walk both sides asserting every structural invariant: strict price
    /// monotonicity, an uncrossed top of book, strictly increasing FIFO
    /// priorities, live quantities, and lookup consistency.
    pub fn assert_consistent(&self) {
        let bid_prices = self.level_prices(Side::Buy);
        for pair in bid_prices.windows(2) {
            assert!(
                pair[0] > pair[1],
                "bids not strictly descending: {} then {}",
                pair[0],
                pair[1]
            );
        }
        let ask_prices = self.level_prices(Side::Sell);
        for pair in ask_prices.windows(2) {
            assert!(
                pair[0] < pair[1],
                "asks not strictly ascending: {} then {}",
                pair[0],
                pair[1]
            );
        }
        if let (Some(&bid), Some(&ask)) = (bid_prices.first(), ask_prices.first()) {
            assert!(bid < ask, "book crossed: bid {bid} >= ask {ask}");
        }

        let mut seen = 0usize;
        for &price in bid_prices.iter().chain(ask_prices.iter()) {
            let entries = self.orders_at(price);
            assert!(!entries.is_empty(), "empty level at {price}");
            for pair in entries.windows(2) {
                assert!(
                    pair[0].2 < pair[1].2,
                    "FIFO priorities not increasing at {price}"
                );
            }
            for &(market_order_id, qty, _) in &entries {
                assert!(qty > 0, "zero-qty live order {market_order_id}");
                assert!(
                    self.oid_to_order[market_order_id as usize] != NIL,
                    "order {market_order_id} unreachable by id"
                );
            }
            seen += entries.len();
        }
        assert_eq!(seen, self.orders.len(), "order count mismatch");
    }

    /// Render both sides for logging, asking best-first above the bids.
    pub fn render(&self) -> String {
        use std::fmt::Write;
        let mut text = String::new();
        writeln!(text, "Ticker:{}", ticker_id_str(self.ticker_id)).unwrap();
        for (depth, price) in self.level_prices(Side::Sell).iter().enumerate() {
            let entries = self.orders_at(*price);
            let qty: Qty = entries.iter().map(|e| e.1).sum();
            writeln!(
                text,
                "ASKS L:{depth} => {price} @ {qty} ({} orders)",
                entries.len()
            )
            .unwrap();
        }
        writeln!(text, "      X").unwrap();
        for (depth, price) in self.level_prices(Side::Buy).iter().enumerate() {
            let entries = self.orders_at(*price);
            let qty: Qty = entries.iter().map(|e| e.1).sum();
            writeln!(
                text,
                "BIDS L:{depth} => {price} @ {qty} ({} orders)",
                entries.len()
            )
            .unwrap();
        }
        text
    }
}
