//! Client-side market order book
//!
//! Same arena-and-index structure as the exchange book, minus client
//! identifiers: orders are keyed by market order id only. The book applies
//! the reassembled update stream, keeps the BBO current for the touched
//! side, and reports each record as either a structural change or a trade
//! for the engine to dispatch.

use runtime::{Pool, NIL};
use types::prelude::*;

/// What one market update meant to this book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookEvent {
    /// Book structure (possibly) changed; BBO is current again.
    BookChanged,
    /// A trade printed; the book itself is untouched, the matching
    /// MODIFY/CANCEL arrives as its own update.
    TradeSeen,
}

struct MarketOrder {
    order_id: OrderId,
    side: Side,
    price: Price,
    qty: Qty,
    priority: Priority,
    prev: u32,
    next: u32,
}

struct MarketLevel {
    side: Side,
    price: Price,
    first_order: u32,
    prev: u32,
    next: u32,
}

pub struct MarketOrderBook {
    ticker_id: TickerId,
    orders: Pool<MarketOrder>,
    levels: Pool<MarketLevel>,
    best_bid: u32,
    best_ask: u32,
    price_to_level: Box<[u32]>,
    oid_to_order: Box<[u32]>,
    bbo: Bbo,
}

fn price_index(price: Price) -> usize {
    price.rem_euclid(MAX_PRICE_LEVELS as i64) as usize
}

impl MarketOrderBook {
    pub fn new(ticker_id: TickerId) -> Self {
        Self {
            ticker_id,
            orders: Pool::new("market-orders", MAX_ORDER_IDS),
            levels: Pool::new("market-levels", MAX_PRICE_LEVELS),
            best_bid: NIL,
            best_ask: NIL,
            price_to_level: vec![NIL; MAX_PRICE_LEVELS].into_boxed_slice(),
            oid_to_order: vec![NIL; MAX_ORDER_IDS].into_boxed_slice(),
            bbo: Bbo::default(),
        }
    }

    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    pub fn bbo(&self) -> &Bbo {
        &self.bbo
    }

    pub fn live_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Apply one update and report what happened.
    pub fn apply(&mut self, update: &MarketUpdate) -> BookEvent {
        // Whether the touched price can move the top of the book; computed
        // up front so removals recompute after the unlink.
        let bid_touched = update.side == Side::Buy
            && (self.best_bid == NIL || update.price >= self.levels.get(self.best_bid).price);
        let ask_touched = update.side == Side::Sell
            && (self.best_ask == NIL || update.price <= self.levels.get(self.best_ask).price);

        match update.kind {
            MarketUpdateKind::Add => {
                let handle = self.orders.alloc(MarketOrder {
                    order_id: update.order_id,
                    side: update.side,
                    price: update.price,
                    qty: update.qty,
                    priority: update.priority,
                    prev: NIL,
                    next: NIL,
                });
                self.insert_order(handle);
                self.update_bbo(bid_touched, ask_touched);
            }
            MarketUpdateKind::Modify => {
                let handle = self.oid_to_order[update.order_id as usize];
                assert!(handle != NIL, "modify for unknown order: {update}");
                self.orders.get_mut(handle).qty = update.qty;
                self.update_bbo(bid_touched, ask_touched);
            }
            MarketUpdateKind::Cancel => {
                let handle = self.oid_to_order[update.order_id as usize];
                assert!(handle != NIL, "cancel for unknown order: {update}");
                self.remove_order(handle);
                self.update_bbo(bid_touched, ask_touched);
            }
            MarketUpdateKind::Trade => return BookEvent::TradeSeen,
            MarketUpdateKind::Clear => {
                self.orders.clear();
                self.levels.clear();
                self.price_to_level.fill(NIL);
                self.oid_to_order.fill(NIL);
                self.best_bid = NIL;
                self.best_ask = NIL;
                self.update_bbo(true, true);
            }
            MarketUpdateKind::SnapshotStart
            | MarketUpdateKind::SnapshotEnd
            | MarketUpdateKind::Invalid => {}
        }
        BookEvent::BookChanged
    }

    /// Recompute the touched sides of the BBO, aggregating every resting
    /// order at the best price.
    fn update_bbo(&mut self, update_bid: bool, update_ask: bool) {
        if update_bid {
            if self.best_bid == NIL {
                self.bbo.bid_price = PRICE_INVALID;
                self.bbo.bid_qty = QTY_INVALID;
            } else {
                let level = self.levels.get(self.best_bid);
                self.bbo.bid_price = level.price;
                self.bbo.bid_qty = self.level_qty(level.first_order);
            }
        }
        if update_ask {
            if self.best_ask == NIL {
                self.bbo.ask_price = PRICE_INVALID;
                self.bbo.ask_qty = QTY_INVALID;
            } else {
                let level = self.levels.get(self.best_ask);
                self.bbo.ask_price = level.price;
                self.bbo.ask_qty = self.level_qty(level.first_order);
            }
        }
    }

    fn level_qty(&self, first_order: u32) -> Qty {
        let mut qty = 0;
        let mut at = first_order;
        loop {
            let order = self.orders.get(at);
            qty += order.qty;
            at = order.next;
            if at == first_order {
                break;
            }
        }
        qty
    }

    fn insert_order(&mut self, handle: u32) {
        let (side, price, order_id) = {
            let order = self.orders.get(handle);
            (order.side, order.price, order.order_id)
        };

        let level = self.price_to_level[price_index(price)];
        if level == NIL {
            let order = self.orders.get_mut(handle);
            order.prev = handle;
            order.next = handle;
            let level_handle = self.levels.alloc(MarketLevel {
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
            self.oid_to_order[order_id as usize] == NIL,
            "order id {order_id} already live"
        );
        self.oid_to_order[order_id as usize] = handle;
    }

    fn remove_order(&mut self, handle: u32) {
        let (price, prev, next, order_id) = {
            let order = self.orders.get(handle);
            (order.price, order.prev, order.next, order.order_id)
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

        self.oid_to_order[order_id as usize] = NIL;
        self.orders.free(handle);
    }

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
            entries.push((order.order_id, order.qty, order.priority));
            at = order.next;
            if at == first {
                break;
            }
        }
        entries
    }
}
