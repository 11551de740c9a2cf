//! Market data records published by the exchange
//!
//! One record describes one structural event against one order in one book.
//! The incremental stream frames each record with a gap-free sequence; the
//! snapshot stream reuses the same frame with a per-snapshot sequence that
//! restarts at zero.

use std::fmt;

use crate::ids::{
    order_id_str, price_str, priority_str, qty_str, ticker_id_str, OrderId, Price, Priority, Qty,
    TickerId, ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID, QTY_INVALID, TICKER_ID_INVALID,
};
use crate::side::Side;

/// Kind of market data event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MarketUpdateKind {
    Invalid = 0,
    /// Dismantle the book for the record's ticker.
    Clear = 1,
    Add = 2,
    Modify = 3,
    Cancel = 4,
    Trade = 5,
    /// Snapshot frame opener; `order_id` anchors the last incremental seq.
    SnapshotStart = 6,
    /// Snapshot frame closer; `order_id` anchors the last incremental seq.
    SnapshotEnd = 7,
}

impl MarketUpdateKind {
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::Clear),
            2 => Some(Self::Add),
            3 => Some(Self::Modify),
            4 => Some(Self::Cancel),
            5 => Some(Self::Trade),
            6 => Some(Self::SnapshotStart),
            7 => Some(Self::SnapshotEnd),
            _ => None,
        }
    }
}

impl fmt::Display for MarketUpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "INVALID",
            Self::Clear => "CLEAR",
            Self::Add => "ADD",
            Self::Modify => "MODIFY",
            Self::Cancel => "CANCEL",
            Self::Trade => "TRADE",
            Self::SnapshotStart => "SNAPSHOT_START",
            Self::SnapshotEnd => "SNAPSHOT_END",
        };
        write!(f, "{s}")
    }
}

/// One market data record as generated by the matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketUpdate {
    pub kind: MarketUpdateKind,
    pub order_id: OrderId,
    pub ticker_id: TickerId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
}

impl Default for MarketUpdate {
    fn default() -> Self {
        Self {
            kind: MarketUpdateKind::Invalid,
            order_id: ORDER_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
            priority: PRIORITY_INVALID,
        }
    }
}

impl MarketUpdate {
    /// Snapshot frame marker carrying the incremental-stream anchor.
    pub fn snapshot_marker(kind: MarketUpdateKind, last_inc_seq: u64) -> Self {
        Self {
            kind,
            order_id: last_inc_seq,
            ..Self::default()
        }
    }
}

impl fmt::Display for MarketUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MarketUpdate[{} ticker:{} oid:{} side:{} px:{} qty:{} prio:{}]",
            self.kind,
            ticker_id_str(self.ticker_id),
            order_id_str(self.order_id),
            self.side,
            price_str(self.price),
            qty_str(self.qty),
            priority_str(self.priority),
        )
    }
}

/// A market update framed with its stream sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencedUpdate {
    pub seq: u64,
    pub update: MarketUpdate,
}

impl fmt::Display for SequencedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequencedUpdate[seq:{} {}]", self.seq, self.update)
    }
}
