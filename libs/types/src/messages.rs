//! Order-entry records exchanged between trading clients and the exchange
//!
//! Both records are plain-old-data: they are copied into lock-free queues
//! and packed field-by-field onto the wire without padding.

use std::fmt;

use crate::ids::{
    client_id_str, order_id_str, price_str, qty_str, ticker_id_str, ClientId, OrderId, Price, Qty,
    TickerId, CLIENT_ID_INVALID, ORDER_ID_INVALID, PRICE_INVALID, QTY_INVALID, TICKER_ID_INVALID,
};
use crate::side::Side;

/// Action requested by a trading client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientRequestKind {
    Invalid = 0,
    New = 1,
    Cancel = 2,
}

impl ClientRequestKind {
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::New),
            2 => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for ClientRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "INVALID",
            Self::New => "NEW",
            Self::Cancel => "CANCEL",
        };
        write!(f, "{s}")
    }
}

/// Terminal outcome reported by the exchange for a request or a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientResponseKind {
    Invalid = 0,
    Accepted = 1,
    Canceled = 2,
    Filled = 3,
    CancelRejected = 4,
}

impl ClientResponseKind {
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::Accepted),
            2 => Some(Self::Canceled),
            3 => Some(Self::Filled),
            4 => Some(Self::CancelRejected),
            _ => None,
        }
    }
}

impl fmt::Display for ClientResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "INVALID",
            Self::Accepted => "ACCEPTED",
            Self::Canceled => "CANCELED",
            Self::Filled => "FILLED",
            Self::CancelRejected => "CANCEL_REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Inbound order-entry record: a NEW or CANCEL for one (client, order id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRequest {
    pub kind: ClientRequestKind,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
}

impl Default for ClientRequest {
    fn default() -> Self {
        Self {
            kind: ClientRequestKind::Invalid,
            client_id: CLIENT_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
        }
    }
}

impl fmt::Display for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClientRequest[{} cid:{} ticker:{} oid:{} side:{} px:{} qty:{}]",
            self.kind,
            client_id_str(self.client_id),
            ticker_id_str(self.ticker_id),
            order_id_str(self.order_id),
            self.side,
            price_str(self.price),
            qty_str(self.qty),
        )
    }
}

/// Outbound order-entry record.
///
/// Carries both the client's own order id and the exchange-assigned market
/// order id so fills can be tied back to market data. `exec_qty` is the
/// quantity executed by this event; `leaves_qty` is what remains live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientResponse {
    pub kind: ClientResponseKind,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    pub client_order_id: OrderId,
    pub market_order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub exec_qty: Qty,
    pub leaves_qty: Qty,
}

impl Default for ClientResponse {
    fn default() -> Self {
        Self {
            kind: ClientResponseKind::Invalid,
            client_id: CLIENT_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            client_order_id: ORDER_ID_INVALID,
            market_order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            exec_qty: QTY_INVALID,
            leaves_qty: QTY_INVALID,
        }
    }
}

impl fmt::Display for ClientResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClientResponse[{} cid:{} ticker:{} coid:{} moid:{} side:{} px:{} exec:{} leaves:{}]",
            self.kind,
            client_id_str(self.client_id),
            ticker_id_str(self.ticker_id),
            order_id_str(self.client_order_id),
            order_id_str(self.market_order_id),
            self.side,
            price_str(self.price),
            qty_str(self.exec_qty),
            qty_str(self.leaves_qty),
        )
    }
}

/// A request framed for the order-entry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencedRequest {
    pub seq: u64,
    pub request: ClientRequest,
}

/// A response framed for the order-entry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencedResponse {
    pub seq: u64,
    pub response: ClientResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind_wire_round_trip() {
        for kind in [
            ClientRequestKind::Invalid,
            ClientRequestKind::New,
            ClientRequestKind::Cancel,
        ] {
            assert_eq!(ClientRequestKind::from_wire(kind.to_wire()), Some(kind));
        }
        assert_eq!(ClientRequestKind::from_wire(200), None);
    }

    #[test]
    fn test_response_kind_wire_round_trip() {
        for kind in [
            ClientResponseKind::Invalid,
            ClientResponseKind::Accepted,
            ClientResponseKind::Canceled,
            ClientResponseKind::Filled,
            ClientResponseKind::CancelRejected,
        ] {
            assert_eq!(ClientResponseKind::from_wire(kind.to_wire()), Some(kind));
        }
        assert_eq!(ClientResponseKind::from_wire(99), None);
    }

    #[test]
    fn test_default_request_is_all_sentinels() {
        let request = ClientRequest::default();
        assert_eq!(request.kind, ClientRequestKind::Invalid);
        assert_eq!(request.client_id, CLIENT_ID_INVALID);
        assert_eq!(request.order_id, ORDER_ID_INVALID);
        assert_eq!(request.price, PRICE_INVALID);
    }

    #[test]
    fn test_display_formats() {
        let request = ClientRequest {
            kind: ClientRequestKind::New,
            client_id: 1,
            ticker_id: 0,
            order_id: 10,
            side: Side::Buy,
            price: 100,
            qty: 5,
        };
        let rendered = request.to_string();
        assert!(rendered.contains("NEW"));
        assert!(rendered.contains("px:100"));
        assert!(rendered.contains("qty:5"));

        let response = ClientResponse::default();
        assert!(response.to_string().contains("INVALID"));
    }
}
