//! Fixed-size little-endian codec for the order-entry and market-data wires
//!
//! Records are tightly packed with no padding; integers are little-endian.
//! Each frame starts with the `u64` stream sequence number, followed by the
//! record fields in declaration order. Ticker and client ids widen to `u64`
//! on the wire.
//!
//! Layouts:
//! - request frame:  `seq u64 | kind u8 | client u64 | ticker u64 | oid u64 |
//!   side u8 | price i64 | qty u64` (50 bytes)
//! - response frame: `seq u64 | kind u8 | client u64 | ticker u64 | coid u64 |
//!   moid u64 | side u8 | price i64 | exec u64 | leaves u64` (66 bytes)
//! - update frame:   `seq u64 | kind u8 | oid u64 | ticker u64 | side u8 |
//!   price i64 | qty u64 | priority u64` (50 bytes)

use crate::errors::WireError;
use crate::ids::{ClientId, TickerId};
use crate::market_update::{MarketUpdate, MarketUpdateKind, SequencedUpdate};
use crate::messages::{
    ClientRequest, ClientRequestKind, ClientResponse, ClientResponseKind, SequencedRequest,
    SequencedResponse,
};
use crate::side::Side;

pub const REQUEST_FRAME_LEN: usize = 8 + 1 + 8 + 8 + 8 + 1 + 8 + 8;
pub const RESPONSE_FRAME_LEN: usize = 8 + 1 + 8 + 8 + 8 + 8 + 1 + 8 + 8 + 8;
pub const UPDATE_FRAME_LEN: usize = 8 + 1 + 8 + 8 + 1 + 8 + 8 + 8;

struct Writer<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, at: 0 }
    }

    fn put_u8(&mut self, value: u8) {
        self.buf[self.at] = value;
        self.at += 1;
    }

    fn put_u64(&mut self, value: u64) {
        self.buf[self.at..self.at + 8].copy_from_slice(&value.to_le_bytes());
        self.at += 8;
    }

    fn put_i64(&mut self, value: i64) {
        self.buf[self.at..self.at + 8].copy_from_slice(&value.to_le_bytes());
        self.at += 8;
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, at: 0 }
    }

    fn take_u8(&mut self) -> u8 {
        let value = self.buf[self.at];
        self.at += 1;
        value
    }

    fn take_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buf[self.at..self.at + 8]);
        self.at += 8;
        u64::from_le_bytes(bytes)
    }

    fn take_i64(&mut self) -> i64 {
        self.take_u64() as i64
    }
}

fn check_len(buf: &[u8], needed: usize) -> Result<(), WireError> {
    if buf.len() < needed {
        Err(WireError::Truncated {
            needed,
            got: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Encode a sequenced request into exactly [`REQUEST_FRAME_LEN`] bytes.
pub fn encode_request(frame: &SequencedRequest) -> [u8; REQUEST_FRAME_LEN] {
    let mut buf = [0u8; REQUEST_FRAME_LEN];
    let mut w = Writer::new(&mut buf);
    w.put_u64(frame.seq);
    w.put_u8(frame.request.kind.to_wire());
    w.put_u64(frame.request.client_id as u64);
    w.put_u64(frame.request.ticker_id as u64);
    w.put_u64(frame.request.order_id);
    w.put_u8(frame.request.side.to_wire());
    w.put_i64(frame.request.price);
    w.put_u64(frame.request.qty);
    buf
}

/// Decode a sequenced request from the front of `buf`.
pub fn decode_request(buf: &[u8]) -> Result<SequencedRequest, WireError> {
    check_len(buf, REQUEST_FRAME_LEN)?;
    let mut r = Reader::new(buf);
    let seq = r.take_u64();
    let kind_byte = r.take_u8();
    let kind =
        ClientRequestKind::from_wire(kind_byte).ok_or(WireError::UnknownRequestKind(kind_byte))?;
    let client_id = r.take_u64() as ClientId;
    let ticker_id = r.take_u64() as TickerId;
    let order_id = r.take_u64();
    let side_byte = r.take_u8();
    let side = Side::from_wire(side_byte).ok_or(WireError::UnknownSide(side_byte))?;
    let price = r.take_i64();
    let qty = r.take_u64();
    Ok(SequencedRequest {
        seq,
        request: ClientRequest {
            kind,
            client_id,
            ticker_id,
            order_id,
            side,
            price,
            qty,
        },
    })
}

/// Encode a sequenced response into exactly [`RESPONSE_FRAME_LEN`] bytes.
pub fn encode_response(frame: &SequencedResponse) -> [u8; RESPONSE_FRAME_LEN] {
    let mut buf = [0u8; RESPONSE_FRAME_LEN];
    let mut w = Writer::new(&mut buf);
    w.put_u64(frame.seq);
    w.put_u8(frame.response.kind.to_wire());
    w.put_u64(frame.response.client_id as u64);
    w.put_u64(frame.response.ticker_id as u64);
    w.put_u64(frame.response.client_order_id);
    w.put_u64(frame.response.market_order_id);
    w.put_u8(frame.response.side.to_wire());
    w.put_i64(frame.response.price);
    w.put_u64(frame.response.exec_qty);
    w.put_u64(frame.response.leaves_qty);
    buf
}

/// Decode a sequenced response from the front of `buf`.
pub fn decode_response(buf: &[u8]) -> Result<SequencedResponse, WireError> {
    check_len(buf, RESPONSE_FRAME_LEN)?;
    let mut r = Reader::new(buf);
    let seq = r.take_u64();
    let kind_byte = r.take_u8();
    let kind = ClientResponseKind::from_wire(kind_byte)
        .ok_or(WireError::UnknownResponseKind(kind_byte))?;
    let client_id = r.take_u64() as ClientId;
    let ticker_id = r.take_u64() as TickerId;
    let client_order_id = r.take_u64();
    let market_order_id = r.take_u64();
    let side_byte = r.take_u8();
    let side = Side::from_wire(side_byte).ok_or(WireError::UnknownSide(side_byte))?;
    let price = r.take_i64();
    let exec_qty = r.take_u64();
    let leaves_qty = r.take_u64();
    Ok(SequencedResponse {
        seq,
        response: ClientResponse {
            kind,
            client_id,
            ticker_id,
            client_order_id,
            market_order_id,
            side,
            price,
            exec_qty,
            leaves_qty,
        },
    })
}

/// Encode a sequenced market update into exactly [`UPDATE_FRAME_LEN`] bytes.
pub fn encode_update(frame: &SequencedUpdate) -> [u8; UPDATE_FRAME_LEN] {
    let mut buf = [0u8; UPDATE_FRAME_LEN];
    let mut w = Writer::new(&mut buf);
    w.put_u64(frame.seq);
    w.put_u8(frame.update.kind.to_wire());
    w.put_u64(frame.update.order_id);
    w.put_u64(frame.update.ticker_id as u64);
    w.put_u8(frame.update.side.to_wire());
    w.put_i64(frame.update.price);
    w.put_u64(frame.update.qty);
    w.put_u64(frame.update.priority);
    buf
}

/// Decode a sequenced market update from the front of `buf`.
pub fn decode_update(buf: &[u8]) -> Result<SequencedUpdate, WireError> {
    check_len(buf, UPDATE_FRAME_LEN)?;
    let mut r = Reader::new(buf);
    let seq = r.take_u64();
    let kind_byte = r.take_u8();
    let kind =
        MarketUpdateKind::from_wire(kind_byte).ok_or(WireError::UnknownUpdateKind(kind_byte))?;
    let order_id = r.take_u64();
    let ticker_id = r.take_u64() as TickerId;
    let side_byte = r.take_u8();
    let side = Side::from_wire(side_byte).ok_or(WireError::UnknownSide(side_byte))?;
    let price = r.take_i64();
    let qty = r.take_u64();
    let priority = r.take_u64();
    Ok(SequencedUpdate {
        seq,
        update: MarketUpdate {
            kind,
            order_id,
            ticker_id,
            side,
            price,
            qty,
            priority,
        },
    })
}
