//! Identifier aliases for exchange entities
//!
//! Identifiers are small integers so they can index fixed-capacity arrays
//! on the hot path. Every identifier has an INVALID sentinel distinct from
//! any legal value; sentinels travel the wire unchanged.

/// Ticker index, bounded by [`crate::config::MAX_TICKERS`].
pub type TickerId = u32;
/// Client-assigned order id, monotonic per client, or exchange-assigned
/// market order id, monotonic per ticker.
pub type OrderId = u64;
/// Participant identifier, bounded by [`crate::config::MAX_CLIENTS`].
pub type ClientId = u32;
/// Price in integer ticks.
pub type Price = i64;
/// Quantity in integer units.
pub type Qty = u64;
/// Arrival rank within a price level, monotonic from 1.
pub type Priority = u64;

pub const TICKER_ID_INVALID: TickerId = TickerId::MAX;
pub const ORDER_ID_INVALID: OrderId = OrderId::MAX;
pub const CLIENT_ID_INVALID: ClientId = ClientId::MAX;
pub const PRICE_INVALID: Price = Price::MAX;
pub const QTY_INVALID: Qty = Qty::MAX;
pub const PRIORITY_INVALID: Priority = Priority::MAX;

/// Render a ticker id, mapping the sentinel to `"INVALID"`.
pub fn ticker_id_str(ticker_id: TickerId) -> String {
    if ticker_id == TICKER_ID_INVALID {
        "INVALID".to_string()
    } else {
        ticker_id.to_string()
    }
}

/// Render an order id, mapping the sentinel to `"INVALID"`.
pub fn order_id_str(order_id: OrderId) -> String {
    if order_id == ORDER_ID_INVALID {
        "INVALID".to_string()
    } else {
        order_id.to_string()
    }
}

/// Render a client id, mapping the sentinel to `"INVALID"`.
pub fn client_id_str(client_id: ClientId) -> String {
    if client_id == CLIENT_ID_INVALID {
        "INVALID".to_string()
    } else {
        client_id.to_string()
    }
}

/// Render a price, mapping the sentinel to `"INVALID"`.
pub fn price_str(price: Price) -> String {
    if price == PRICE_INVALID {
        "INVALID".to_string()
    } else {
        price.to_string()
    }
}

/// Render a quantity, mapping the sentinel to `"INVALID"`.
pub fn qty_str(qty: Qty) -> String {
    if qty == QTY_INVALID {
        "INVALID".to_string()
    } else {
        qty.to_string()
    }
}

/// Render a priority, mapping the sentinel to `"INVALID"`.
pub fn priority_str(priority: Priority) -> String {
    if priority == PRIORITY_INVALID {
        "INVALID".to_string()
    } else {
        priority.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_distinct_from_legal_values() {
        assert_ne!(TICKER_ID_INVALID, 0);
        assert_ne!(ORDER_ID_INVALID, 1);
        assert_ne!(CLIENT_ID_INVALID, 0);
        assert_ne!(PRICE_INVALID, 0);
        assert_ne!(QTY_INVALID, 1);
        assert_ne!(PRIORITY_INVALID, 1);
    }

    #[test]
    fn test_sentinel_rendering() {
        assert_eq!(price_str(PRICE_INVALID), "INVALID");
        assert_eq!(price_str(100), "100");
        assert_eq!(qty_str(QTY_INVALID), "INVALID");
        assert_eq!(qty_str(5), "5");
        assert_eq!(order_id_str(ORDER_ID_INVALID), "INVALID");
    }
}
