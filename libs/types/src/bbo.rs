//! Best bid/offer aggregate

use std::fmt;

use crate::ids::{price_str, qty_str, Price, Qty, PRICE_INVALID, QTY_INVALID};

/// Top-of-book prices with the aggregated resting quantity at each.
///
/// A side with no resting orders carries the INVALID sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bbo {
    pub bid_price: Price,
    pub bid_qty: Qty,
    pub ask_price: Price,
    pub ask_qty: Qty,
}

impl Default for Bbo {
    fn default() -> Self {
        Self {
            bid_price: PRICE_INVALID,
            bid_qty: QTY_INVALID,
            ask_price: PRICE_INVALID,
            ask_qty: QTY_INVALID,
        }
    }
}

impl Bbo {
    /// Both sides populated.
    pub fn is_two_sided(&self) -> bool {
        self.bid_price != PRICE_INVALID && self.ask_price != PRICE_INVALID
    }
}

impl fmt::Display for Bbo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BBO{{{}@{} X {}@{}}}",
            qty_str(self.bid_qty),
            price_str(self.bid_price),
            qty_str(self.ask_qty),
            price_str(self.ask_price),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bbo_is_one_sided_invalid() {
        let bbo = Bbo::default();
        assert!(!bbo.is_two_sided());
        assert_eq!(bbo.to_string(), "BBO{INVALID@INVALID X INVALID@INVALID}");
    }

    #[test]
    fn test_two_sided_detection() {
        let bbo = Bbo {
            bid_price: 99,
            bid_qty: 10,
            ask_price: 101,
            ask_qty: 4,
        };
        assert!(bbo.is_two_sided());
        assert_eq!(bbo.to_string(), "BBO{10@99 X 4@101}");
    }
}
