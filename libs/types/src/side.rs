//! Order side (buyer or seller)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an order. `Invalid` is the wire sentinel for records that carry
/// no side (cancel rejects, snapshot markers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Side {
    Invalid = 0,
    Buy = 1,
    Sell = 2,
}

impl Side {
    /// Get the opposite side. Invalid stays invalid.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Invalid => Side::Invalid,
        }
    }

    /// Signed direction of the side: Buy is +1, Sell is -1.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
            Side::Invalid => 0,
        }
    }

    /// Dense index for per-side arrays: Buy is 0, Sell is 1.
    ///
    /// # Panics
    /// Panics on `Invalid`; per-side state never exists for the sentinel.
    pub fn index(self) -> usize {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
            Side::Invalid => panic!("Side::Invalid has no per-side index"),
        }
    }

    /// Wire byte for this side.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte, `None` for unknown values.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Side::Invalid),
            1 => Some(Side::Buy),
            2 => Some(Side::Sell),
            _ => None,
        }
    }
}

impl Default for Side {
    fn default() -> Self {
        Side::Invalid
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Invalid => "INVALID",
        };
        write!(f, "{s}")
    }
}
