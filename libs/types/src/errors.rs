//! Error taxonomy shared by both processes
//!
//! Recoverable faults are typed here and propagated with `?`. Fatal
//! conditions (pool exhaustion, gap on the in-process feed, book invariant
//! violations) are asserted at the point of detection instead.

use thiserror::Error;

/// Decoding failures on either wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("frame truncated: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("unknown client request kind: {0:#04x}")]
    UnknownRequestKind(u8),

    #[error("unknown client response kind: {0:#04x}")]
    UnknownResponseKind(u8),

    #[error("unknown market update kind: {0:#04x}")]
    UnknownUpdateKind(u8),

    #[error("unknown side: {0:#04x}")]
    UnknownSide(u8),
}

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Protocol violations on the order-entry session, reported and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("client id mismatch: expected {expected}, received {received}")]
    ClientIdMismatch { expected: u64, received: u64 },

    #[error("out-of-sequence frame: expected {expected}, received {received}")]
    OutOfSequence { expected: u64, received: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_error_display() {
        let err = WireError::Truncated { needed: 50, got: 7 };
        assert_eq!(err.to_string(), "frame truncated: needed 50 bytes, got 7");

        let err = WireError::UnknownUpdateKind(0xEE);
        assert!(err.to_string().contains("0xee"));
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::OutOfSequence {
            expected: 4,
            received: 9,
        };
        assert!(err.to_string().contains("expected 4"));
        assert!(err.to_string().contains("received 9"));
    }
}
