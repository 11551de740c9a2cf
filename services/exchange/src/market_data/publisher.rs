//! Incremental market data publisher
//!
//! Single-threaded consumer of the engine's update ring. Every update is
//! framed with `next_inc_seq` (starting at 1), sent as one datagram to the
//! incremental multicast group, and forwarded to the snapshot synthesizer.
//! Datagram transport is best-effort: a failed send is logged and the
//! pipeline moves on; consumers recover through the snapshot stream.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use runtime::{Consumer, Producer, RunFlag};
use tracing::{debug, error, trace};
use types::prelude::*;
use types::wire;

use crate::net;

pub struct MarketDataPublisher {
    updates: Consumer<MarketUpdate>,
    snapshot_feed: Producer<SequencedUpdate>,
    socket: UdpSocket,
    group: SocketAddr,
    next_inc_seq: u64,
    run: RunFlag,
}

impl MarketDataPublisher {
    pub fn new(
        updates: Consumer<MarketUpdate>,
        snapshot_feed: Producer<SequencedUpdate>,
        cfg: &ExchangeConfig,
        run: RunFlag,
    ) -> io::Result<Self> {
        let socket = net::multicast_sender(&cfg.iface)?;
        let group = net::group_addr(&cfg.incremental_group, cfg.incremental_port)?;
        Ok(Self::with_socket(updates, snapshot_feed, socket, group, run))
    }

    /// Build around an existing socket and destination.
    pub fn with_socket(
        updates: Consumer<MarketUpdate>,
        snapshot_feed: Producer<SequencedUpdate>,
        socket: UdpSocket,
        group: SocketAddr,
        run: RunFlag,
    ) -> Self {
        Self {
            updates,
            snapshot_feed,
            socket,
            group,
            next_inc_seq: 1,
            run,
        }
    }

    /// Frame one update with the next incremental sequence number.
    fn stamp(&mut self, update: MarketUpdate) -> SequencedUpdate {
        let frame = SequencedUpdate {
            seq: self.next_inc_seq,
            update,
        };
        self.next_inc_seq += 1;
        frame
    }

    /// Publish one pending update, if any. Returns whether work was done.
    pub fn poll(&mut self) -> bool {
        let Some(update) = self.updates.pop() else {
            return false;
        };
        let frame = self.stamp(update);
        trace!(target: "publisher", %frame, "multicasting");

        let bytes = wire::encode_update(&frame);
        if let Err(err) = self.socket.send_to(&bytes, self.group) {
            error!(target: "publisher", seq = frame.seq, %err, "incremental send failed");
        }
        if let Err(dropped) = self.snapshot_feed.push(frame) {
            error!(target: "publisher", seq = dropped.seq, "snapshot feed full, dropping");
        }
        true
    }

    pub fn run(&mut self) {
        debug!(target: "publisher", group = %self.group, "market data publisher running");
        while self.run.is_running() {
            if !self.poll() {
                std::hint::spin_loop();
            }
        }
        debug!(target: "publisher", "market data publisher stopped");
    }

    /// Sequence number the next outgoing frame will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_inc_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::spsc;

    fn localhost_publisher() -> (
        MarketDataPublisher,
        Producer<MarketUpdate>,
        Consumer<SequencedUpdate>,
        UdpSocket,
    ) {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_nonblocking(true).unwrap();
        let dest = receiver.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();

        let (upd_tx, upd_rx) = spsc(UPDATE_QUEUE_CAPACITY);
        let (snap_tx, snap_rx) = spsc(UPDATE_QUEUE_CAPACITY);
        let publisher =
            MarketDataPublisher::with_socket(upd_rx, snap_tx, socket, dest, RunFlag::new());
        (publisher, upd_tx, snap_rx, receiver)
    }

    fn add_update(order_id: OrderId) -> MarketUpdate {
        MarketUpdate {
            kind: MarketUpdateKind::Add,
            order_id,
            ticker_id: 0,
            side: Side::Buy,
            price: 100,
            qty: 5,
            priority: 1,
        }
    }

    #[test]
    fn test_sequence_law_consecutive_frames() {
        let (mut publisher, mut upd_tx, mut snap_rx, _receiver) = localhost_publisher();
        for order_id in 1..=5 {
            upd_tx.push(add_update(order_id)).unwrap();
        }
        while publisher.poll() {}

        let mut expected_seq = 1;
        while let Some(frame) = snap_rx.pop() {
            assert_eq!(frame.seq, expected_seq);
            expected_seq += 1;
        }
        assert_eq!(expected_seq, 6);
        assert_eq!(publisher.next_seq(), 6);
    }

    #[test]
    fn test_datagram_carries_framed_update() {
        let (mut publisher, mut upd_tx, _snap_rx, receiver) = localhost_publisher();
        upd_tx.push(add_update(7)).unwrap();
        publisher.poll();

        let mut buf = [0u8; 128];
        // Loopback delivery is immediate in practice but not guaranteed to
        // be synchronous; spin briefly.
        let len = loop {
            match receiver.recv(&mut buf) {
                Ok(len) => break len,
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                    std::hint::spin_loop()
                }
                Err(err) => panic!("recv failed: {err}"),
            }
        };
        assert_eq!(len, wire::UPDATE_FRAME_LEN);
        let frame = wire::decode_update(&buf[..len]).unwrap();
        assert_eq!(frame.seq, 1);
        assert_eq!(frame.update, add_update(7));
    }

    #[test]
    fn test_idle_poll_does_nothing() {
        let (mut publisher, _upd_tx, mut snap_rx, _receiver) = localhost_publisher();
        assert!(!publisher.poll());
        assert!(snap_rx.pop().is_none());
        assert_eq!(publisher.next_seq(), 1);
    }
}
