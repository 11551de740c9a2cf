//! Snapshot synthesizer
//!
//! Mirrors every limit order book as a flat (ticker, market order id)
//! mapping rebuilt from the incremental stream; ordering is recoverable
//! downstream from price and priority, so no linked book is kept. The feed
//! from the publisher is in-process and therefore gap-free by contract: a
//! sequence discontinuity here is fatal.
//!
//! Every snapshot interval the full state goes out on the snapshot group:
//! `SNAPSHOT_START` (anchored to the last applied incremental sequence),
//! then per ticker a `CLEAR` followed by an ADD for every live order, then
//! `SNAPSHOT_END`. Sequence numbers inside one snapshot restart at zero.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use runtime::{Consumer, Pool, RunFlag, NIL};
use tracing::{debug, error, info, trace};
use types::prelude::*;
use types::wire;

use crate::net;

pub struct SnapshotSynthesizer {
    feed: Consumer<SequencedUpdate>,
    socket: UdpSocket,
    group: SocketAddr,
    /// Per-ticker map from market order id to shadow handle.
    shadow: Vec<Box<[u32]>>,
    /// Shadow orders, stored as the ADD record that would recreate them.
    pool: Pool<MarketUpdate>,
    last_inc_seq: u64,
    snapshot_interval: Duration,
    last_snapshot_at: Instant,
    run: RunFlag,
}

impl SnapshotSynthesizer {
    pub fn new(
        feed: Consumer<SequencedUpdate>,
        cfg: &ExchangeConfig,
        run: RunFlag,
    ) -> io::Result<Self> {
        let socket = net::multicast_sender(&cfg.iface)?;
        let group = net::group_addr(&cfg.snapshot_group, cfg.snapshot_port)?;
        Ok(Self::with_socket(
            feed,
            socket,
            group,
            Duration::from_secs(cfg.snapshot_interval_secs),
            run,
        ))
    }

    /// Build around an existing socket and destination.
    pub fn with_socket(
        feed: Consumer<SequencedUpdate>,
        socket: UdpSocket,
        group: SocketAddr,
        snapshot_interval: Duration,
        run: RunFlag,
    ) -> Self {
        Self {
            feed,
            socket,
            group,
            shadow: (0..MAX_TICKERS)
                .map(|_| vec![NIL; MAX_ORDER_IDS].into_boxed_slice())
                .collect(),
            pool: Pool::new("shadow-orders", MAX_ORDER_IDS),
            last_inc_seq: 0,
            snapshot_interval,
            last_snapshot_at: Instant::now(),
            run,
        }
    }

    /// Apply one incremental frame to the shadow book.
    pub fn apply(&mut self, frame: SequencedUpdate) {
        assert_eq!(
            frame.seq,
            self.last_inc_seq + 1,
            "gap on the publisher feed: {frame}"
        );
        self.last_inc_seq = frame.seq;

        let update = frame.update;
        let ticker = update.ticker_id as usize;
        match update.kind {
            MarketUpdateKind::Add => {
                let slot = &mut self.shadow[ticker][update.order_id as usize];
                assert!(*slot == NIL, "shadow order already live: {update}");
                *slot = self.pool.alloc(update);
            }
            MarketUpdateKind::Modify => {
                let handle = self.shadow[ticker][update.order_id as usize];
                assert!(handle != NIL, "modify for unknown shadow order: {update}");
                let shadow = self.pool.get_mut(handle);
                assert_eq!(shadow.side, update.side, "side changed on modify: {update}");
                shadow.qty = update.qty;
                shadow.price = update.price;
            }
            MarketUpdateKind::Cancel => {
                let slot = &mut self.shadow[ticker][update.order_id as usize];
                assert!(*slot != NIL, "cancel for unknown shadow order: {update}");
                let handle = std::mem::replace(slot, NIL);
                let shadow = self.pool.free(handle);
                assert_eq!(shadow.side, update.side, "side changed on cancel: {update}");
            }
            // Trades are followed by their MODIFY/CANCEL; markers and
            // clears never appear on the incremental stream.
            MarketUpdateKind::Trade
            | MarketUpdateKind::Clear
            | MarketUpdateKind::SnapshotStart
            | MarketUpdateKind::SnapshotEnd
            | MarketUpdateKind::Invalid => {}
        }
    }

    /// Assemble one complete snapshot, sequenced from zero.
    pub fn build_snapshot(&self) -> Vec<SequencedUpdate> {
        let mut frames = Vec::with_capacity(self.pool.len() + MAX_TICKERS + 2);
        let mut seq = 0u64;
        let mut push = |frames: &mut Vec<SequencedUpdate>, update: MarketUpdate| {
            frames.push(SequencedUpdate { seq, update });
            seq += 1;
        };

        push(
            &mut frames,
            MarketUpdate::snapshot_marker(MarketUpdateKind::SnapshotStart, self.last_inc_seq),
        );
        for (ticker, orders) in self.shadow.iter().enumerate() {
            push(
                &mut frames,
                MarketUpdate {
                    kind: MarketUpdateKind::Clear,
                    ticker_id: ticker as TickerId,
                    ..MarketUpdate::default()
                },
            );
            for &handle in orders.iter() {
                if handle != NIL {
                    push(&mut frames, *self.pool.get(handle));
                }
            }
        }
        push(
            &mut frames,
            MarketUpdate::snapshot_marker(MarketUpdateKind::SnapshotEnd, self.last_inc_seq),
        );
        frames
    }

    fn publish_snapshot(&mut self) {
        let frames = self.build_snapshot();
        for frame in &frames {
            trace!(target: "snapshot", %frame, "multicasting");
            let bytes = wire::encode_update(frame);
            if let Err(err) = self.socket.send_to(&bytes, self.group) {
                error!(target: "snapshot", seq = frame.seq, %err, "snapshot send failed");
            }
        }
        info!(
            target: "snapshot",
            orders = self.pool.len(),
            anchor = self.last_inc_seq,
            "published snapshot"
        );
    }

    /// Drain the feed, then publish if the interval elapsed.
    pub fn poll(&mut self) -> bool {
        let mut worked = false;
        while let Some(frame) = self.feed.pop() {
            trace!(target: "snapshot", %frame, "absorbing");
            self.apply(frame);
            worked = true;
        }
        if self.last_snapshot_at.elapsed() >= self.snapshot_interval {
            self.last_snapshot_at = Instant::now();
            self.publish_snapshot();
            worked = true;
        }
        worked
    }

    pub fn run(&mut self) {
        debug!(target: "snapshot", group = %self.group, "snapshot synthesizer running");
        while self.run.is_running() {
            if !self.poll() {
                std::hint::spin_loop();
            }
        }
        debug!(target: "snapshot", "snapshot synthesizer stopped");
    }

    /// Sequence of the last applied incremental frame.
    pub fn last_inc_seq(&self) -> u64 {
        self.last_inc_seq
    }

    /// Number of live shadow orders.
    pub fn live_order_count(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::{spsc, Producer};

    fn synthesizer() -> (SnapshotSynthesizer, Producer<SequencedUpdate>) {
        let (feed_tx, feed_rx) = spsc(UPDATE_QUEUE_CAPACITY);
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dest = socket.local_addr().unwrap();
        let synthesizer = SnapshotSynthesizer::with_socket(
            feed_rx,
            socket,
            dest,
            Duration::from_secs(60),
            RunFlag::new(),
        );
        (synthesizer, feed_tx)
    }

    fn add(seq: u64, ticker_id: TickerId, order_id: OrderId, qty: Qty) -> SequencedUpdate {
        SequencedUpdate {
            seq,
            update: MarketUpdate {
                kind: MarketUpdateKind::Add,
                order_id,
                ticker_id,
                side: Side::Buy,
                price: 100,
                qty,
                priority: 1,
            },
        }
    }

    #[test]
    fn test_shadow_tracks_add_modify_cancel() {
        let (mut synthesizer, _feed_tx) = synthesizer();
        synthesizer.apply(add(1, 0, 5, 10));
        assert_eq!(synthesizer.live_order_count(), 1);

        let mut modify = add(2, 0, 5, 4);
        modify.update.kind = MarketUpdateKind::Modify;
        synthesizer.apply(modify);

        let mut cancel = add(3, 0, 5, 0);
        cancel.update.kind = MarketUpdateKind::Cancel;
        synthesizer.apply(cancel);
        assert_eq!(synthesizer.live_order_count(), 0);
        assert_eq!(synthesizer.last_inc_seq(), 3);
    }

    #[test]
    fn test_trade_frames_advance_sequence_only() {
        let (mut synthesizer, _feed_tx) = synthesizer();
        let mut trade = add(1, 0, ORDER_ID_INVALID, 3);
        trade.update.kind = MarketUpdateKind::Trade;
        synthesizer.apply(trade);
        assert_eq!(synthesizer.last_inc_seq(), 1);
        assert_eq!(synthesizer.live_order_count(), 0);
    }

    #[test]
    #[should_panic(expected = "gap on the publisher feed")]
    fn test_feed_gap_is_fatal() {
        let (mut synthesizer, _feed_tx) = synthesizer();
        synthesizer.apply(add(1, 0, 5, 10));
        synthesizer.apply(add(3, 0, 6, 10));
    }

    #[test]
    fn test_snapshot_frames_restart_at_zero_and_anchor() {
        let (mut synthesizer, _feed_tx) = synthesizer();
        synthesizer.apply(add(1, 0, 5, 10));
        synthesizer.apply(add(2, 1, 9, 2));

        let frames = synthesizer.build_snapshot();
        // START, one CLEAR per ticker, two ADDs, END.
        assert_eq!(frames.len(), 1 + MAX_TICKERS + 2 + 1);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.seq, i as u64);
        }

        let start = frames.first().unwrap();
        assert_eq!(start.update.kind, MarketUpdateKind::SnapshotStart);
        assert_eq!(start.update.order_id, 2);
        let end = frames.last().unwrap();
        assert_eq!(end.update.kind, MarketUpdateKind::SnapshotEnd);
        assert_eq!(end.update.order_id, 2);

        // Ticker 0's CLEAR comes immediately after START, then its ADD.
        assert_eq!(frames[1].update.kind, MarketUpdateKind::Clear);
        assert_eq!(frames[1].update.ticker_id, 0);
        assert_eq!(frames[2].update.kind, MarketUpdateKind::Add);
        assert_eq!(frames[2].update.order_id, 5);
    }

    #[test]
    fn test_poll_drains_feed_in_order() {
        let (mut synthesizer, mut feed_tx) = synthesizer();
        feed_tx.push(add(1, 0, 5, 10)).unwrap();
        feed_tx.push(add(2, 0, 6, 1)).unwrap();
        assert!(synthesizer.poll());
        assert_eq!(synthesizer.last_inc_seq(), 2);
        assert_eq!(synthesizer.live_order_count(), 2);
    }
}
