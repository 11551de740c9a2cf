//! Feed assembly and snapshot recovery
//!
//! Two states. SYNCED: incremental frames are forwarded iff they carry
//! exactly the expected sequence; older frames are duplicates, newer ones
//! mean loss. On loss the assembler flips to RECOVERING: every incremental
//! is buffered by sequence while a snapshot cycle is collected. A complete
//! snapshot (contiguous per-snapshot sequences from the START marker to
//! the END marker, both anchored to the same incremental sequence S)
//! replays CLEAR+ADD records, discards buffered incrementals at or below
//! S, replays the contiguous run above S, and resyncs; a further gap keeps
//! the assembler in recovery for the next cycle.
//!
//! Everything forwarded downstream is contiguous and in order: applied to
//! an empty book it reconstructs the exchange's authoritative state.

use std::collections::BTreeMap;

use runtime::Producer;
use tracing::{debug, error, info, warn};
use types::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    Recovering,
}

pub struct FeedAssembler {
    output: Producer<MarketUpdate>,
    state: SyncState,
    next_exp_inc_seq: u64,
    queued_incrementals: BTreeMap<u64, MarketUpdate>,
    queued_snapshot: BTreeMap<u64, MarketUpdate>,
}

impl FeedAssembler {
    pub fn new(output: Producer<MarketUpdate>) -> Self {
        Self {
            output,
            state: SyncState::Synced,
            next_exp_inc_seq: 1,
            queued_incrementals: BTreeMap::new(),
            queued_snapshot: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Sequence the next in-order incremental frame must carry.
    pub fn expected_seq(&self) -> u64 {
        self.next_exp_inc_seq
    }

    pub fn on_incremental(&mut self, frame: SequencedUpdate) {
        match self.state {
            SyncState::Synced => {
                if frame.seq == self.next_exp_inc_seq {
                    self.next_exp_inc_seq += 1;
                    self.forward(frame.update);
                } else if frame.seq > self.next_exp_inc_seq {
                    warn!(
                        target: "md_consumer",
                        expected = self.next_exp_inc_seq,
                        received = frame.seq,
                        "incremental gap, entering recovery"
                    );
                    self.state = SyncState::Recovering;
                    self.queued_snapshot.clear();
                    self.queued_incrementals.clear();
                    self.queued_incrementals.insert(frame.seq, frame.update);
                } else {
                    debug!(target: "md_consumer", seq = frame.seq, "duplicate frame dropped");
                }
            }
            SyncState::Recovering => {
                self.queued_incrementals.insert(frame.seq, frame.update);
            }
        }
    }

    pub fn on_snapshot(&mut self, frame: SequencedUpdate) {
        if self.state == SyncState::Synced {
            return;
        }
        match frame.update.kind {
            MarketUpdateKind::SnapshotStart => {
                self.queued_snapshot.clear();
                self.queued_snapshot.insert(frame.seq, frame.update);
            }
            MarketUpdateKind::SnapshotEnd => {
                self.queued_snapshot.insert(frame.seq, frame.update);
                self.try_finish_recovery();
            }
            _ => {
                self.queued_snapshot.insert(frame.seq, frame.update);
            }
        }
    }

    /// A snapshot END arrived; resync if the cycle between START and END
    /// is contiguous and complete.
    fn try_finish_recovery(&mut self) {
        let Some((&end_seq, end)) = self.queued_snapshot.last_key_value() else {
            return;
        };
        if end.kind != MarketUpdateKind::SnapshotEnd {
            return;
        }
        let anchor = end.order_id;

        let complete = self
            .queued_snapshot
            .first_key_value()
            .map(|(&seq, start)| {
                seq == 0
                    && start.kind == MarketUpdateKind::SnapshotStart
                    && start.order_id == anchor
            })
            .unwrap_or(false)
            && self.queued_snapshot.len() as u64 == end_seq + 1;

        if !complete {
            warn!(
                target: "md_consumer",
                frames = self.queued_snapshot.len(),
                anchor,
                "incomplete snapshot cycle, waiting for the next one"
            );
            return;
        }

        info!(
            target: "md_consumer",
            anchor,
            orders = self.queued_snapshot.len().saturating_sub(2 + MAX_TICKERS),
            "replaying snapshot"
        );
        let snapshot = std::mem::take(&mut self.queued_snapshot);
        for update in snapshot.values() {
            match update.kind {
                MarketUpdateKind::SnapshotStart | MarketUpdateKind::SnapshotEnd => {}
                _ => self.forward(*update),
            }
        }
        self.next_exp_inc_seq = anchor + 1;

        // Everything the snapshot already covers is stale.
        self.queued_incrementals = self.queued_incrementals.split_off(&(anchor + 1));
        while let Some(entry) = self.queued_incrementals.first_entry() {
            if *entry.key() != self.next_exp_inc_seq {
                break;
            }
            let update = entry.remove();
            self.next_exp_inc_seq += 1;
            self.forward(update);
        }

        if self.queued_incrementals.is_empty() {
            self.state = SyncState::Synced;
            info!(
                target: "md_consumer",
                expected = self.next_exp_inc_seq,
                "recovery complete"
            );
        } else {
            warn!(
                target: "md_consumer",
                expected = self.next_exp_inc_seq,
                buffered = self.queued_incrementals.len(),
                "gap persists after snapshot, staying in recovery"
            );
        }
    }

    fn forward(&mut self, update: MarketUpdate) {
        if let Err(dropped) = self.output.push(update) {
            error!(target: "md_consumer", update = %dropped, "engine ring full, dropping");
        }
    }
}
