//! Socket shell around the feed assembler
//!
//! Always subscribed to the incremental group; joins the snapshot group
//! only while the assembler is recovering and leaves it on resync, so the
//! snapshot stream costs nothing in steady state.

use std::io;
use std::net::UdpSocket;

use runtime::{Producer, RunFlag};
use tracing::{debug, info, warn};
use types::prelude::*;
use types::wire;

use super::assembler::{FeedAssembler, SyncState};
use crate::net;

pub struct MarketDataConsumer {
    assembler: FeedAssembler,
    incremental_socket: UdpSocket,
    snapshot_socket: Option<UdpSocket>,
    cfg: TradingConfig,
    run: RunFlag,
}

impl MarketDataConsumer {
    pub fn new(
        cfg: TradingConfig,
        output: Producer<MarketUpdate>,
        run: RunFlag,
    ) -> io::Result<Self> {
        let incremental_socket =
            net::multicast_receiver(&cfg.incremental_group, cfg.incremental_port, &cfg.iface)?;
        info!(
            target: "md_consumer",
            group = %cfg.incremental_group,
            port = cfg.incremental_port,
            "joined incremental stream"
        );
        Ok(Self {
            assembler: FeedAssembler::new(output),
            incremental_socket,
            snapshot_socket: None,
            cfg,
            run,
        })
    }

    /// One service pass over the joined streams.
    pub fn poll(&mut self) -> bool {
        let mut worked = drain_socket(&self.incremental_socket, |frame| {
            self.assembler.on_incremental(frame)
        });

        match (self.assembler.state(), self.snapshot_socket.is_some()) {
            (SyncState::Recovering, false) => match net::multicast_receiver(
                &self.cfg.snapshot_group,
                self.cfg.snapshot_port,
                &self.cfg.iface,
            ) {
                Ok(socket) => {
                    info!(
                        target: "md_consumer",
                        group = %self.cfg.snapshot_group,
                        "joined snapshot stream for recovery"
                    );
                    self.snapshot_socket = Some(socket);
                }
                Err(err) => warn!(target: "md_consumer", %err, "snapshot join failed"),
            },
            (SyncState::Synced, true) => {
                info!(target: "md_consumer", "left snapshot stream");
                self.snapshot_socket = None;
            }
            _ => {}
        }

        if let Some(socket) = &self.snapshot_socket {
            worked |= drain_socket(socket, |frame| self.assembler.on_snapshot(frame));
        }
        worked
    }

    pub fn run(&mut self) {
        debug!(target: "md_consumer", "market data consumer running");
        while self.run.is_running() {
            if !self.poll() {
                std::hint::spin_loop();
            }
        }
        debug!(target: "md_consumer", "market data consumer stopped");
    }
}

/// Read every pending datagram, decoding and dispatching each frame.
fn drain_socket(socket: &UdpSocket, mut dispatch: impl FnMut(SequencedUpdate)) -> bool {
    let mut worked = false;
    let mut buf = [0u8; 256];
    loop {
        match socket.recv(&mut buf) {
            Ok(len) => {
                match wire::decode_update(&buf[..len]) {
                    Ok(frame) => dispatch(frame),
                    Err(err) => warn!(target: "md_consumer", %err, "undecodable datagram"),
                }
                worked = true;
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => {
                warn!(target: "md_consumer", %err, "recv failed");
                break;
            }
        }
    }
    worked
}
