//! Exchange process entry point
//!
//! Wires the three pipeline stages together with SPSC rings and runs each
//! on its own thread. Takes no command-line arguments; endpoints come from
//! `exchange.json` next to the binary when present, defaults otherwise.

use std::time::Duration;

use runtime::{spawn_named, spsc, RunFlag};
use tracing::{info, warn};
use types::prelude::*;

use exchange::market_data::{MarketDataPublisher, SnapshotSynthesizer};
use exchange::matcher::MatchingEngine;
use exchange::order_server::OrderServer;

const CONFIG_PATH: &str = "exchange.json";

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = match ExchangeConfig::from_file(CONFIG_PATH) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(%err, "config not loaded, using defaults");
            ExchangeConfig::default()
        }
    };
    info!(?cfg, "starting exchange");

    let (requests_tx, requests_rx) = spsc::<ClientRequest>(REQUEST_QUEUE_CAPACITY);
    let (responses_tx, responses_rx) = spsc::<ClientResponse>(REQUEST_QUEUE_CAPACITY);
    let (updates_tx, updates_rx) = spsc::<MarketUpdate>(UPDATE_QUEUE_CAPACITY);
    let (snapshot_tx, snapshot_rx) = spsc::<SequencedUpdate>(UPDATE_QUEUE_CAPACITY);

    let run = RunFlag::new();

    let mut engine = MatchingEngine::new(requests_rx, responses_tx, updates_tx, run.clone());
    let engine_thread = spawn_named("exchange/matcher", Some(0), move || engine.run())?;

    let mut publisher =
        MarketDataPublisher::new(updates_rx, snapshot_tx, &cfg, run.clone())?;
    let publisher_thread = spawn_named("exchange/publisher", Some(1), move || publisher.run())?;

    let mut synthesizer = SnapshotSynthesizer::new(snapshot_rx, &cfg, run.clone())?;
    let synthesizer_thread =
        spawn_named("exchange/snapshot", Some(2), move || synthesizer.run())?;

    let mut server = OrderServer::new(&cfg, requests_tx, responses_rx, run.clone())?;
    let server_thread = spawn_named("exchange/order-server", None, move || server.run())?;

    // The exchange runs until the process is terminated externally.
    loop {
        std::thread::sleep(Duration::from_secs(30));
        info!("exchange alive");
        if engine_thread.is_finished()
            || publisher_thread.is_finished()
            || synthesizer_thread.is_finished()
            || server_thread.is_finished()
        {
            // A pipeline thread only exits on a fatal condition; take the
            // rest of the process down with it.
            run.stop();
            engine_thread.join().ok();
            publisher_thread.join().ok();
            synthesizer_thread.join().ok();
            server_thread.join().ok();
            std::process::exit(1);
        }
    }
}
