//! Trading process entry point
//!
//! `trading <client_id> <algo> [clip threshold max_order_size max_position
//! max_loss]...` with one quintuple per ticker. Endpoints come from
//! `trading.json` next to the binary when present, defaults otherwise.
//! The process exits cleanly once the engine has been silent for a minute.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use runtime::{spawn_named, spsc, RunFlag};
use rust_decimal::Decimal;
use tracing::{info, warn};
use types::prelude::*;

use trading::engine::{AlgoType, TradeEngine};
use trading::gateway::OrderGateway;
use trading::market_data::MarketDataConsumer;

const CONFIG_PATH: &str = "trading.json";
const IDLE_SHUTDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum AlgoArg {
    Maker,
    Taker,
    Random,
}

impl From<AlgoArg> for AlgoType {
    fn from(arg: AlgoArg) -> Self {
        match arg {
            AlgoArg::Maker => AlgoType::Maker,
            AlgoArg::Taker => AlgoType::Taker,
            AlgoArg::Random => AlgoType::Random,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "trading", about = "Algorithmic trading client")]
struct Args {
    /// Participant identifier, unique per exchange.
    client_id: ClientId,
    /// Strategy to run.
    #[arg(value_enum, ignore_case = true)]
    algo: AlgoArg,
    /// Five values per ticker:
    /// clip threshold max_order_size max_position max_loss
    #[arg(allow_negative_numbers = true)]
    ticker_params: Vec<String>,
}

fn parse_ticker_cfg(params: &[String]) -> Result<TickerCfgMap, String> {
    if params.len() % 5 != 0 {
        return Err(format!(
            "expected 5 values per ticker, got {} values",
            params.len()
        ));
    }
    let tickers = params.len() / 5;
    if tickers > MAX_TICKERS {
        return Err(format!("at most {MAX_TICKERS} tickers, got {tickers}"));
    }

    let mut cfg = TickerCfgMap::default();
    for (ticker, chunk) in params.chunks(5).enumerate() {
        cfg[ticker] = TradeEngineCfg {
            clip: chunk[0].parse::<Qty>().map_err(|e| e.to_string())?,
            threshold: chunk[1].parse::<f64>().map_err(|e| e.to_string())?,
            risk: RiskCfg {
                max_order_size: chunk[2].parse::<Qty>().map_err(|e| e.to_string())?,
                max_position: chunk[3].parse::<i64>().map_err(|e| e.to_string())?,
                max_loss: chunk[4].parse::<Decimal>().map_err(|e| e.to_string())?,
            },
        };
        info!(ticker, cfg = %cfg[ticker], "ticker configured");
    }
    Ok(cfg)
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let ticker_cfg = match parse_ticker_cfg(&args.ticker_params) {
        Ok(cfg) => cfg,
        Err(message) => {
            eprintln!("bad ticker parameters: {message}");
            std::process::exit(2);
        }
    };
    let cfg = match TradingConfig::from_file(CONFIG_PATH) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(%err, "config not loaded, using defaults");
            TradingConfig::default()
        }
    };
    info!(client_id = args.client_id, algo = ?args.algo, ?cfg, "starting trading client");

    let (requests_tx, requests_rx) = spsc::<ClientRequest>(REQUEST_QUEUE_CAPACITY);
    let (responses_tx, responses_rx) = spsc::<ClientResponse>(REQUEST_QUEUE_CAPACITY);
    let (updates_tx, updates_rx) = spsc::<MarketUpdate>(UPDATE_QUEUE_CAPACITY);

    let engine_run = RunFlag::new();
    let consumer_run = RunFlag::new();
    let gateway_run = RunFlag::new();

    let mut engine = TradeEngine::new(
        args.client_id,
        args.algo.into(),
        ticker_cfg,
        requests_tx,
        responses_rx,
        updates_rx,
        engine_run.clone(),
    );
    let clock = engine.clock();
    let engine_thread = spawn_named("trading/engine", Some(0), move || engine.run())?;

    let mut gateway = OrderGateway::connect(
        args.client_id,
        &cfg,
        requests_rx,
        responses_tx,
        gateway_run.clone(),
    )?;
    let gateway_thread = spawn_named("trading/order-gw", None, move || gateway.run())?;

    let mut consumer = MarketDataConsumer::new(cfg, updates_tx, consumer_run.clone())?;
    let consumer_thread = spawn_named("trading/md-consumer", None, move || consumer.run())?;

    // Run until the market goes quiet for a whole idle window.
    loop {
        let silent = clock.silent_for();
        if silent >= IDLE_SHUTDOWN {
            break;
        }
        info!(silent_secs = silent.as_secs(), "waiting for inactivity");
        std::thread::sleep(Duration::from_secs(5));
    }

    info!("no activity for {IDLE_SHUTDOWN:?}, shutting down");
    engine_run.stop();
    engine_thread.join().ok();
    consumer_run.stop();
    consumer_thread.join().ok();
    // Give the gateway a beat to flush anything the engine queued last.
    std::thread::sleep(Duration::from_secs(1));
    gateway_run.stop();
    gateway_thread.join().ok();

    info!("clean shutdown");
    Ok(())
}
