mod arbitrage;
mod book;
mod config;
mod errors;
mod market_maker;
mod math;
mod orchestrator;
mod risk;
mod types;
mod venue;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use arbitrage::{ArbitrageDetector, ArbitrageExecutor};
use config::{Config, QuoteEngineKind};
use market_maker::{AvellanedaStoikov, MarketMaker};
use orchestrator::{Orchestrator, QuoteEngine};
use risk::RiskManager;
use types::{VenueEvent, VenueId};
use venue::{BinanceAdapter, BinanceConfig, CoinbaseAdapter, CoinbaseConfig, VenueManager};

const EVENT_CHANNEL_CAPACITY: usize = 4096;

#[tokio::main]
async fn main() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(config.log_filter.clone())).with_target(false).compact().init();

    info!("═══════════════════════════════════════════");
    info!(symbol = %config.symbol, venues = ?config.venues, testnet = config.testnet, "multi-venue trading core starting");
    info!("═══════════════════════════════════════════");

    let (events_tx, events_rx) = mpsc::channel::<VenueEvent>(EVENT_CHANNEL_CAPACITY);

    let mut manager = VenueManager::new();

    for venue in &config.venues {
        match venue {
            VenueId::Binance => {
                let Some(creds) = &config.binance else {
                    warn!("BINANCE requested but BINANCE_API_KEY/BINANCE_API_SECRET not set, skipping");
                    continue;
                };
                let adapter_config = BinanceConfig { api_key: creds.api_key.clone(), api_secret: creds.api_secret.clone(), testnet: config.testnet };
                let adapter = Arc::new(BinanceAdapter::new(adapter_config, events_tx.clone()));
                manager.register(VenueId::Binance, adapter);
            }
            VenueId::Coinbase => {
                let Some(creds) = &config.coinbase else {
                    warn!("COINBASE requested but COINBASE_API_KEY/COINBASE_API_SECRET not set, skipping");
                    continue;
                };
                let Some(passphrase) = creds.passphrase.clone() else {
                    warn!("COINBASE requires COINBASE_PASSPHRASE, skipping");
                    continue;
                };
                let adapter_config = CoinbaseConfig { api_key: creds.api_key.clone(), api_secret: creds.api_secret.clone(), passphrase, testnet: config.testnet };
                let adapter = Arc::new(CoinbaseAdapter::new(adapter_config, events_tx.clone()));
                manager.register(VenueId::Coinbase, adapter);
            }
            VenueId::Kraken => {
                warn!("KRAKEN is a declared venue id with no adapter implementation in this build, skipping");
            }
        }
    }
    drop(events_tx);

    manager.connect_all().await;
    manager.subscribe_ticker_all(&config.symbol).await;

    let detector = ArbitrageDetector::new(config.arbitrage);
    let executor = ArbitrageExecutor::new(config.arbitrage);
    let risk = RiskManager::new(config.risk_limits);

    let quote_engine = match config.quote_engine {
        QuoteEngineKind::Basic => QuoteEngine::Basic(MarketMaker::new(config.market_maker)),
        QuoteEngineKind::AvellanedaStoikov => QuoteEngine::AvellanedaStoikov(AvellanedaStoikov::new(config.avellaneda_stoikov)),
    };

    let mut orchestrator = Orchestrator::new(config.symbol.clone(), manager, detector, executor, quote_engine, risk, events_rx);

    orchestrator.run().await;

    error!("orchestrator loop exited");
}
