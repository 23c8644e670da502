//! Configuration loaded from environment variables (§1.1, §6 configuration
//! surface), following the same `env::var(...).ok().and_then(parse)` idiom
//! as the teacher's own `Config::from_env()`.

use crate::arbitrage::ArbitrageConfig;
use crate::errors::ConfigError;
use crate::market_maker::{AvellanedaStoikovParams, MarketMakerParams, SharedMmParams};
use crate::risk::RiskLimits;
use crate::types::{Symbol, VenueId};

/// Which quote engine variant the orchestrator should construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteEngineKind {
    Basic,
    AvellanedaStoikov,
}

impl QuoteEngineKind {
    fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "avellaneda-stoikov" | "avellaneda_stoikov" | "as" => QuoteEngineKind::AvellanedaStoikov,
            _ => QuoteEngineKind::Basic,
        }
    }
}

/// Credential env-var names for one venue. Never the secrets themselves —
/// only where to find them.
#[derive(Clone, Debug)]
pub struct VenueCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl VenueCredentials {
    fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let api_key = std::env::var(format!("{prefix}_API_KEY")).map_err(|_| ConfigError::MissingVar(format!("{prefix}_API_KEY")))?;
        let api_secret = std::env::var(format!("{prefix}_API_SECRET")).map_err(|_| ConfigError::MissingVar(format!("{prefix}_API_SECRET")))?;
        let passphrase = std::env::var(format!("{prefix}_PASSPHRASE")).ok();
        Ok(Self { api_key, api_secret, passphrase })
    }
}

/// Top-level configuration, loaded once at process start.
#[derive(Clone)]
pub struct Config {
    pub symbol: Symbol,
    pub venues: Vec<VenueId>,
    pub testnet: bool,

    pub binance: Option<VenueCredentials>,
    pub coinbase: Option<VenueCredentials>,

    pub arbitrage: ArbitrageConfig,
    pub risk_profile: RiskProfile,
    pub risk_limits: RiskLimits,

    pub quote_engine: QuoteEngineKind,
    pub market_maker: MarketMakerParams,
    pub avellaneda_stoikov: AvellanedaStoikovParams,

    pub log_filter: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskProfile {
    Default,
    Conservative,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = std::env::var("TRADING_BASE").unwrap_or_else(|_| "BTC".into());
        let quote = std::env::var("TRADING_QUOTE").unwrap_or_else(|_| "USDT".into());
        let symbol = Symbol::new(&base, &quote);

        let testnet = std::env::var("VENUE_TESTNET").map(|v| v == "1" || v.to_lowercase() == "true").unwrap_or(false);

        let venues = std::env::var("ENABLED_VENUES")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|v| match v.trim().to_lowercase().as_str() {
                        "binance" => Some(VenueId::Binance),
                        "coinbase" => Some(VenueId::Coinbase),
                        "kraken" => Some(VenueId::Kraken),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_else(|| vec![VenueId::Binance, VenueId::Coinbase]);

        let binance = VenueCredentials::from_env("BINANCE").ok();
        let coinbase = VenueCredentials::from_env("COINBASE").ok();

        let risk_profile = match std::env::var("RISK_PROFILE").unwrap_or_else(|_| "default".into()).to_lowercase().as_str() {
            "conservative" => RiskProfile::Conservative,
            _ => RiskProfile::Default,
        };
        let risk_limits = match risk_profile {
            RiskProfile::Default => RiskLimits::default_profile(),
            RiskProfile::Conservative => RiskLimits::conservative(),
        };

        let quote_engine = QuoteEngineKind::from_str(&std::env::var("QUOTE_ENGINE").unwrap_or_else(|_| "basic".into()));

        let arbitrage = ArbitrageConfig {
            min_profit_bps: env_f64("ARB_MIN_PROFIT_BPS", 2.0),
            max_position_usd: env_f64("ARB_MAX_POSITION_USD", 10_000.0),
            min_quantity: env_f64("ARB_MIN_QUANTITY", 0.001),
            execution_timeout_ms: std::env::var("ARB_EXECUTION_TIMEOUT_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(1000),
            fee_bps: env_f64("ARB_FEE_BPS", 0.2),
        };

        let shared = SharedMmParams {
            max_position: env_f64("MM_MAX_POSITION", 1.0),
            order_size: env_f64("MM_ORDER_SIZE", 0.1),
            inventory_skew_factor: env_f64("MM_SKEW_FACTOR", 0.5),
            prefer_lowest_latency: std::env::var("MM_PREFER_LOWEST_LATENCY").map(|v| v != "0" && v.to_lowercase() != "false").unwrap_or(true),
            quote_on_all_venues: std::env::var("MM_QUOTE_ON_ALL_VENUES").map(|v| v == "1" || v.to_lowercase() == "true").unwrap_or(false),
            hedge_on_fill: std::env::var("MM_HEDGE_ON_FILL").map(|v| v != "0" && v.to_lowercase() != "false").unwrap_or(true),
            hedge_venue: None,
        };

        let market_maker = MarketMakerParams {
            shared,
            min_spread_bps: env_f64("MM_MIN_SPREAD_BPS", 5.0),
            target_spread_bps: env_f64("MM_TARGET_SPREAD_BPS", 10.0),
            max_spread_bps: env_f64("MM_MAX_SPREAD_BPS", 50.0),
        };

        let avellaneda_stoikov = AvellanedaStoikovParams {
            shared,
            gamma: env_f64("AS_GAMMA", 0.1),
            k: env_f64("AS_K", 1.5),
            horizon_secs: env_f64("AS_HORIZON_SECS", 3600.0),
            min_spread_bps: env_f64("AS_MIN_SPREAD_BPS", 5.0),
            max_spread_bps: env_f64("AS_MAX_SPREAD_BPS", 50.0),
            vol_lambda: env_f64("AS_VOL_LAMBDA", 0.94),
            vol_min_samples: std::env::var("AS_VOL_MIN_SAMPLES").ok().and_then(|s| s.parse().ok()).unwrap_or(30),
        };

        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

        Ok(Self { symbol, venues, testnet, binance, coinbase, arbitrage, risk_profile, risk_limits, quote_engine, market_maker, avellaneda_stoikov, log_filter })
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
