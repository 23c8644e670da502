//! Cross-venue arbitrage detection and execution (§4.5).

pub mod detector;
pub mod executor;

pub use detector::{ArbitrageConfig, ArbitrageDetector, ArbitrageStats};
pub use executor::ArbitrageExecutor;
