//! Venue integration layer: the adapter contract (§4.3), the manager that
//! registers and health-tracks adapters (§4.4), and the two concrete
//! reference adapters this crate ships.

pub mod adapter;
pub mod binance;
pub mod coinbase;
pub mod manager;

pub use adapter::VenueAdapter;
pub use binance::{BinanceAdapter, BinanceConfig};
pub use coinbase::{CoinbaseAdapter, CoinbaseConfig};
pub use manager::{VenueHealth, VenueManager};
