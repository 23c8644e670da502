//! Market-making quote engines: the basic NBBO-spread-clamp variant and
//! the Avellaneda-Stoikov reservation-price variant (§4.6).

pub mod avellaneda_stoikov;
pub mod basic;
pub mod common;

pub use avellaneda_stoikov::{AvellanedaStoikov, AvellanedaStoikovParams};
pub use basic::{MarketMaker, MarketMakerParams};
pub use common::{MarketMakerStats, QuoteDecision, SharedMmParams};
