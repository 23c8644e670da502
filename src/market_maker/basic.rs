//! Basic cross-venue market-making quote engine (§4.6), grounded in
//! `strategy/cross_exchange_mm.py`'s `CrossExchangeMM`.

use std::collections::HashMap;

use crate::book::ConsolidatedBook;
use crate::market_maker::common::{self, MarketMakerStats, QuoteDecision, SharedMmParams};
use crate::risk::RiskManager;
use crate::types::{Fixed, Side, Symbol, VenueId};
use crate::venue::VenueManager;

#[derive(Clone, Copy, Debug)]
pub struct MarketMakerParams {
    pub shared: SharedMmParams,
    pub min_spread_bps: f64,
    pub target_spread_bps: f64,
    pub max_spread_bps: f64,
}

impl Default for MarketMakerParams {
    fn default() -> Self {
        Self { shared: SharedMmParams::default(), min_spread_bps: 5.0, target_spread_bps: 10.0, max_spread_bps: 50.0 }
    }
}

/// Quotes the NBBO mid with a spread clamped toward the observed NBBO
/// spread and an inventory-proportional skew.
pub struct MarketMaker {
    params: MarketMakerParams,
    stats: MarketMakerStats,
    position: f64,
    pub enabled: bool,
}

impl MarketMaker {
    pub fn new(params: MarketMakerParams) -> Self {
        Self { params, stats: MarketMakerStats::default(), position: 0.0, enabled: false }
    }

    pub fn stats(&self) -> MarketMakerStats {
        self.stats
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn compute_quotes(&self, book: &ConsolidatedBook, manager: &VenueManager) -> QuoteDecision {
        if !self.enabled {
            return QuoteDecision::default();
        }

        let nbbo = book.nbbo();
        let Some(fair_value) = nbbo.mid_price() else {
            return QuoteDecision::default();
        };

        let nbbo_spread_bps = nbbo.spread_bps().unwrap_or(self.params.target_spread_bps);
        let half_spread_bps = (self.params.min_spread_bps / 2.0).max((nbbo_spread_bps / 2.0).min(self.params.max_spread_bps / 2.0));

        common::build_quotes(fair_value, half_spread_bps, self.position, &self.params.shared, manager, nbbo.best_bid_venue, nbbo.best_ask_venue)
    }

    pub async fn send_quotes(&mut self, decision: &QuoteDecision, manager: &VenueManager, symbol: &Symbol, risk: &mut RiskManager, mid_price: Option<Fixed>, open_orders: &HashMap<VenueId, u32>) {
        let sent = common::send_quotes(decision, manager, symbol, risk, mid_price, open_orders).await;
        self.stats.quotes_sent += sent;
    }

    pub async fn hedge_fill(&mut self, fill_venue: VenueId, fill_side: Side, fill_qty: Fixed, manager: &VenueManager, book: &ConsolidatedBook, symbol: &Symbol, risk: &mut RiskManager, open_orders: &HashMap<VenueId, u32>) -> bool {
        let hedged = common::hedge_fill(fill_venue, fill_side, fill_qty, &self.params.shared, manager, book, symbol, risk, open_orders).await;
        if hedged {
            self.stats.hedges_sent += 1;
        }
        hedged
    }

    pub fn on_fill(&mut self, side: Side, quantity: Fixed, _price: Fixed) {
        self.stats.fills += 1;
        let qty = crate::types::from_fixed(quantity);
        self.position += side.sign() as f64 * qty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Symbol, Tick, to_fixed};

    fn tick(bid: f64, ask: f64) -> Tick {
        Tick { best_bid: to_fixed(bid), best_bid_qty: to_fixed(1.0), best_ask: to_fixed(ask), best_ask_qty: to_fixed(1.0), last_price: None, last_qty: None, local_timestamp: 0 }
    }

    /// Scenario: market maker disabled.
    /// Expected: compute_quotes returns should_quote = false regardless of
    /// book state.
    #[test]
    fn disabled_maker_never_quotes() {
        let mut book = ConsolidatedBook::new(Symbol::new("BTC", "USDT"));
        book.update(VenueId::Binance, &tick(100.0, 100.2));
        let manager = VenueManager::new();
        let maker = MarketMaker::new(MarketMakerParams::default());
        assert!(!maker.compute_quotes(&book, &manager).should_quote);
    }

    /// Scenario: enabled maker with a valid NBBO mid and no registered
    /// venues (so prefer_lowest_latency's fastest_venue is None, falling
    /// back to the NBBO bid venue).
    /// Expected: should_quote is true, targeting the NBBO bid venue.
    #[test]
    fn enabled_maker_quotes_nbbo_bid_venue_fallback() {
        let mut book = ConsolidatedBook::new(Symbol::new("BTC", "USDT"));
        book.update(VenueId::Binance, &tick(100.0, 100.2));
        let manager = VenueManager::new();
        let mut maker = MarketMaker::new(MarketMakerParams::default());
        maker.enabled = true;
        let decision = maker.compute_quotes(&book, &manager);
        assert!(decision.should_quote);
        assert!(decision.quotes.contains_key(&VenueId::Binance));
    }

    /// Scenario: on_fill records a buy then a sell of different sizes.
    /// Expected: position nets to the signed sum, fills counter increments
    /// per call.
    #[test]
    fn on_fill_updates_signed_position() {
        let mut maker = MarketMaker::new(MarketMakerParams::default());
        maker.on_fill(Side::Buy, to_fixed(0.5), to_fixed(100.0));
        maker.on_fill(Side::Sell, to_fixed(0.2), to_fixed(100.5));
        assert!((maker.position() - 0.3).abs() < 1e-9);
        assert_eq!(maker.stats().fills, 2);
    }
}
