//! Avellaneda-Stoikov quote engine variant (§4.6.1): replaces the basic
//! engine's NBBO-spread-clamp with a reservation price and model-derived
//! optimal spread, driven by a realized-volatility estimate over NBBO mid
//! returns.

use std::collections::HashMap;

use crate::book::ConsolidatedBook;
use crate::market_maker::common::{self, MarketMakerStats, QuoteDecision, SharedMmParams};
use crate::math::ewma::SampledEwmaVol;
use crate::risk::RiskManager;
use crate::types::{Fixed, Side, Symbol, VenueId, from_fixed, to_fixed};
use crate::venue::VenueManager;

#[derive(Clone, Copy, Debug)]
pub struct AvellanedaStoikovParams {
    pub shared: SharedMmParams,
    /// Risk aversion (γ).
    pub gamma: f64,
    /// Order book liquidity parameter (k) in the optimal-spread term.
    pub k: f64,
    /// Trading horizon in seconds; time-remaining fraction is measured
    /// against this from the first observed timestamp.
    pub horizon_secs: f64,
    pub min_spread_bps: f64,
    pub max_spread_bps: f64,
    pub vol_lambda: f64,
    pub vol_min_samples: u32,
}

impl Default for AvellanedaStoikovParams {
    fn default() -> Self {
        Self { shared: SharedMmParams::default(), gamma: 0.1, k: 1.5, horizon_secs: 3600.0, min_spread_bps: 5.0, max_spread_bps: 50.0, vol_lambda: 0.94, vol_min_samples: 30 }
    }
}

pub struct AvellanedaStoikov {
    params: AvellanedaStoikovParams,
    stats: MarketMakerStats,
    position: f64,
    vol: SampledEwmaVol,
    start_ts_ns: Option<i64>,
    pub enabled: bool,
}

impl AvellanedaStoikov {
    pub fn new(params: AvellanedaStoikovParams) -> Self {
        let vol = SampledEwmaVol::new(params.vol_lambda, params.vol_min_samples);
        Self { params, stats: MarketMakerStats::default(), position: 0.0, vol, start_ts_ns: None, enabled: false }
    }

    pub fn stats(&self) -> MarketMakerStats {
        self.stats
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Time-remaining fraction against the configured horizon, seeded from
    /// the first call's timestamp.
    fn time_remaining_frac(&mut self, now_ns: i64) -> f64 {
        let start = *self.start_ts_ns.get_or_insert(now_ns);
        let elapsed_secs = (now_ns - start) as f64 / 1e9;
        (1.0 - elapsed_secs / self.params.horizon_secs).clamp(0.0, 1.0)
    }

    pub fn compute_quotes(&mut self, book: &ConsolidatedBook, manager: &VenueManager) -> QuoteDecision {
        if !self.enabled {
            return QuoteDecision::default();
        }

        let nbbo = book.nbbo();
        let Some(mid) = nbbo.mid_price() else {
            return QuoteDecision::default();
        };

        self.vol.update(from_fixed(mid), nbbo.ts / 1_000_000);
        let sigma = if self.vol.is_valid() { self.vol.sigma() } else { 0.0 };
        let sigma_sq = sigma * sigma;

        let t_remaining = self.time_remaining_frac(nbbo.ts);
        let gamma = self.params.gamma;

        let reservation_price = from_fixed(mid) - self.position * gamma * sigma_sq * t_remaining;

        let optimal_spread = gamma * sigma_sq * t_remaining + (2.0 / gamma) * (1.0 + gamma / self.params.k).ln();
        let half_spread_bps = ((optimal_spread * 10_000.0) / 2.0).clamp(self.params.min_spread_bps / 2.0, self.params.max_spread_bps / 2.0);

        let fair_value = to_fixed(reservation_price);

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
        self.position += side.sign() as f64 * from_fixed(quantity);
    }
}
