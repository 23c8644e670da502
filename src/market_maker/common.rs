//! Shared plumbing between the basic and Avellaneda-Stoikov quote engines
//! (§4.6): position/venue gating, quote submission, and post-fill hedging.
//! Both variants differ only in how they derive `fair_value` and
//! `half_spread_bps`; everything downstream of that is identical.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::book::ConsolidatedBook;
use crate::risk::{RiskDecision, RiskManager, check_order_fixed};
use crate::types::{Fixed, OrderRequest, OrderType, Side, Symbol, TimeInForce, VenueId, from_fixed, to_fixed};
use crate::venue::VenueManager;

/// Parameters shared by both quote engine variants.
#[derive(Clone, Copy, Debug)]
pub struct SharedMmParams {
    pub max_position: f64,
    pub order_size: f64,
    pub inventory_skew_factor: f64,
    pub prefer_lowest_latency: bool,
    pub quote_on_all_venues: bool,
    pub hedge_on_fill: bool,
    pub hedge_venue: Option<VenueId>,
}

impl Default for SharedMmParams {
    fn default() -> Self {
        Self {
            max_position: 1.0,
            order_size: 0.1,
            inventory_skew_factor: 0.5,
            prefer_lowest_latency: true,
            quote_on_all_venues: false,
            hedge_on_fill: true,
            hedge_venue: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MarketMakerStats {
    pub quotes_sent: u64,
    pub fills: u64,
    pub hedges_sent: u64,
    pub pnl_realized: f64,
}

/// (bid_price, ask_price, size) per venue to quote on; a price of 0 means
/// "do not place" on that side.
#[derive(Clone, Debug, Default)]
pub struct QuoteDecision {
    pub should_quote: bool,
    pub quotes: HashMap<VenueId, (Fixed, Fixed, Fixed)>,
}

/// Given a fair value and half-spread already derived by the caller's
/// model, apply inventory skew, position gating, and venue selection.
pub fn build_quotes(fair_value: Fixed, half_spread_bps: f64, position: f64, params: &SharedMmParams, manager: &VenueManager, nbbo_bid_venue: Option<VenueId>, nbbo_ask_venue: Option<VenueId>) -> QuoteDecision {
    let inventory_skew_bps = position * params.inventory_skew_factor * 10.0;

    let bid_offset_bps = half_spread_bps + inventory_skew_bps;
    let ask_offset_bps = half_spread_bps - inventory_skew_bps;

    let mut bid_price = to_fixed(from_fixed(fair_value) * (1.0 - bid_offset_bps / 10_000.0));
    let mut ask_price = to_fixed(from_fixed(fair_value) * (1.0 + ask_offset_bps / 10_000.0));

    if bid_price >= ask_price {
        bid_price = to_fixed(from_fixed(fair_value) * 0.9999);
        ask_price = to_fixed(from_fixed(fair_value) * 1.0001);
    }

    let can_buy = position < params.max_position;
    let can_sell = position > -params.max_position;

    let order_size = to_fixed(params.order_size);
    let mut quotes = HashMap::new();

    if params.quote_on_all_venues {
        for venue in manager.connected_venues() {
            quotes.insert(venue, (if can_buy { bid_price } else { 0 }, if can_sell { ask_price } else { 0 }, order_size));
        }
    } else {
        let best_venue = if params.prefer_lowest_latency {
            manager.fastest_venue().or_else(|| nbbo_bid_venue.or(nbbo_ask_venue))
        } else {
            nbbo_bid_venue.or(nbbo_ask_venue)
        };
        if let Some(venue) = best_venue {
            quotes.insert(venue, (if can_buy { bid_price } else { 0 }, if can_sell { ask_price } else { 0 }, order_size));
        }
    }

    QuoteDecision { should_quote: !quotes.is_empty(), quotes }
}

/// Submit a quote decision, firing bid/ask legs concurrently per venue.
/// Each leg is checked against `risk` before it is sent; a denied leg is
/// logged and skipped rather than reaching the venue. Returns the number
/// of legs that placed successfully.
pub async fn send_quotes(decision: &QuoteDecision, manager: &VenueManager, symbol: &Symbol, risk: &mut RiskManager, mid_price: Option<Fixed>, open_orders: &HashMap<VenueId, u32>) -> u64 {
    if !decision.should_quote {
        return 0;
    }

    let mut sent = 0u64;
    for (&venue, &(bid_price, ask_price, size)) in &decision.quotes {
        let open = open_orders.get(&venue).copied().unwrap_or(0);
        if bid_price > 0 {
            match check_order_fixed(risk, venue, Side::Buy, size, bid_price, mid_price, open) {
                RiskDecision::Allowed => {
                    risk.increment_order_count();
                    let request = OrderRequest { symbol: symbol.clone(), side: Side::Buy, order_type: OrderType::LimitMaker, price: bid_price, quantity: size, time_in_force: TimeInForce::PostOnly };
                    if manager.send_order(venue, request).await.success {
                        sent += 1;
                    }
                }
                RiskDecision::Denied(reason) => warn!(venue = %venue, reason = %reason, "risk denied bid quote"),
            }
        }
        if ask_price > 0 {
            match check_order_fixed(risk, venue, Side::Sell, size, ask_price, mid_price, open) {
                RiskDecision::Allowed => {
                    risk.increment_order_count();
                    let request = OrderRequest { symbol: symbol.clone(), side: Side::Sell, order_type: OrderType::LimitMaker, price: ask_price, quantity: size, time_in_force: TimeInForce::PostOnly };
                    if manager.send_order(venue, request).await.success {
                        sent += 1;
                    }
                }
                RiskDecision::Denied(reason) => warn!(venue = %venue, reason = %reason, "risk denied ask quote"),
            }
        }
    }
    sent
}

/// Post-fill hedge: cross the spread on another venue to flatten the fill.
/// Checked against `risk` before sending, same as `send_quotes`. Returns
/// true on a successful hedge order.
pub async fn hedge_fill(fill_venue: VenueId, fill_side: Side, fill_qty: Fixed, params: &SharedMmParams, manager: &VenueManager, book: &ConsolidatedBook, symbol: &Symbol, risk: &mut RiskManager, open_orders: &HashMap<VenueId, u32>) -> bool {
    if !params.hedge_on_fill {
        return false;
    }

    let hedge_side = fill_side.opposite();
    let mut hedge_venue = params.hedge_venue.filter(|&v| v != fill_venue);

    if hedge_venue.is_none() {
        let is_buy = hedge_side == Side::Buy;
        hedge_venue = book.venues_by_price(is_buy).into_iter().map(|(v, _, _)| v).find(|&v| v != fill_venue);
    }

    let Some(hedge_venue) = hedge_venue else {
        warn!("no hedge venue available");
        return false;
    };

    let Some(venue_book) = book.venue_book(hedge_venue) else {
        return false;
    };

    // Pay up (buy) or accept less (sell) to guarantee the IOC hedge
    // crosses the spread and fills immediately.
    let hedge_price = match hedge_side {
        Side::Buy => (from_fixed(venue_book.best_ask) * 1.001 * crate::types::SCALE as f64).ceil() as Fixed,
        Side::Sell => (from_fixed(venue_book.best_bid) * 0.999 * crate::types::SCALE as f64).floor() as Fixed,
    };

    let open = open_orders.get(&hedge_venue).copied().unwrap_or(0);
    let mid_price = book.nbbo().mid_price();
    match check_order_fixed(risk, hedge_venue, hedge_side, fill_qty, hedge_price, mid_price, open) {
        RiskDecision::Denied(reason) => {
            warn!(venue = %hedge_venue, reason = %reason, "risk denied hedge order");
            false
        }
        RiskDecision::Allowed => {
            risk.increment_order_count();
            let request = OrderRequest { symbol: symbol.clone(), side: hedge_side, order_type: OrderType::Limit, price: hedge_price, quantity: fill_qty, time_in_force: TimeInForce::Ioc };
            info!(venue = %hedge_venue, side = ?hedge_side, price = from_fixed(hedge_price), qty = from_fixed(fill_qty), "sending hedge order");
            manager.send_order(hedge_venue, request).await.success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::to_fixed;

    /// Scenario: flat position, quote_on_all disabled, no connected venues.
    /// Expected: should_quote is false (no fastest_venue and no NBBO venue
    /// fallback).
    #[test]
    fn build_quotes_empty_without_any_venue() {
        let manager = VenueManager::new();
        let params = SharedMmParams::default();
        let decision = build_quotes(to_fixed(100.0), 5.0, 0.0, &params, &manager, None, None);
        assert!(!decision.should_quote);
    }

    /// Scenario: position at the long limit.
    /// Expected: can_buy gates to false, bid price in the sole quote is 0.
    #[test]
    fn position_at_max_disables_buy_side() {
        let manager = VenueManager::new();
        let params = SharedMmParams { quote_on_all_venues: false, prefer_lowest_latency: false, max_position: 1.0, ..SharedMmParams::default() };
        let decision = build_quotes(to_fixed(100.0), 5.0, 1.0, &params, &manager, Some(VenueId::Binance), None);
        assert!(decision.should_quote);
        let (bid, ask, _) = decision.quotes[&VenueId::Binance];
        assert_eq!(bid, 0);
        assert!(ask > 0);
    }

    /// Scenario: bid/ask collapse guard when skew pushes bid >= ask.
    /// Expected: both sides recomputed from the 0.9999/1.0001 fallback band.
    #[test]
    fn collapsed_spread_falls_back_to_fixed_band() {
        let manager = VenueManager::new();
        let params = SharedMmParams { inventory_skew_factor: 1000.0, prefer_lowest_latency: false, ..SharedMmParams::default() };
        let decision = build_quotes(to_fixed(100.0), 1.0, 5.0, &params, &manager, Some(VenueId::Binance), None);
        let (bid, ask, _) = decision.quotes[&VenueId::Binance];
        assert!(bid < ask);
        assert_eq!(bid, to_fixed(100.0 * 0.9999));
        assert_eq!(ask, to_fixed(100.0 * 1.0001));
    }
}
