//! Cross-venue consolidated book: NBBO aggregation, arbitrage detection,
//! and venue ranking (§4.2).

use std::collections::HashMap;

use crate::book::venue::VenueBook;
use crate::types::{ArbitrageOpportunity, Fixed, Symbol, Timestamp, VenueId, Tick, now_ns};

/// National (cross-venue) Best Bid and Offer, recomputed after every
/// update. Ties are broken by venue registration order, not arrival order,
/// so NBBO is reproducible under replay.
#[derive(Clone, Debug, Default)]
pub struct Nbbo {
    pub best_bid: Fixed,
    pub best_bid_qty: Fixed,
    pub best_bid_venue: Option<VenueId>,
    pub best_ask: Fixed,
    pub best_ask_qty: Fixed,
    pub best_ask_venue: Option<VenueId>,
    pub ts: Timestamp,
}

impl Nbbo {
    /// Integer-division mid of the NBBO top, or `None` if either side is
    /// absent.
    pub fn mid_price(&self) -> Option<Fixed> {
        if self.best_bid > 0 && self.best_ask > 0 {
            Some((self.best_bid + self.best_ask) / 2)
        } else {
            None
        }
    }

    pub fn spread_bps(&self) -> Option<f64> {
        let mid = self.mid_price()?;
        if mid <= 0 {
            return None;
        }
        Some((self.best_ask - self.best_bid) as f64 * 10_000.0 / mid as f64)
    }

    /// Crossed iff best_bid >= best_ask > 0 and the two sides are quoted by
    /// different venues. This is an observational condition used for
    /// logging only; it is distinct from `detect`'s arbitrage threshold.
    pub fn is_crossed(&self) -> bool {
        self.best_bid > 0
            && self.best_ask > 0
            && self.best_bid >= self.best_ask
            && self.best_bid_venue != self.best_ask_venue
    }
}

/// Owns one per-venue top-of-book per registered venue for a single symbol
/// and derives the NBBO after every update.
pub struct ConsolidatedBook {
    pub symbol: Symbol,
    books: HashMap<VenueId, VenueBook>,
    /// Insertion order, used to deterministically break NBBO ties.
    registration_order: Vec<VenueId>,
    nbbo: Nbbo,
}

impl ConsolidatedBook {
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol, books: HashMap::new(), registration_order: Vec::new(), nbbo: Nbbo::default() }
    }

    /// Register a venue to track. Idempotent.
    pub fn add_venue(&mut self, venue: VenueId) {
        if !self.books.contains_key(&venue) {
            self.books.insert(venue, VenueBook::new());
            self.registration_order.push(venue);
        }
    }

    pub fn remove_venue(&mut self, venue: VenueId) {
        self.books.remove(&venue);
        self.registration_order.retain(|v| *v != venue);
        self.recompute_nbbo();
    }

    pub fn venue_count(&self) -> usize {
        self.books.len()
    }

    /// Apply a tick from a venue and recompute the NBBO. Registers the
    /// venue first if it was not already tracked.
    pub fn update(&mut self, venue: VenueId, tick: &Tick) {
        self.add_venue(venue);
        if let Some(book) = self.books.get_mut(&venue) {
            book.update(tick);
        }
        self.recompute_nbbo();
    }

    pub fn venue_book(&self, venue: VenueId) -> Option<&VenueBook> {
        self.books.get(&venue)
    }

    pub fn nbbo(&self) -> &Nbbo {
        &self.nbbo
    }

    /// Linear scan over registered venues in registration order: best_bid
    /// is the max bid among venues with bid > 0, best_ask the min ask
    /// among venues with ask > 0. Ties keep the first-registered venue
    /// since later candidates only replace on a strict improvement.
    fn recompute_nbbo(&mut self) {
        let mut best_bid = 0;
        let mut best_bid_qty = 0;
        let mut best_bid_venue = None;
        let mut best_ask = 0;
        let mut best_ask_qty = 0;
        let mut best_ask_venue = None;

        for venue in &self.registration_order {
            let Some(book) = self.books.get(venue) else { continue };

            if book.best_bid > best_bid {
                best_bid = book.best_bid;
                best_bid_qty = book.best_bid_qty;
                best_bid_venue = Some(*venue);
            }
            if book.best_ask > 0 && (best_ask == 0 || book.best_ask < best_ask) {
                best_ask = book.best_ask;
                best_ask_qty = book.best_ask_qty;
                best_ask_venue = Some(*venue);
            }
        }

        self.nbbo = Nbbo {
            best_bid,
            best_bid_qty,
            best_bid_venue,
            best_ask,
            best_ask_qty,
            best_ask_venue,
            ts: now_ns(),
        };
    }

    /// Find the lowest non-zero ask (buy leg) and the highest bid (sell
    /// leg) across distinct venues. Returns `None` unless there are at
    /// least two venues, the legs are on different venues, sell > buy, and
    /// the implied profit meets `min_profit_bps`.
    pub fn detect_arbitrage(&self, min_profit_bps: f64) -> Option<ArbitrageOpportunity> {
        if self.books.len() < 2 {
            return None;
        }

        let mut best_buy: Option<(VenueId, Fixed, Fixed)> = None;
        let mut best_sell: Option<(VenueId, Fixed, Fixed)> = None;

        for (&venue, book) in &self.books {
            if book.best_ask > 0 && best_buy.map(|(_, p, _)| book.best_ask < p).unwrap_or(true) {
                best_buy = Some((venue, book.best_ask, book.best_ask_qty));
            }
            if book.best_bid > 0 && best_sell.map(|(_, p, _)| book.best_bid > p).unwrap_or(true) {
                best_sell = Some((venue, book.best_bid, book.best_bid_qty));
            }
        }

        let (buy_venue, buy_price, buy_qty) = best_buy?;
        let (sell_venue, sell_price, sell_qty) = best_sell?;

        if buy_venue == sell_venue || sell_price <= buy_price {
            return None;
        }

        let profit_bps = (sell_price - buy_price) as f64 * 10_000.0 / buy_price as f64;
        if profit_bps < min_profit_bps {
            return None;
        }

        Some(ArbitrageOpportunity {
            symbol: self.symbol.clone(),
            buy_venue,
            sell_venue,
            buy_price,
            sell_price,
            quantity: buy_qty.min(sell_qty),
            expected_profit_bps: profit_bps,
            timestamp: now_ns(),
        })
    }

    /// Venues ranked by price on the relevant side: ascending ask if
    /// `is_buy`, else descending bid. Venues with a zero on that side are
    /// omitted.
    pub fn venues_by_price(&self, is_buy: bool) -> Vec<(VenueId, Fixed, Fixed)> {
        let mut out: Vec<(VenueId, Fixed, Fixed)> = self
            .books
            .iter()
            .filter_map(|(&venue, book)| {
                if is_buy && book.best_ask > 0 {
                    Some((venue, book.best_ask, book.best_ask_qty))
                } else if !is_buy && book.best_bid > 0 {
                    Some((venue, book.best_bid, book.best_bid_qty))
                } else {
                    None
                }
            })
            .collect();

        if is_buy {
            out.sort_by_key(|&(_, price, _)| price);
        } else {
            out.sort_by_key(|&(_, price, _)| std::cmp::Reverse(price));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::to_fixed;

    fn tick(bid: f64, bid_qty: f64, ask: f64, ask_qty: f64) -> Tick {
        Tick {
            best_bid: to_fixed(bid),
            best_bid_qty: to_fixed(bid_qty),
            best_ask: to_fixed(ask),
            best_ask_qty: to_fixed(ask_qty),
            last_price: None,
            last_qty: None,
            local_timestamp: now_ns(),
        }
    }

    /// Scenario 1 from the spec: register A, B, C and feed the documented
    /// ticks.
    /// Expected: NBBO bid=100.1/B, ask=100.15/C, mid=100.125.
    #[test]
    fn scenario_nbbo_formation() {
        let sym = Symbol::new("BTC", "USDT");
        let mut book = ConsolidatedBook::new(sym);
        book.update(VenueId::Binance, &tick(100.0, 1.0, 100.2, 1.0));
        book.update(VenueId::Coinbase, &tick(100.1, 2.0, 100.3, 0.5));
        book.update(VenueId::Kraken, &tick(99.9, 1.0, 100.15, 0.4));

        let nbbo = book.nbbo();
        assert_eq!(nbbo.best_bid, to_fixed(100.1));
        assert_eq!(nbbo.best_bid_venue, Some(VenueId::Coinbase));
        assert_eq!(nbbo.best_ask, to_fixed(100.15));
        assert_eq!(nbbo.best_ask_venue, Some(VenueId::Kraken));
        assert_eq!(nbbo.mid_price(), Some(to_fixed(100.125)));
    }

    /// Scenario 2: with the NBBO above, the arbitrage "buy" leg (C@100.15)
    /// is actually higher than the "sell" leg (B@100.1).
    /// Expected: detect returns None since sell < buy.
    #[test]
    fn scenario_arbitrage_threshold_not_met() {
        let sym = Symbol::new("BTC", "USDT");
        let mut book = ConsolidatedBook::new(sym);
        book.update(VenueId::Binance, &tick(100.0, 1.0, 100.2, 1.0));
        book.update(VenueId::Coinbase, &tick(100.1, 2.0, 100.3, 0.5));
        book.update(VenueId::Kraken, &tick(99.9, 1.0, 100.15, 0.4));

        assert!(book.detect_arbitrage(2.0).is_none());
    }

    /// Scenario 3: A's ask drops to 99.9, B's bid rises to 100.2.
    /// Expected: opportunity(buy=A@99.9, sell=B@100.2, qty=0.3,
    /// profit≈30.03bps) at threshold 2.4 bps.
    #[test]
    fn scenario_arbitrage_hit() {
        let sym = Symbol::new("BTC", "USDT");
        let mut book = ConsolidatedBook::new(sym);
        book.update(VenueId::Binance, &tick(100.0, 1.0, 99.9, 0.5));
        book.update(VenueId::Coinbase, &tick(100.2, 0.3, 100.3, 0.5));
        book.update(VenueId::Kraken, &tick(99.9, 1.0, 100.15, 0.4));

        let opp = book.detect_arbitrage(2.4).expect("expected an opportunity");
        assert_eq!(opp.buy_venue, VenueId::Binance);
        assert_eq!(opp.sell_venue, VenueId::Coinbase);
        assert_eq!(opp.buy_price, to_fixed(99.9));
        assert_eq!(opp.sell_price, to_fixed(100.2));
        assert_eq!(opp.quantity, to_fixed(0.3));
        assert!((opp.expected_profit_bps - 30.03).abs() < 0.1, "bps={}", opp.expected_profit_bps);
    }

    /// Scenario: fewer than two venues registered.
    /// Expected: detect_arbitrage returns None regardless of prices.
    #[test]
    fn detect_requires_at_least_two_venues() {
        let sym = Symbol::new("BTC", "USDT");
        let mut book = ConsolidatedBook::new(sym);
        book.update(VenueId::Binance, &tick(100.0, 1.0, 99.0, 1.0));
        assert!(book.detect_arbitrage(0.0).is_none());
    }

    /// Scenario: NBBO tie-break by registration order, not price arrival.
    /// Expected: first-registered venue keeps the NBBO slot when a later
    /// venue quotes an equal (not better) price.
    #[test]
    fn nbbo_ties_broken_by_registration_order() {
        let sym = Symbol::new("BTC", "USDT");
        let mut book = ConsolidatedBook::new(sym);
        book.add_venue(VenueId::Binance);
        book.add_venue(VenueId::Coinbase);
        book.update(VenueId::Binance, &tick(100.0, 1.0, 100.5, 1.0));
        book.update(VenueId::Coinbase, &tick(100.0, 1.0, 100.5, 1.0));

        assert_eq!(book.nbbo().best_bid_venue, Some(VenueId::Binance));
        assert_eq!(book.nbbo().best_ask_venue, Some(VenueId::Binance));
    }

    /// Scenario: rank venues by ask price ascending for a buy decision.
    /// Expected: lowest ask first, zero-ask venues omitted.
    #[test]
    fn venues_by_price_ascending_for_buy() {
        let sym = Symbol::new("BTC", "USDT");
        let mut book = ConsolidatedBook::new(sym);
        book.update(VenueId::Binance, &tick(0.0, 0.0, 100.5, 1.0));
        book.update(VenueId::Coinbase, &tick(0.0, 0.0, 100.1, 1.0));
        book.update(VenueId::Kraken, &tick(0.0, 0.0, 0.0, 0.0));

        let ranked = book.venues_by_price(true);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, VenueId::Coinbase);
        assert_eq!(ranked[1].0, VenueId::Binance);
    }

    /// Scenario: crossed NBBO observation (distinct from arbitrage
    /// eligibility).
    /// Expected: is_crossed() true when best_bid >= best_ask across two
    /// different venues.
    #[test]
    fn nbbo_crossed_observation() {
        let sym = Symbol::new("BTC", "USDT");
        let mut book = ConsolidatedBook::new(sym);
        book.update(VenueId::Binance, &tick(100.0, 1.0, 99.0, 1.0));
        book.update(VenueId::Coinbase, &tick(98.0, 1.0, 100.5, 1.0));
        assert!(book.nbbo().is_crossed());
    }
}
