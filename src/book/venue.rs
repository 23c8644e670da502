//! Per-venue top-of-book state (§4.1).

use crate::types::{Fixed, Tick, Timestamp};

/// Top-of-book state for a single venue, updated from each tick.
///
/// Invariant: if both sides are present, `best_bid < best_ask`; a crossed
/// single-venue book is considered invalid and the arbitrage path never
/// treats it as a leg.
#[derive(Clone, Copy, Debug, Default)]
pub struct VenueBook {
    pub best_bid: Fixed,
    pub best_bid_qty: Fixed,
    pub best_ask: Fixed,
    pub best_ask_qty: Fixed,
    pub last_update_ts: Timestamp,
}

impl VenueBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the four top-of-book fields from a tick and stamp the
    /// local receive time.
    pub fn update(&mut self, tick: &Tick) {
        self.best_bid = tick.best_bid;
        self.best_bid_qty = tick.best_bid_qty;
        self.best_ask = tick.best_ask;
        self.best_ask_qty = tick.best_ask_qty;
        self.last_update_ts = tick.local_timestamp;
    }

    /// Integer-division mid price; undefined (`None`) when either side is
    /// zero (absent).
    pub fn mid_price(&self) -> Option<Fixed> {
        if self.best_bid > 0 && self.best_ask > 0 {
            Some((self.best_bid + self.best_ask) / 2)
        } else {
            None
        }
    }

    /// Spread in basis points; undefined when mid is absent or <= 0.
    pub fn spread_bps(&self) -> Option<f64> {
        let mid = self.mid_price()?;
        if mid <= 0 {
            return None;
        }
        Some((self.best_ask - self.best_bid) as f64 * 10_000.0 / mid as f64)
    }

    /// A book with both sides present is valid iff not crossed. An empty
    /// book (either side absent) is considered valid.
    pub fn is_valid(&self) -> bool {
        if self.best_bid > 0 && self.best_ask > 0 {
            self.best_bid < self.best_ask
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::to_fixed;

    fn tick(bid: f64, bid_qty: f64, ask: f64, ask_qty: f64, ts: i64) -> Tick {
        Tick {
            best_bid: to_fixed(bid),
            best_bid_qty: to_fixed(bid_qty),
            best_ask: to_fixed(ask),
            best_ask_qty: to_fixed(ask_qty),
            last_price: None,
            last_qty: None,
            local_timestamp: ts,
        }
    }

    /// Scenario: apply a tick to an empty book.
    /// Expected: top-of-book fields match the tick, last_update_ts stamped.
    #[test]
    fn update_overwrites_top_of_book() {
        let mut book = VenueBook::new();
        book.update(&tick(100.0, 1.0, 100.2, 1.0, 42));
        assert_eq!(book.best_bid, to_fixed(100.0));
        assert_eq!(book.best_ask, to_fixed(100.2));
        assert_eq!(book.last_update_ts, 42);
    }

    /// Scenario: replay a sequence of ticks.
    /// Expected: the book equals the last seen tick's top-of-book fields
    /// (universal invariant from §8).
    #[test]
    fn replay_matches_last_tick() {
        let mut book = VenueBook::new();
        book.update(&tick(100.0, 1.0, 100.2, 1.0, 1));
        book.update(&tick(100.05, 2.0, 100.25, 0.5, 2));
        book.update(&tick(99.9, 1.5, 100.1, 0.2, 3));
        assert_eq!(book.best_bid, to_fixed(99.9));
        assert_eq!(book.best_ask, to_fixed(100.1));
        assert_eq!(book.last_update_ts, 3);
    }

    /// Scenario: mid price on a two-sided book.
    /// Expected: integer-division mid, matching scenario 1's NBBO
    /// component numbers.
    #[test]
    fn mid_price_integer_division() {
        let mut book = VenueBook::new();
        book.update(&tick(100.0, 1.0, 100.2, 1.0, 0));
        assert_eq!(book.mid_price(), Some((to_fixed(100.0) + to_fixed(100.2)) / 2));
    }

    /// Scenario: one side absent (zero).
    /// Expected: mid_price and spread_bps are None.
    #[test]
    fn mid_and_spread_undefined_when_one_sided() {
        let mut book = VenueBook::new();
        book.update(&tick(100.0, 1.0, 0.0, 0.0, 0));
        assert_eq!(book.mid_price(), None);
        assert_eq!(book.spread_bps(), None);
    }

    /// Scenario: a crossed book (bid >= ask).
    /// Expected: is_valid() is false.
    #[test]
    fn crossed_book_is_invalid() {
        let mut book = VenueBook::new();
        book.update(&tick(100.5, 1.0, 100.2, 1.0, 0));
        assert!(!book.is_valid());
    }

    /// Scenario: an empty (never-updated) book.
    /// Expected: is_valid() is true.
    #[test]
    fn empty_book_is_valid() {
        let book = VenueBook::new();
        assert!(book.is_valid());
    }
}
