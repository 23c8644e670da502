//! L2 order book variant (single-venue use): ordered bid/ask maps with
//! depth queries, VWAP, and multi-level imbalance (§4.1).

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::types::{Fixed, Timestamp, now_ns};

/// An aggregated price level: total quantity resting at a price, plus how
/// many individual orders make it up.
#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    pub price: Fixed,
    pub total_quantity: Fixed,
    pub order_count: u32,
    pub last_update: Timestamp,
}

/// Idiomatic substitute for the reference implementation's sorted
/// dictionary: bids keyed by `Reverse<Fixed>` for descending iteration,
/// asks keyed by `Fixed` for ascending iteration. Both give O(log n)
/// insert/remove and O(1) access to the best level via `first_key_value`.
#[derive(Clone, Debug, Default)]
pub struct L2Book {
    bids: BTreeMap<Reverse<Fixed>, PriceLevel>,
    asks: BTreeMap<Fixed, PriceLevel>,
}

impl L2Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a bid level. Quantity <= 0 deletes the level.
    pub fn update_bid(&mut self, price: Fixed, quantity: Fixed) {
        if quantity <= 0 {
            self.bids.remove(&Reverse(price));
        } else {
            self.bids.insert(Reverse(price), PriceLevel { price, total_quantity: quantity, order_count: 1, last_update: now_ns() });
        }
    }

    /// Upsert an ask level. Quantity <= 0 deletes the level.
    pub fn update_ask(&mut self, price: Fixed, quantity: Fixed) {
        if quantity <= 0 {
            self.asks.remove(&price);
        } else {
            self.asks.insert(price, PriceLevel { price, total_quantity: quantity, order_count: 1, last_update: now_ns() });
        }
    }

    /// Replace the whole book from a full snapshot of (price, quantity)
    /// pairs.
    pub fn apply_snapshot(&mut self, bids: &[(Fixed, Fixed)], asks: &[(Fixed, Fixed)]) {
        self.bids.clear();
        self.asks.clear();
        for &(price, qty) in bids {
            if qty > 0 {
                self.bids.insert(Reverse(price), PriceLevel { price, total_quantity: qty, order_count: 1, last_update: now_ns() });
            }
        }
        for &(price, qty) in asks {
            if qty > 0 {
                self.asks.insert(price, PriceLevel { price, total_quantity: qty, order_count: 1, last_update: now_ns() });
            }
        }
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.values().next().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.values().next().copied()
    }

    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// VWAP for lifting asks with a target quantity, walking levels
    /// best-first. `None` if no quantity could be filled.
    pub fn vwap_buy(&self, target_qty: Fixed) -> Option<Fixed> {
        Self::walk_vwap(self.asks.values(), target_qty)
    }

    /// VWAP for hitting bids with a target quantity, walking levels
    /// best-first.
    pub fn vwap_sell(&self, target_qty: Fixed) -> Option<Fixed> {
        Self::walk_vwap(self.bids.values(), target_qty)
    }

    fn walk_vwap<'a>(levels: impl Iterator<Item = &'a PriceLevel>, target_qty: Fixed) -> Option<Fixed> {
        let mut remaining = target_qty;
        let mut total_value: i128 = 0;
        let mut total_qty: i64 = 0;
        for level in levels {
            if remaining <= 0 {
                break;
            }
            let fill = remaining.min(level.total_quantity);
            total_value += level.price as i128 * fill as i128;
            total_qty += fill;
            remaining -= fill;
        }
        if total_qty == 0 {
            None
        } else {
            Some((total_value / total_qty as i128) as Fixed)
        }
    }

    /// Multi-level imbalance over the first `levels` levels on each side:
    /// (Σbid_qty − Σask_qty) / (Σbid_qty + Σask_qty). Zero when both sides
    /// are empty.
    pub fn imbalance(&self, levels: usize) -> f64 {
        let bid_vol: i64 = self.bids.values().take(levels).map(|l| l.total_quantity).sum();
        let ask_vol: i64 = self.asks.values().take(levels).map(|l| l.total_quantity).sum();
        let total = bid_vol + ask_vol;
        if total == 0 {
            0.0
        } else {
            (bid_vol - ask_vol) as f64 / total as f64
        }
    }

    /// Valid (not crossed) iff empty on either side or best_bid < best_ask.
    pub fn is_valid(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => b.price < a.price,
            _ => true,
        }
    }
}
