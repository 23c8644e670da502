//! Multi-venue risk manager (§4.7), grounded in `risk/manager.py`.
//! Adds an explicit `max_open_orders` gate: the Python original declares
//! the limit but never checks it.

use std::collections::HashMap;

use tracing::{error, warn};

use crate::types::{Fixed, RiskMetrics, RiskStatus, Side, VenueId, from_fixed};

#[derive(Clone, Copy, Debug)]
pub struct RiskLimits {
    pub max_position_per_venue: f64,
    pub max_total_position: f64,
    pub max_loss_per_trade: f64,
    pub max_daily_loss: f64,
    pub max_drawdown: f64,
    pub max_order_size: f64,
    pub max_order_value: f64,
    pub max_orders_per_second: u32,
    pub max_price_deviation_bps: f64,
    pub max_open_orders: u32,
}

impl RiskLimits {
    pub fn default_profile() -> Self {
        Self {
            max_position_per_venue: 1.0,
            max_total_position: 3.0,
            max_loss_per_trade: 100.0,
            max_daily_loss: 1000.0,
            max_drawdown: 2000.0,
            max_order_size: 0.5,
            max_order_value: 10_000.0,
            max_orders_per_second: 10,
            max_price_deviation_bps: 100.0,
            max_open_orders: 20,
        }
    }

    pub fn conservative() -> Self {
        Self { max_position_per_venue: 0.5, max_total_position: 1.0, max_loss_per_trade: 50.0, max_daily_loss: 500.0, max_order_size: 0.1, ..Self::default_profile() }
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self::default_profile()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VenuePosition {
    pub quantity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub avg_entry_price: f64,
}

/// Ordered pre-trade rejection reasons. `Allowed` carries no payload; the
/// rest name the first failing rule, matching the original's
/// `(allowed, reason)` contract.
#[derive(Clone, Debug, PartialEq)]
pub enum RiskDecision {
    Allowed,
    Denied(String),
}

impl RiskDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskDecision::Allowed)
    }
}

pub struct RiskManager {
    limits: RiskLimits,
    positions: HashMap<VenueId, VenuePosition>,
    metrics: RiskMetrics,
    kill_switch_active: bool,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits, positions: HashMap::new(), metrics: RiskMetrics::default(), kill_switch_active: false }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn metrics(&self) -> RiskMetrics {
        self.metrics
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch_active
    }

    pub fn total_position(&self) -> f64 {
        self.positions.values().map(|p| p.quantity).sum()
    }

    pub fn position(&self, venue: VenueId) -> f64 {
        self.positions.get(&venue).map(|p| p.quantity).unwrap_or(0.0)
    }

    /// Ordered pre-trade gate (§4.7): first failure wins. `open_orders`
    /// is supplied by the caller (the orchestrator tracks per-venue open
    /// order counts); this manager owns no order book of its own.
    pub fn check_order(&self, venue: VenueId, side: Side, quantity: f64, price: f64, mid_price: Option<f64>, open_orders: u32) -> RiskDecision {
        if self.kill_switch_active {
            return RiskDecision::Denied("kill switch active".into());
        }

        if quantity > self.limits.max_order_size {
            return RiskDecision::Denied(format!("order size {quantity} exceeds limit {}", self.limits.max_order_size));
        }

        let order_value = quantity * price;
        if order_value > self.limits.max_order_value {
            return RiskDecision::Denied(format!("order value ${order_value:.2} exceeds limit ${}", self.limits.max_order_value));
        }

        let signed = if side == Side::Buy { quantity } else { -quantity };
        let new_venue_position = self.position(venue) + signed;
        if new_venue_position.abs() > self.limits.max_position_per_venue {
            return RiskDecision::Denied("would exceed per-venue position limit".into());
        }

        let total_after = self.total_position() + signed;
        if total_after.abs() > self.limits.max_total_position {
            return RiskDecision::Denied("would exceed total position limit".into());
        }

        if let Some(mid) = mid_price {
            if mid > 0.0 {
                let deviation_bps = (price - mid).abs() / mid * 10_000.0;
                if deviation_bps > self.limits.max_price_deviation_bps {
                    return RiskDecision::Denied(format!("price deviation {deviation_bps:.1} bps exceeds limit"));
                }
            }
        }

        if self.metrics.orders_this_second >= self.limits.max_orders_per_second {
            return RiskDecision::Denied("rate limit exceeded".into());
        }

        if open_orders >= self.limits.max_open_orders {
            return RiskDecision::Denied("open order count exceeds limit".into());
        }

        RiskDecision::Allowed
    }

    /// Record a fill: weighted-average entry on same-direction adds,
    /// realized PnL on reductions, with any overshoot past zero opening a
    /// new position at the fill price.
    pub fn record_fill(&mut self, venue: VenueId, side: Side, quantity: f64, price: f64) {
        let pos = self.positions.entry(venue).or_default();

        match side {
            Side::Buy => {
                if pos.quantity >= 0.0 {
                    let total_value = pos.quantity * pos.avg_entry_price + quantity * price;
                    pos.quantity += quantity;
                    if pos.quantity > 0.0 {
                        pos.avg_entry_price = total_value / pos.quantity;
                    }
                } else {
                    let realized = (pos.avg_entry_price - price) * quantity;
                    pos.realized_pnl += realized;
                    pos.quantity += quantity;
                    if pos.quantity > 0.0 {
                        pos.avg_entry_price = price;
                    }
                }
            }
            Side::Sell => {
                if pos.quantity <= 0.0 {
                    let total_value = pos.quantity.abs() * pos.avg_entry_price + quantity * price;
                    pos.quantity -= quantity;
                    if pos.quantity < 0.0 {
                        pos.avg_entry_price = total_value / pos.quantity.abs();
                    }
                } else {
                    let realized = (price - pos.avg_entry_price) * quantity;
                    pos.realized_pnl += realized;
                    pos.quantity -= quantity;
                    if pos.quantity < 0.0 {
                        pos.avg_entry_price = price;
                    }
                }
            }
        }

        self.update_metrics();
    }

    pub fn update_mark_price(&mut self, venue: VenueId, mark_price: f64) {
        let Some(pos) = self.positions.get_mut(&venue) else { return };

        pos.unrealized_pnl = if pos.quantity > 0.0 {
            (mark_price - pos.avg_entry_price) * pos.quantity
        } else if pos.quantity < 0.0 {
            (pos.avg_entry_price - mark_price) * pos.quantity.abs()
        } else {
            0.0
        };

        self.update_metrics();
    }

    fn update_metrics(&mut self) {
        self.metrics.total_position = self.positions.values().map(|p| p.quantity).sum();
        self.metrics.total_realized_pnl = self.positions.values().map(|p| p.realized_pnl).sum();
        self.metrics.total_unrealized_pnl = self.positions.values().map(|p| p.unrealized_pnl).sum();

        let total_pnl = self.metrics.total_realized_pnl + self.metrics.total_unrealized_pnl;
        self.metrics.daily_pnl = total_pnl;

        if total_pnl > self.metrics.peak_pnl {
            self.metrics.peak_pnl = total_pnl;
        }
        self.metrics.drawdown = self.metrics.peak_pnl - total_pnl;

        self.check_risk_status();
    }

    fn check_risk_status(&mut self) {
        if self.metrics.daily_pnl < -self.limits.max_daily_loss {
            self.metrics.status = RiskStatus::KillSwitch;
            self.kill_switch_active = true;
            error!(loss = self.metrics.daily_pnl, "KILL SWITCH: daily loss limit breached");
            return;
        }

        if self.metrics.drawdown > self.limits.max_drawdown {
            self.metrics.status = RiskStatus::KillSwitch;
            self.kill_switch_active = true;
            error!(drawdown = self.metrics.drawdown, "KILL SWITCH: drawdown limit breached");
            return;
        }

        if self.metrics.daily_pnl < -self.limits.max_daily_loss * 0.8 {
            self.metrics.status = RiskStatus::Warning;
            warn!(loss = self.metrics.daily_pnl, "approaching daily loss limit");
        } else if self.metrics.drawdown > self.limits.max_drawdown * 0.8 {
            self.metrics.status = RiskStatus::Warning;
            warn!(drawdown = self.metrics.drawdown, "approaching drawdown limit");
        } else {
            self.metrics.status = RiskStatus::Ok;
        }
    }

    pub fn trigger_kill_switch(&mut self, reason: &str) {
        self.kill_switch_active = true;
        self.metrics.status = RiskStatus::KillSwitch;
        error!(reason, "KILL SWITCH triggered");
    }

    pub fn reset_kill_switch(&mut self) {
        self.kill_switch_active = false;
        self.metrics.status = RiskStatus::Ok;
        warn!("kill switch reset");
    }

    pub fn reset_daily_metrics(&mut self) {
        self.metrics.daily_pnl = 0.0;
        self.metrics.peak_pnl = 0.0;
        self.metrics.drawdown = 0.0;
        self.metrics.orders_this_second = 0;
        for pos in self.positions.values_mut() {
            pos.realized_pnl = 0.0;
        }
        warn!("daily risk metrics reset");
    }

    pub fn increment_order_count(&mut self) {
        self.metrics.orders_this_second += 1;
    }

    pub fn reset_order_count(&mut self) {
        self.metrics.orders_this_second = 0;
    }
}

/// Convenience conversion from fixed-point order fields, used by the
/// orchestrator when it has a `Fixed` price/quantity straight off an
/// `OrderRequest`.
pub fn check_order_fixed(manager: &RiskManager, venue: VenueId, side: Side, quantity: Fixed, price: Fixed, mid_price: Option<Fixed>, open_orders: u32) -> RiskDecision {
    manager.check_order(venue, side, from_fixed(quantity), from_fixed(price), mid_price.map(from_fixed), open_orders)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: kill switch active.
    /// Expected: check_order denies before evaluating any other rule.
    #[test]
    fn kill_switch_denies_first() {
        let mut rm = RiskManager::new(RiskLimits::default_profile());
        rm.trigger_kill_switch("test");
        let decision = rm.check_order(VenueId::Binance, Side::Buy, 0.01, 100.0, None, 0);
        assert_eq!(decision, RiskDecision::Denied("kill switch active".into()));
    }

    /// Scenario: order size exceeds max_order_size.
    /// Expected: denied with the size-limit reason, independent of other
    /// limits being satisfied.
    #[test]
    fn denies_oversized_order() {
        let rm = RiskManager::new(RiskLimits::default_profile());
        let decision = rm.check_order(VenueId::Binance, Side::Buy, 10.0, 100.0, None, 0);
        assert!(!decision.is_allowed());
    }

    /// Scenario: open_orders at the configured max_open_orders ceiling,
    /// every earlier gate satisfied.
    /// Expected: denied by the max_open_orders gate specifically — the gap
    /// closed relative to the Python original.
    #[test]
    fn denies_when_open_orders_at_limit() {
        let rm = RiskManager::new(RiskLimits::default_profile());
        let decision = rm.check_order(VenueId::Binance, Side::Buy, 0.01, 100.0, None, 20);
        assert_eq!(decision, RiskDecision::Denied("open order count exceeds limit".into()));
    }

    /// Scenario: three buys of equal size and price on one venue.
    /// Expected: avg_entry_price equals the fill price, position sums
    /// linearly.
    #[test]
    fn record_fill_weighted_average_same_direction() {
        let mut rm = RiskManager::new(RiskLimits::default_profile());
        rm.record_fill(VenueId::Binance, Side::Buy, 0.1, 100.0);
        rm.record_fill(VenueId::Binance, Side::Buy, 0.1, 110.0);
        assert!((rm.position(VenueId::Binance) - 0.2).abs() < 1e-9);
        let pos = rm.positions[&VenueId::Binance];
        assert!((pos.avg_entry_price - 105.0).abs() < 1e-9);
    }

    /// Scenario: long 0.2 @ 100, then sell 0.1 @ 110 (partial close).
    /// Expected: realized_pnl = (110-100)*0.1 = 1.0, remaining position
    /// 0.1 still long at the original average price.
    #[test]
    fn record_fill_realizes_pnl_on_partial_close() {
        let mut rm = RiskManager::new(RiskLimits::default_profile());
        rm.record_fill(VenueId::Binance, Side::Buy, 0.2, 100.0);
        rm.record_fill(VenueId::Binance, Side::Sell, 0.1, 110.0);
        let pos = rm.positions[&VenueId::Binance];
        assert!((pos.realized_pnl - 1.0).abs() < 1e-9);
        assert!((pos.quantity - 0.1).abs() < 1e-9);
    }

    /// Scenario: daily_pnl drops below -max_daily_loss.
    /// Expected: kill switch activates and status becomes KillSwitch.
    #[test]
    fn daily_loss_breach_activates_kill_switch() {
        let mut rm = RiskManager::new(RiskLimits::default_profile());
        rm.record_fill(VenueId::Binance, Side::Buy, 1.0, 100.0);
        rm.record_fill(VenueId::Binance, Side::Sell, 1.0, 100.0 - 1001.0);
        assert!(rm.is_kill_switch_active());
        assert_eq!(rm.metrics().status, RiskStatus::KillSwitch);
    }

    /// Scenario: reset_daily_metrics after accruing realized PnL and
    /// drawdown.
    /// Expected: daily_pnl/peak_pnl/drawdown/orders_this_second all zero,
    /// per-venue realized_pnl cleared.
    #[test]
    fn reset_daily_metrics_clears_accumulated_state() {
        let mut rm = RiskManager::new(RiskLimits::default_profile());
        rm.record_fill(VenueId::Binance, Side::Buy, 0.2, 100.0);
        rm.record_fill(VenueId::Binance, Side::Sell, 0.1, 110.0);
        rm.increment_order_count();
        rm.reset_daily_metrics();
        assert_eq!(rm.metrics().daily_pnl, 0.0);
        assert_eq!(rm.metrics().peak_pnl, 0.0);
        assert_eq!(rm.metrics().drawdown, 0.0);
        assert_eq!(rm.metrics().orders_this_second, 0);
        assert_eq!(rm.positions[&VenueId::Binance].realized_pnl, 0.0);
    }
}
