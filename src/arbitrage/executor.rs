//! Cross-venue arbitrage executor (§4.5), grounded in
//! `arbitrage/detector.py`'s `ArbitrageExecutor`.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::arbitrage::detector::{ArbitrageConfig, ArbitrageStats};
use crate::risk::{RiskDecision, RiskManager, check_order_fixed};
use crate::types::{ArbitrageOpportunity, OrderRequest, OrderType, Side, TimeInForce, VenueId, from_fixed, to_fixed};
use crate::venue::VenueManager;

/// Fires both legs of a detected opportunity concurrently and reconciles
/// partial fills with a best-effort cancel. Owned and driven exclusively by
/// the orchestrator's single event loop, so the single-flight guard is a
/// plain bool rather than an atomic (§5's no-mutex-needed model).
pub struct ArbitrageExecutor {
    config: ArbitrageConfig,
    stats: ArbitrageStats,
    executing: bool,
}

impl ArbitrageExecutor {
    pub fn new(config: ArbitrageConfig) -> Self {
        Self { config, stats: ArbitrageStats::default(), executing: false }
    }

    pub fn stats(&self) -> ArbitrageStats {
        self.stats
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    /// Execute a detected opportunity against `manager`. Returns true only
    /// if both legs filled; any other outcome (timeout, one-leg rejection,
    /// risk denial) is recorded as a failed execution and returns false.
    pub async fn execute(&mut self, manager: &VenueManager, opportunity: &ArbitrageOpportunity, risk: &mut RiskManager, open_orders: &HashMap<VenueId, u32>) -> bool {
        if self.executing {
            warn!("already executing arbitrage, skipping");
            return false;
        }
        self.executing = true;
        let result = self.execute_inner(manager, opportunity, risk, open_orders).await;
        self.executing = false;
        result
    }

    async fn execute_inner(&mut self, manager: &VenueManager, opportunity: &ArbitrageOpportunity, risk: &mut RiskManager, open_orders: &HashMap<VenueId, u32>) -> bool {
        let max_qty_at_price = to_fixed(self.config.max_position_usd / from_fixed(opportunity.buy_price));
        let quantity = opportunity.quantity.min(max_qty_at_price);

        if from_fixed(quantity) < self.config.min_quantity {
            warn!(qty = from_fixed(quantity), "quantity too small for arbitrage");
            return false;
        }

        let mid_price = Some((opportunity.buy_price + opportunity.sell_price) / 2);
        let buy_open = open_orders.get(&opportunity.buy_venue).copied().unwrap_or(0);
        let sell_open = open_orders.get(&opportunity.sell_venue).copied().unwrap_or(0);

        let buy_decision = check_order_fixed(risk, opportunity.buy_venue, Side::Buy, quantity, opportunity.buy_price, mid_price, buy_open);
        let sell_decision = check_order_fixed(risk, opportunity.sell_venue, Side::Sell, quantity, opportunity.sell_price, mid_price, sell_open);

        if !buy_decision.is_allowed() || !sell_decision.is_allowed() {
            if let RiskDecision::Denied(reason) = &buy_decision {
                warn!(venue = %opportunity.buy_venue, reason = %reason, "risk denied arbitrage buy leg");
            }
            if let RiskDecision::Denied(reason) = &sell_decision {
                warn!(venue = %opportunity.sell_venue, reason = %reason, "risk denied arbitrage sell leg");
            }
            self.stats.failed_executions += 1;
            return false;
        }
        risk.increment_order_count();
        risk.increment_order_count();

        info!(
            buy_venue = %opportunity.buy_venue,
            sell_venue = %opportunity.sell_venue,
            quantity = from_fixed(quantity),
            expected_profit_bps = opportunity.expected_profit_bps,
            "executing arbitrage"
        );

        let buy_request = OrderRequest {
            symbol: opportunity.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: opportunity.buy_price,
            quantity,
            time_in_force: TimeInForce::Ioc,
        };
        let sell_request = OrderRequest {
            symbol: opportunity.symbol.clone(),
            side: Side::Sell,
            order_type: OrderType::Limit,
            price: opportunity.sell_price,
            quantity,
            time_in_force: TimeInForce::Ioc,
        };

        let timeout = std::time::Duration::from_millis(self.config.execution_timeout_ms);
        let joined = tokio::time::timeout(timeout, async {
            tokio::join!(manager.send_order(opportunity.buy_venue, buy_request), manager.send_order(opportunity.sell_venue, sell_request))
        })
        .await;

        let (buy_result, sell_result) = match joined {
            Ok(pair) => pair,
            Err(_elapsed) => {
                error!("arbitrage execution timeout");
                self.stats.failed_executions += 1;
                return false;
            }
        };

        if buy_result.success && sell_result.success {
            self.stats.opportunities_executed += 1;
            self.stats.total_profit_bps += opportunity.expected_profit_bps;
            self.stats.total_volume += from_fixed(quantity) * 2.0;
            info!(buy_order_id = ?buy_result.venue_order_id, sell_order_id = ?sell_result.venue_order_id, "arbitrage executed successfully");
            return true;
        }

        self.stats.failed_executions += 1;
        if !buy_result.success {
            error!(error = ?buy_result.error_message, "buy leg failed");
        }
        if !sell_result.success {
            error!(error = ?sell_result.error_message, "sell leg failed");
        }

        if buy_result.success {
            if let Some(id) = &buy_result.venue_order_id {
                manager.cancel_order(opportunity.buy_venue, &opportunity.symbol, id).await;
            }
        }
        if sell_result.success {
            if let Some(id) = &sell_result.venue_order_id {
                manager.cancel_order(opportunity.sell_venue, &opportunity.symbol, id).await;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AdapterError;
    use crate::risk::RiskLimits;
    use crate::types::{Order, OrderResponse, Symbol};
    use crate::venue::VenueAdapter;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn opportunity() -> ArbitrageOpportunity {
        ArbitrageOpportunity {
            symbol: Symbol::new("BTC", "USDT"),
            buy_venue: VenueId::Binance,
            sell_venue: VenueId::Coinbase,
            buy_price: to_fixed(100.0),
            sell_price: to_fixed(100.5),
            quantity: to_fixed(0.0001),
            expected_profit_bps: 50.0,
            timestamp: 0,
        }
    }

    fn risk_manager() -> RiskManager {
        RiskManager::new(RiskLimits::default_profile())
    }

    /// Scenario: opportunity quantity is below min_quantity after clamping.
    /// Expected: execute_inner rejects before touching the venue manager,
    /// no stats change beyond the failed-quantity path (no failure counted,
    /// matching the Python original which just logs and returns false).
    #[tokio::test]
    async fn rejects_below_minimum_quantity() {
        let manager = VenueManager::new();
        let mut executor = ArbitrageExecutor::new(ArbitrageConfig::default());
        let ok = executor.execute(&manager, &opportunity(), &mut risk_manager(), &HashMap::new()).await;
        assert!(!ok);
        assert_eq!(executor.stats().opportunities_executed, 0);
        assert_eq!(executor.stats().failed_executions, 0);
    }

    /// Scenario: execute() called while executing is already true.
    /// Expected: second call short-circuits to false without touching
    /// stats.
    #[tokio::test]
    async fn single_flight_guard_rejects_concurrent_execute() {
        let manager = VenueManager::new();
        let mut executor = ArbitrageExecutor::new(ArbitrageConfig::default());
        executor.executing = true;
        let ok = executor.execute(&manager, &opportunity(), &mut risk_manager(), &HashMap::new()).await;
        assert!(!ok);
    }

    /// Counts `send_order` invocations so a test can prove an adapter was
    /// never reached, rather than only checking the executor's return value.
    struct CountingAdapter {
        calls: AtomicU32,
    }

    #[async_trait]
    impl VenueAdapter for CountingAdapter {
        async fn connect(&self) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn disconnect(&self) {}
        async fn subscribe_ticker(&self, _symbol: &Symbol) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn subscribe_orderbook(&self, _symbol: &Symbol, _depth: u32) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn send_order(&self, _request: OrderRequest) -> OrderResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            OrderResponse::ok("1".into(), 1)
        }
        async fn cancel_order(&self, _symbol: &Symbol, _venue_order_id: &str) -> bool {
            true
        }
        async fn cancel_all_orders(&self, _symbol: &Symbol) -> u32 {
            0
        }
        async fn open_orders(&self, _symbol: &Symbol) -> Vec<Order> {
            vec![]
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn latency_ns(&self) -> i64 {
            0
        }
    }

    /// Scenario: both legs would otherwise succeed (adapters connected and
    /// healthy), but the risk manager's max_order_size is set below the
    /// opportunity's clamped quantity. This exercises the full
    /// execute/execute_inner path against a stub manager, not
    /// `RiskManager::check_order` in isolation.
    /// Expected: execute() returns false, failed_executions increments, and
    /// neither adapter's send_order is ever reached.
    #[tokio::test]
    async fn risk_gate_rejects_oversized_arbitrage_leg() {
        let mut manager = VenueManager::new();
        let buy_adapter = Arc::new(CountingAdapter { calls: AtomicU32::new(0) });
        let sell_adapter = Arc::new(CountingAdapter { calls: AtomicU32::new(0) });
        manager.register(VenueId::Binance, buy_adapter.clone());
        manager.register(VenueId::Coinbase, sell_adapter.clone());
        manager.on_connected(VenueId::Binance);
        manager.on_connected(VenueId::Coinbase);

        let mut opp = opportunity();
        opp.quantity = to_fixed(1.0);

        let mut limits = RiskLimits::default_profile();
        limits.max_order_size = 0.01;
        let mut risk = RiskManager::new(limits);

        let mut executor = ArbitrageExecutor::new(ArbitrageConfig::default());
        let ok = executor.execute(&manager, &opp, &mut risk, &HashMap::new()).await;

        assert!(!ok);
        assert_eq!(executor.stats().opportunities_executed, 0);
        assert_eq!(executor.stats().failed_executions, 1);
        assert_eq!(buy_adapter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sell_adapter.calls.load(Ordering::SeqCst), 0);
    }

    /// Scenario: risk limits are generous enough to allow the trade.
    /// Expected: both legs actually submit through the stub manager and
    /// execute() returns true, with orders_this_second incremented by 2.
    #[tokio::test]
    async fn risk_gate_allows_compliant_arbitrage() {
        let mut manager = VenueManager::new();
        let buy_adapter = Arc::new(CountingAdapter { calls: AtomicU32::new(0) });
        let sell_adapter = Arc::new(CountingAdapter { calls: AtomicU32::new(0) });
        manager.register(VenueId::Binance, buy_adapter.clone());
        manager.register(VenueId::Coinbase, sell_adapter.clone());
        manager.on_connected(VenueId::Binance);
        manager.on_connected(VenueId::Coinbase);

        let mut opp = opportunity();
        opp.quantity = to_fixed(0.01);

        let mut risk = risk_manager();
        let mut executor = ArbitrageExecutor::new(ArbitrageConfig::default());
        let ok = executor.execute(&manager, &opp, &mut risk, &HashMap::new()).await;

        assert!(ok);
        assert_eq!(executor.stats().opportunities_executed, 1);
        assert_eq!(buy_adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sell_adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(risk.metrics().orders_this_second, 2);
    }
}
