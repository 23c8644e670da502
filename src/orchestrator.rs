//! Orchestrator (§4.8): owns the venue manager, consolidated book,
//! arbitrage detector/executor, quote engine, and risk manager, and wires
//! them together in a single-threaded event loop — the core's analogue of
//! the teacher's `engine/runner.rs::run_engine`.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::arbitrage::{ArbitrageDetector, ArbitrageExecutor};
use crate::book::ConsolidatedBook;
use crate::market_maker::{AvellanedaStoikov, MarketMaker};
use crate::risk::RiskManager;
use crate::types::{OrderStatus, Symbol, VenueEvent, VenueId, from_fixed};
use crate::venue::VenueManager;

/// Selects which quote engine variant drives market making; both share the
/// same sizing/gating/hedging plumbing in `market_maker::common`.
pub enum QuoteEngine {
    Basic(MarketMaker),
    AvellanedaStoikov(AvellanedaStoikov),
}

impl QuoteEngine {
    fn set_enabled(&mut self, enabled: bool) {
        match self {
            QuoteEngine::Basic(m) => m.enabled = enabled,
            QuoteEngine::AvellanedaStoikov(m) => m.enabled = enabled,
        }
    }

    fn compute_quotes(&mut self, book: &ConsolidatedBook, manager: &VenueManager) -> crate::market_maker::QuoteDecision {
        match self {
            QuoteEngine::Basic(m) => m.compute_quotes(book, manager),
            QuoteEngine::AvellanedaStoikov(m) => m.compute_quotes(book, manager),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_quotes(&mut self, decision: &crate::market_maker::QuoteDecision, manager: &VenueManager, symbol: &Symbol, risk: &mut RiskManager, mid_price: Option<crate::types::Fixed>, open_orders: &HashMap<VenueId, u32>) {
        match self {
            QuoteEngine::Basic(m) => m.send_quotes(decision, manager, symbol, risk, mid_price, open_orders).await,
            QuoteEngine::AvellanedaStoikov(m) => m.send_quotes(decision, manager, symbol, risk, mid_price, open_orders).await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn hedge_fill(&mut self, venue: VenueId, side: crate::types::Side, qty: crate::types::Fixed, manager: &VenueManager, book: &ConsolidatedBook, symbol: &Symbol, risk: &mut RiskManager, open_orders: &HashMap<VenueId, u32>) {
        match self {
            QuoteEngine::Basic(m) => {
                m.hedge_fill(venue, side, qty, manager, book, symbol, risk, open_orders).await;
            }
            QuoteEngine::AvellanedaStoikov(m) => {
                m.hedge_fill(venue, side, qty, manager, book, symbol, risk, open_orders).await;
            }
        }
    }

    fn on_fill(&mut self, side: crate::types::Side, qty: crate::types::Fixed, price: crate::types::Fixed) {
        match self {
            QuoteEngine::Basic(m) => m.on_fill(side, qty, price),
            QuoteEngine::AvellanedaStoikov(m) => m.on_fill(side, qty, price),
        }
    }
}

const MIN_VENUES_FOR_TRADING: usize = 2;

pub struct Orchestrator {
    symbol: Symbol,
    manager: VenueManager,
    book: ConsolidatedBook,
    detector: ArbitrageDetector,
    executor: ArbitrageExecutor,
    quote_engine: QuoteEngine,
    risk: RiskManager,
    events_rx: mpsc::Receiver<VenueEvent>,
    open_orders: HashMap<VenueId, u32>,
    trading_enabled: bool,
}

impl Orchestrator {
    pub fn new(symbol: Symbol, manager: VenueManager, detector: ArbitrageDetector, executor: ArbitrageExecutor, quote_engine: QuoteEngine, risk: RiskManager, events_rx: mpsc::Receiver<VenueEvent>) -> Self {
        let book = ConsolidatedBook::new(symbol.clone());
        Self { symbol, manager, book, detector, executor, quote_engine, risk, events_rx, open_orders: HashMap::new(), trading_enabled: false }
    }

    /// Drives the event loop until `ctrl_c` or the event channel closes.
    pub async fn run(&mut self) {
        let mut second_tick = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                biased;

                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    self.shutdown().await;
                    return;
                }

                _ = second_tick.tick() => {
                    self.risk.reset_order_count();
                    self.log_periodic_stats();
                }

                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.on_event(event).await,
                        None => {
                            warn!("venue event channel closed, shutting down");
                            self.shutdown().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn on_event(&mut self, event: VenueEvent) {
        match event {
            VenueEvent::Tick(venue, tick) => {
                self.manager.on_tick(venue);
                self.book.update(venue, &tick);
                if let Some(mid) = self.book.nbbo().mid_price() {
                    self.risk.update_mark_price(venue, from_fixed(mid));
                }
                self.update_trading_enabled();
                if self.trading_enabled {
                    self.run_strategies().await;
                }
            }
            VenueEvent::OrderUpdate(venue, order) => {
                let entry = self.open_orders.entry(venue).or_insert(0);
                if order.status.is_terminal() {
                    *entry = entry.saturating_sub(1);
                } else if matches!(order.status, OrderStatus::New) {
                    *entry += 1;
                }
            }
            VenueEvent::Trade(venue, trade) => {
                self.risk.record_fill(venue, trade.side, from_fixed(trade.quantity), from_fixed(trade.price));
                self.quote_engine.on_fill(trade.side, trade.quantity, trade.price);
                if self.risk.is_kill_switch_active() {
                    warn!("kill switch active, skipping post-fill hedge");
                } else {
                    self.quote_engine.hedge_fill(venue, trade.side, trade.quantity, &self.manager, &self.book, &self.symbol, &mut self.risk, &self.open_orders).await;
                }
            }
            VenueEvent::Error(venue, message) => {
                self.manager.on_error(venue, &message);
            }
            VenueEvent::Connected(venue) => {
                self.manager.on_connected(venue);
                self.update_trading_enabled();
            }
            VenueEvent::Disconnected(venue) => {
                self.manager.on_disconnected(venue);
                self.update_trading_enabled();
            }
        }
    }

    fn update_trading_enabled(&mut self) {
        let connected = self.manager.connected_count();
        let was_enabled = self.trading_enabled;
        self.trading_enabled = connected >= MIN_VENUES_FOR_TRADING && !self.risk.is_kill_switch_active();
        if was_enabled != self.trading_enabled {
            self.quote_engine.set_enabled(self.trading_enabled);
            info!(trading_enabled = self.trading_enabled, connected, "trading state changed");
        }
    }

    async fn run_strategies(&mut self) {
        let mid_price = self.book.nbbo().mid_price();

        if let Some(opportunity) = self.detector.check(&self.book) {
            if !self.executor.is_executing() {
                self.executor.execute(&self.manager, &opportunity, &mut self.risk, &self.open_orders).await;
            }
        }

        let decision = self.quote_engine.compute_quotes(&self.book, &self.manager);
        if decision.should_quote {
            self.quote_engine.send_quotes(&decision, &self.manager, &self.symbol, &mut self.risk, mid_price, &self.open_orders).await;
        }
    }

    fn log_periodic_stats(&self) {
        let nbbo = self.book.nbbo();
        info!(
            symbol = %self.symbol,
            nbbo_bid = from_fixed(nbbo.best_bid),
            nbbo_ask = from_fixed(nbbo.best_ask),
            nbbo_mid = nbbo.mid_price().map(from_fixed),
            risk_status = ?self.risk.metrics().status,
            total_position = self.risk.metrics().total_position,
            daily_pnl = self.risk.metrics().daily_pnl,
            arb_detected = self.detector.stats().opportunities_detected,
            arb_executed = self.executor.stats().opportunities_executed,
            "periodic stats"
        );
    }

    async fn shutdown(&mut self) {
        self.quote_engine.set_enabled(false);
        self.manager.cancel_all_orders_all_venues(&self.symbol).await;
        self.manager.disconnect_all().await;
    }
}
