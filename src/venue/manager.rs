//! Venue manager (§4.4): registry of adapters, per-venue health tracking,
//! and broadcast operations that fan out concurrently and isolate
//! individual adapter failures.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::types::{Fixed, OrderRequest, OrderResponse, Symbol, VenueId, now_ns};
use crate::venue::adapter::VenueAdapter;

/// Per-venue health, maintained by the manager from the internal callbacks
/// it installs ahead of the user-facing ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct VenueHealth {
    pub is_connected: bool,
    pub latency_ns: i64,
    pub last_tick_ts: i64,
    pub error_count: u32,
    pub is_healthy: bool,
}

impl VenueHealth {
    fn new() -> Self {
        Self { is_healthy: true, ..Default::default() }
    }
}

/// Owns the venue registry and fans out broadcast operations, tracking
/// per-venue connectivity/latency/error health along the way.
pub struct VenueManager {
    adapters: HashMap<VenueId, Arc<dyn VenueAdapter>>,
    health: HashMap<VenueId, VenueHealth>,
    registration_order: Vec<VenueId>,
}

impl VenueManager {
    pub fn new() -> Self {
        Self { adapters: HashMap::new(), health: HashMap::new(), registration_order: Vec::new() }
    }

    pub fn register(&mut self, venue: VenueId, adapter: Arc<dyn VenueAdapter>) {
        self.adapters.insert(venue, adapter);
        self.health.insert(venue, VenueHealth::new());
        if !self.registration_order.contains(&venue) {
            self.registration_order.push(venue);
        }
    }

    pub fn health(&self, venue: VenueId) -> Option<VenueHealth> {
        self.health.get(&venue).copied()
    }

    pub fn connected_venues(&self) -> Vec<VenueId> {
        self.registration_order.iter().copied().filter(|v| self.health.get(v).map(|h| h.is_connected).unwrap_or(false)).collect()
    }

    pub fn connected_count(&self) -> usize {
        self.connected_venues().len()
    }

    /// The lowest-latency venue among those both connected and healthy.
    pub fn fastest_venue(&self) -> Option<VenueId> {
        self.registration_order
            .iter()
            .copied()
            .filter_map(|v| self.health.get(&v).filter(|h| h.is_connected && h.is_healthy).map(|h| (v, h.latency_ns)))
            .min_by_key(|&(_, latency)| latency)
            .map(|(v, _)| v)
    }

    // --- event callbacks, called by the orchestrator as it drains the
    // shared VenueEvent channel every adapter emits into ---

    pub fn on_tick(&mut self, venue: VenueId) {
        if let Some(h) = self.health.get_mut(&venue) {
            h.last_tick_ts = now_ns();
        }
    }

    pub fn on_error(&mut self, venue: VenueId, message: &str) {
        warn!(venue = %venue, error = %message, "venue error");
        if let Some(h) = self.health.get_mut(&venue) {
            h.error_count += 1;
            if h.error_count > 10 {
                h.is_healthy = false;
            }
        }
    }

    pub fn on_connected(&mut self, venue: VenueId) {
        info!(venue = %venue, "venue connected");
        let latency = self.adapters.get(&venue).map(|a| a.latency_ns()).unwrap_or(0);
        if let Some(h) = self.health.get_mut(&venue) {
            h.is_connected = true;
            h.latency_ns = latency;
        }
    }

    pub fn on_disconnected(&mut self, venue: VenueId) {
        warn!(venue = %venue, "venue disconnected");
        if let Some(h) = self.health.get_mut(&venue) {
            h.is_connected = false;
        }
    }

    // --- broadcast operations: fan out concurrently, isolate failures ---

    pub async fn connect_all(&self) {
        join_all(self.adapters.values().map(|a| a.connect())).await;
    }

    pub async fn disconnect_all(&self) {
        join_all(self.adapters.values().map(|a| a.disconnect())).await;
    }

    pub async fn subscribe_ticker_all(&self, symbol: &Symbol) {
        join_all(self.adapters.values().filter(|a| a.is_connected()).map(|a| a.subscribe_ticker(symbol))).await;
    }

    pub async fn subscribe_orderbook_all(&self, symbol: &Symbol, depth: u32) {
        join_all(self.adapters.values().filter(|a| a.is_connected()).map(|a| a.subscribe_orderbook(symbol, depth))).await;
    }

    pub async fn cancel_all_orders_all_venues(&self, symbol: &Symbol) -> HashMap<VenueId, u32> {
        let mut out = HashMap::new();
        for (&venue, adapter) in &self.adapters {
            if adapter.is_connected() {
                out.insert(venue, adapter.cancel_all_orders(symbol).await);
            }
        }
        out
    }

    /// Route an order to a specific venue. Fails fast with `not-connected`
    /// if the target adapter isn't registered or isn't connected.
    pub async fn send_order(&self, venue: VenueId, request: OrderRequest) -> OrderResponse {
        let Some(adapter) = self.adapters.get(&venue) else {
            return OrderResponse::err(format!("venue {venue} not registered"));
        };
        if !adapter.is_connected() {
            return OrderResponse::err(format!("venue {venue} not connected"));
        }
        adapter.send_order(request).await
    }

    pub async fn cancel_order(&self, venue: VenueId, symbol: &Symbol, venue_order_id: &str) -> bool {
        match self.adapters.get(&venue) {
            Some(adapter) if adapter.is_connected() => adapter.cancel_order(symbol, venue_order_id).await,
            _ => false,
        }
    }

    pub fn venue_book_latency(&self, venue: VenueId) -> Option<Fixed> {
        self.health.get(&venue).map(|h| h.latency_ns)
    }
}

impl Default for VenueManager {
    fn default() -> Self {
        Self::new()
    }
}
