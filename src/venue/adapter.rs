//! The venue adapter contract (§4.3): the capability set every concrete
//! venue integration must satisfy, dispatched as a trait object from the
//! venue manager's registry.

use async_trait::async_trait;

use crate::types::{Order, OrderRequest, OrderResponse, Symbol};

/// Abstract connect/subscribe/order/cancel surface for one venue.
///
/// Implementations never let an internal error escape as a panic across
/// this boundary: `send_order` always returns an `OrderResponse`, even on
/// transport failure.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Establish the REST session and WS connection, measure a round-trip
    /// latency sample, and transition to connected. Emits
    /// `VenueEvent::Connected` on the adapter's event channel.
    async fn connect(&self) -> Result<(), crate::errors::AdapterError>;

    /// Cancel the WS reader task, close sockets, and emit
    /// `VenueEvent::Disconnected`.
    async fn disconnect(&self);

    /// Idempotent ticker subscription.
    async fn subscribe_ticker(&self, symbol: &Symbol) -> Result<(), crate::errors::AdapterError>;

    /// Idempotent order book subscription at the given depth.
    async fn subscribe_orderbook(&self, symbol: &Symbol, depth: u32) -> Result<(), crate::errors::AdapterError>;

    /// Submit an order. Never throws: protocol/HTTP failure surfaces as
    /// `OrderResponse { success: false, .. }`.
    async fn send_order(&self, request: OrderRequest) -> OrderResponse;

    async fn cancel_order(&self, symbol: &Symbol, venue_order_id: &str) -> bool;

    /// Cancel every open order for `symbol`; returns the count cancelled.
    async fn cancel_all_orders(&self, symbol: &Symbol) -> u32;

    async fn open_orders(&self, symbol: &Symbol) -> Vec<Order>;

    fn is_connected(&self) -> bool;

    /// Latest round-trip latency sample in nanoseconds.
    fn latency_ns(&self) -> i64;
}
