//! Fixed-point price/quantity model and the data types shared by every
//! component: symbols, venues, ticks, orders, books, positions, risk metrics.

use std::fmt;

use crate::errors::SymbolError;

/// Scale factor for fixed-point prices and quantities: 1.0 == SCALE.
pub const SCALE: i64 = 100_000_000;

/// Price or quantity represented as an integer scaled by [`SCALE`].
///
/// All normative arithmetic (mid, NBBO, skew, hedge price) operates on this
/// type using integer math. Float conversion happens only at venue I/O and
/// human-facing log boundaries.
pub type Fixed = i64;

/// Nanoseconds since an unspecified epoch. Only differences are normative.
pub type Timestamp = i64;

/// Convert a floating-point value (as received from venue wire formats or
/// human-authored config) into the fixed-point representation.
#[inline]
pub fn to_fixed(x: f64) -> Fixed {
    (x * SCALE as f64).round() as Fixed
}

/// Convert a fixed-point value back to a float for logging or I/O.
#[inline]
pub fn from_fixed(x: Fixed) -> f64 {
    x as f64 / SCALE as f64
}

/// Current monotonic timestamp in nanoseconds, relative to process start.
///
/// Only differences between two `now_ns()` calls are meaningful; the spec
/// does not normalize against wall-clock epoch.
pub fn now_ns() -> Timestamp {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as Timestamp
}

/// A closed set of recognized quote-asset suffixes, checked longest/most
/// specific first so concatenated symbols split unambiguously (e.g.
/// "ETHBTC" resolves to base=ETH, quote=BTC, not base=E, quote=THBTC).
const QUOTE_SUFFIXES: &[&str] = &["USDT", "USDC", "USD", "BTC", "ETH"];

/// A trading pair, e.g. BTC/USDT. Canonical string form is concatenation:
/// "BTCUSDT".
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub base: String,
    pub quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self { base: base.into(), quote: quote.into() }
    }

    /// Parse a concatenated symbol string ("BTCUSDT") by matching the
    /// longest recognized quote suffix.
    pub fn parse(s: &str) -> Result<Self, SymbolError> {
        for suffix in QUOTE_SUFFIXES {
            if let Some(base) = s.strip_suffix(suffix) {
                if !base.is_empty() {
                    return Ok(Self::new(base, *suffix));
                }
            }
        }
        Err(SymbolError::UnrecognizedQuote(s.to_string()))
    }

    /// Concatenated form, e.g. "BTCUSDT".
    pub fn concatenated(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// Dash-separated form, e.g. "BTC-USDT".
    pub fn dashed(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.concatenated())
    }
}

/// Closed enumeration of supported venues. Extending this set is a code
/// change, not configuration — this keeps NBBO tie-breaking deterministic
/// and avoids dynamic-registration hazards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VenueId {
    Binance,
    Coinbase,
    Kraken,
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueId::Binance => write!(f, "binance"),
            VenueId::Coinbase => write!(f, "coinbase"),
            VenueId::Kraken => write!(f, "kraken"),
        }
    }
}

/// Normalized top-of-book snapshot from one venue. A zero on either side
/// means that side is absent on that venue.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tick {
    pub best_bid: Fixed,
    pub best_bid_qty: Fixed,
    pub best_ask: Fixed,
    pub best_ask_qty: Fixed,
    pub last_price: Option<Fixed>,
    pub last_qty: Option<Fixed>,
    pub local_timestamp: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The opposite side, used when selecting a hedge direction.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Signed sign convention used by position and risk arithmetic:
    /// +1 for BUY, -1 for SELL ("±" in the risk manager's pre-trade rules).
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
    LimitMaker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
    PostOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// True once the order can no longer transition (§3 Order invariant:
    /// {NEW → PARTIALLY_FILLED → FILLED} or a terminal state).
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired)
    }
}

/// A normalized order as tracked by the core, independent of venue wire
/// format. Invariant: filled_qty <= quantity.
#[derive(Clone, Debug)]
pub struct Order {
    pub client_id: u64,
    pub venue_order_id: Option<String>,
    pub venue: VenueId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Fixed,
    pub quantity: Fixed,
    pub filled_qty: Fixed,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub create_ts: Timestamp,
    pub update_ts: Timestamp,
}

/// A request to place an order, passed into a venue adapter's `send_order`.
#[derive(Clone, Debug)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Fixed,
    pub quantity: Fixed,
    pub time_in_force: TimeInForce,
}

/// Adapter response to an order submission. Never carries a panic/throw
/// across the adapter boundary; failures surface as `success = false`.
#[derive(Clone, Debug)]
pub struct OrderResponse {
    pub success: bool,
    pub venue_order_id: Option<String>,
    pub client_order_id: Option<u64>,
    pub error_message: Option<String>,
}

impl OrderResponse {
    pub fn ok(venue_order_id: String, client_order_id: u64) -> Self {
        Self { success: true, venue_order_id: Some(venue_order_id), client_order_id: Some(client_order_id), error_message: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, venue_order_id: None, client_order_id: None, error_message: Some(message.into()) }
    }
}

/// A trade report from a venue, fed to the risk manager and strategy for
/// hedging/position bookkeeping.
#[derive(Clone, Copy, Debug)]
pub struct Trade {
    pub venue: VenueId,
    pub side: Side,
    pub price: Fixed,
    pub quantity: Fixed,
    pub timestamp: Timestamp,
}

/// Per-venue position. `avg_entry_price` is only meaningful when `quantity
/// != 0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Position {
    pub quantity: Fixed,
    pub avg_entry_price: Fixed,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RiskStatus {
    #[default]
    Ok,
    Warning,
    Breach,
    KillSwitch,
}

/// Aggregated risk metrics across all venues.
///
/// Invariant: `drawdown == peak_pnl - (total_realized_pnl +
/// total_unrealized_pnl)`; `peak_pnl` is monotonically non-decreasing
/// within a trading day.
#[derive(Clone, Copy, Debug, Default)]
pub struct RiskMetrics {
    pub total_position: Fixed,
    pub total_realized_pnl: f64,
    pub total_unrealized_pnl: f64,
    pub daily_pnl: f64,
    pub peak_pnl: f64,
    pub drawdown: f64,
    pub orders_this_second: u32,
    pub status: RiskStatus,
}

/// A detected cross-venue arbitrage opportunity.
///
/// Invariant: `sell_price > buy_price` and `buy_venue != sell_venue`.
#[derive(Clone, Debug)]
pub struct ArbitrageOpportunity {
    pub symbol: Symbol,
    pub buy_venue: VenueId,
    pub sell_venue: VenueId,
    pub buy_price: Fixed,
    pub sell_price: Fixed,
    pub quantity: Fixed,
    pub expected_profit_bps: f64,
    pub timestamp: Timestamp,
}

/// Tagged event set emitted by venue adapters and forwarded to the
/// orchestrator through a single `mpsc` channel, per the REDESIGN FLAGS
/// note preferring tagged variants over per-capability callback closures.
#[derive(Clone, Debug)]
pub enum VenueEvent {
    Tick(VenueId, Tick),
    OrderUpdate(VenueId, Box<Order>),
    Trade(VenueId, Trade),
    Error(VenueId, String),
    Connected(VenueId),
    Disconnected(VenueId),
}
