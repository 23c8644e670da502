//! Coinbase-style reference venue adapter: REST + WS, base64 HMAC-SHA256
//! body signing with an ISO-8601 timestamp and passphrase header, and
//! dash-separated symbol rendering (§4.3, §6 — "one venue requires
//! additionally a base64 signature, ISO-8601 timestamp, and a
//! passphrase").

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

use crate::errors::AdapterError;
use crate::types::{Fixed, Order, OrderRequest, OrderResponse, OrderType, Side, Symbol, TimeInForce, VenueEvent, VenueId, from_fixed, now_ns, to_fixed};
use crate::venue::adapter::VenueAdapter;

type HmacSha256 = Hmac<Sha256>;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CoinbaseConfig {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub testnet: bool,
}

impl CoinbaseConfig {
    fn rest_url(&self) -> &'static str {
        if self.testnet { "https://api-public.sandbox.exchange.coinbase.com" } else { "https://api.exchange.coinbase.com" }
    }

    fn ws_url(&self) -> &'static str {
        if self.testnet { "wss://ws-feed-public.sandbox.exchange.coinbase.com" } else { "wss://ws-feed.exchange.coinbase.com" }
    }
}

pub struct CoinbaseAdapter {
    config: CoinbaseConfig,
    http: reqwest::Client,
    connected: Arc<AtomicBool>,
    latency_ns: Arc<AtomicI64>,
    events: mpsc::Sender<VenueEvent>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl CoinbaseAdapter {
    pub fn new(config: CoinbaseConfig, events: mpsc::Sender<VenueEvent>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            latency_ns: Arc::new(AtomicI64::new(0)),
            events,
            reader: Mutex::new(None),
        }
    }

    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        let message = format!("{timestamp}{method}{path}{body}");
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes()).expect("HMAC accepts key of any length");
        mac.update(message.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    fn iso_timestamp() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    fn auth_headers(&self, method: &str, path: &str, body: &str) -> Vec<(&'static str, String)> {
        let timestamp = Self::iso_timestamp();
        let signature = self.sign(&timestamp, method, path, body);
        vec![
            ("CB-ACCESS-KEY", self.config.api_key.clone()),
            ("CB-ACCESS-SIGN", signature),
            ("CB-ACCESS-TIMESTAMP", timestamp),
            ("CB-ACCESS-PASSPHRASE", self.config.passphrase.clone()),
        ]
    }

    fn order_type_str(order_type: OrderType) -> &'static str {
        match order_type {
            OrderType::Limit | OrderType::LimitMaker => "limit",
            OrderType::Market => "market",
        }
    }

    fn tif_str(tif: TimeInForce) -> &'static str {
        match tif {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::PostOnly => "GTC",
        }
    }

    async fn run_reader(ws_url: String, product_id: String, connected: Arc<AtomicBool>, events: mpsc::Sender<VenueEvent>, venue: VenueId) {
        let mut backoff_ms: u64 = 1000;

        loop {
            let ws = match connect_async(&ws_url).await {
                Ok((ws, _)) => {
                    backoff_ms = 1000;
                    ws
                }
                Err(e) => {
                    let _ = events.send(VenueEvent::Error(venue, format!("connect failed: {e}"))).await;
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(10_000);
                    continue;
                }
            };

            let (mut write, mut read) = ws.split();

            let sub = serde_json::json!({
                "type": "subscribe",
                "product_ids": [&product_id],
                "channels": ["ticker"],
            });
            if write.send(Message::Text(sub.to_string())).await.is_err() {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(10_000);
                continue;
            }

            loop {
                match tokio::time::timeout(READ_TIMEOUT, read.next()).await {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        let recv_ts = now_ns();
                        if let Some(tick) = parse_ticker_message(&text, recv_ts) {
                            if events.send(VenueEvent::Tick(venue, tick)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(e))) => {
                        warn!(venue = %venue, error = %e, "ws error, reconnecting");
                        break;
                    }
                    Ok(None) => {
                        debug!(venue = %venue, "ws stream ended, reconnecting");
                        break;
                    }
                    Err(_elapsed) => {
                        // Coinbase's wire protocol keepalive is an
                        // application-level heartbeat subscription rather
                        // than a WS ping; a ping frame is still accepted
                        // and keeps intermediary proxies from closing the
                        // socket on read timeout.
                        if write.send(Message::Ping(vec![])).await.is_err() {
                            break;
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            let _ = events.send(VenueEvent::Disconnected(venue)).await;
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms = (backoff_ms * 2).min(10_000);
        }
    }
}

fn parse_ticker_message(text: &str, recv_ts: i64) -> Option<crate::types::Tick> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;
    if v.get("type")?.as_str()? != "ticker" {
        return None;
    }
    let bid: f64 = v.get("best_bid")?.as_str()?.parse().ok()?;
    let bid_size: f64 = v.get("best_bid_size").and_then(|x| x.as_str()).and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let ask: f64 = v.get("best_ask")?.as_str()?.parse().ok()?;
    let ask_size: f64 = v.get("best_ask_size").and_then(|x| x.as_str()).and_then(|s| s.parse().ok()).unwrap_or(0.0);
    Some(crate::types::Tick {
        best_bid: to_fixed(bid),
        best_bid_qty: to_fixed(bid_size),
        best_ask: to_fixed(ask),
        best_ask_qty: to_fixed(ask_size),
        last_price: None,
        last_qty: None,
        local_timestamp: recv_ts,
    })
}

#[async_trait]
impl VenueAdapter for CoinbaseAdapter {
    async fn connect(&self) -> Result<(), AdapterError> {
        let start = Instant::now();
        let resp = self
            .http
            .get(format!("{}/time", self.config.rest_url()))
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AdapterError::Transport(format!("status {}", resp.status())));
        }
        self.latency_ns.store(start.elapsed().as_nanos() as i64, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(VenueEvent::Connected(VenueId::Coinbase)).await;
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().expect("reader mutex poisoned").take() {
            handle.abort();
        }
        let _ = self.events.send(VenueEvent::Disconnected(VenueId::Coinbase)).await;
    }

    async fn subscribe_ticker(&self, symbol: &Symbol) -> Result<(), AdapterError> {
        let events = self.events.clone();
        let connected = self.connected.clone();
        let ws_url = self.config.ws_url().to_string();
        let handle = tokio::spawn(Self::run_reader(ws_url, symbol.dashed(), connected, events, VenueId::Coinbase));
        *self.reader.lock().expect("reader mutex poisoned") = Some(handle);
        Ok(())
    }

    async fn subscribe_orderbook(&self, _symbol: &Symbol, _depth: u32) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn send_order(&self, request: OrderRequest) -> OrderResponse {
        if !self.is_connected() {
            return OrderResponse::err(AdapterError::NotConnected.to_string());
        }

        let side = match request.side {
            Side::Buy => "buy",
            Side::Sell => "sell",
        };
        let body = serde_json::json!({
            "product_id": request.symbol.dashed(),
            "side": side,
            "type": Self::order_type_str(request.order_type),
            "price": format!("{:.8}", from_fixed(request.price)),
            "size": format!("{:.8}", from_fixed(request.quantity)),
            "time_in_force": Self::tif_str(request.time_in_force),
            "post_only": request.order_type == OrderType::LimitMaker,
        })
        .to_string();

        let headers = self.auth_headers("POST", "/orders", &body);
        let mut req = self.http.post(format!("{}/orders", self.config.rest_url())).header("Content-Type", "application/json").body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return OrderResponse::err(AdapterError::Transport(e.to_string()).to_string()),
        };

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return OrderResponse::err(AdapterError::Rejected(body).to_string());
        }

        let body: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => return OrderResponse::err(AdapterError::Parse(e.to_string()).to_string()),
        };

        match body.get("id").and_then(|v| v.as_str()) {
            Some(id) => OrderResponse::ok(id.to_string(), 0),
            None => OrderResponse::err(AdapterError::Parse("missing order id".into()).to_string()),
        }
    }

    async fn cancel_order(&self, _symbol: &Symbol, venue_order_id: &str) -> bool {
        let path = format!("/orders/{venue_order_id}");
        let headers = self.auth_headers("DELETE", &path, "");
        let mut req = self.http.delete(format!("{}{}", self.config.rest_url(), path));
        for (k, v) in headers {
            req = req.header(k, v);
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                error!(error = %e, "cancel_order transport error");
                false
            }
        }
    }

    async fn cancel_all_orders(&self, symbol: &Symbol) -> u32 {
        let path = format!("/orders?product_id={}", symbol.dashed());
        let headers = self.auth_headers("DELETE", &path, "");
        let mut req = self.http.delete(format!("{}{}", self.config.rest_url(), path));
        for (k, v) in headers {
            req = req.header(k, v);
        }
        match req.send().await {
            Ok(resp) => resp.json::<Vec<String>>().await.map(|ids| ids.len() as u32).unwrap_or(0),
            Err(_) => 0,
        }
    }

    async fn open_orders(&self, symbol: &Symbol) -> Vec<Order> {
        let path = format!("/orders?product_id={}&status=open", symbol.dashed());
        let headers = self.auth_headers("GET", &path, "");
        let mut req = self.http.get(format!("{}{}", self.config.rest_url(), path));
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let Ok(resp) = req.send().await else { return vec![] };
        let Ok(items) = resp.json::<Vec<serde_json::Value>>().await else { return vec![] };

        items
            .into_iter()
            .filter_map(|item| {
                let price = to_fixed(item.get("price")?.as_str()?.parse().ok()?);
                let qty = to_fixed(item.get("size")?.as_str()?.parse().ok()?);
                let filled = to_fixed(item.get("filled_size")?.as_str()?.parse().ok()?);
                Some(Order {
                    client_id: 0,
                    venue_order_id: item.get("id").and_then(|v| v.as_str()).map(String::from),
                    venue: VenueId::Coinbase,
                    symbol: symbol.clone(),
                    side: if item.get("side")?.as_str()? == "buy" { Side::Buy } else { Side::Sell },
                    order_type: OrderType::Limit,
                    price,
                    quantity: qty,
                    filled_qty: filled,
                    status: crate::types::OrderStatus::New,
                    time_in_force: TimeInForce::Gtc,
                    create_ts: now_ns(),
                    update_ts: now_ns(),
                })
            })
            .collect()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn latency_ns(&self) -> Fixed {
        self.latency_ns.load(Ordering::SeqCst)
    }
}
