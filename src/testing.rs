//! In-process stand-ins for the trading backend and the exchange, used by
//! the async tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

pub const MOCK_PASSWORD: &str = "secret";

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Default)]
struct MockState {
    sessions: Vec<String>,
    trades: Vec<Value>,
    created: Vec<Value>,
    next_id: u32,
}

/// Fake trading backend with cookie sessions and an in-memory trade list.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Invalidate every session so the next call answers 401.
    pub fn revoke_sessions(&self) {
        self.state.lock().unwrap().sessions.clear();
    }

    pub fn created_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().created.clone()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(cookie) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let state = self.state.lock().unwrap();
        cookie
            .split(';')
            .filter_map(|pair| pair.trim().strip_prefix("token="))
            .any(|token| state.sessions.iter().any(|s| s == token))
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

pub async fn spawn_mock_backend() -> (String, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::default());

    let router = Router::new()
        .route("/", get(|| async { Json(json!({ "message": "ok" })) }))
        .route("/api/v1/signup", post(signup))
        .route("/api/v1/login", post(login))
        .route("/api/v1/profile", get(profile))
        .route("/api/v1/balance", get(balance))
        .route("/api/v1/trade/active-trades", get(active_trades))
        .route("/api/v1/trade/trades", get(all_trades))
        .route("/api/v1/trade/create", post(create_trade))
        .route("/api/v1/trade/liquidate-asset", post(liquidate))
        .route("/api/v1/supportedAssets", get(assets))
        .with_state(backend.clone());

    (spawn_router(router).await, backend)
}

async fn signup(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Username already exists" })),
        )
            .into_response();
    }
    Json(json!({ "message": "User created successfully" })).into_response()
}

async fn login(State(backend): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    if body["password"] != MOCK_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response();
    }
    let token = format!("tok-{}", body["username"].as_str().unwrap_or_default());
    backend.state.lock().unwrap().sessions.push(token.clone());

    (
        [(header::SET_COOKIE, format!("token={}; Path=/; HttpOnly", token))],
        Json(json!({ "message": "Logged in" })),
    )
        .into_response()
}

async fn profile(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "profile": {
            "email": "alice@example.com",
            "name": "Alice",
            "username": "alice",
            "fund": 5000
        }
    }))
    .into_response()
}

async fn balance(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "message": "5000.25" })).into_response()
}

async fn active_trades(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let state = backend.state.lock().unwrap();
    let active: Vec<Value> = state
        .trades
        .iter()
        .filter(|t| t["liquidated"] == false)
        .cloned()
        .collect();
    Json(json!({ "message": active })).into_response()
}

async fn all_trades(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let state = backend.state.lock().unwrap();
    Json(json!({ "message": state.trades.clone() })).into_response()
}

async fn create_trade(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let asset_id = match body["asset"].as_str() {
        Some("BTC") => 1,
        Some("ETH") => 2,
        Some("SOL") => 3,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Unsupported asset" })),
            )
                .into_response()
        }
    };

    let mut state = backend.state.lock().unwrap();
    state.next_id += 1;
    let trade = json!({
        "id": format!("trade-{}", state.next_id),
        "openPrice": 500,
        "closePrice": 0,
        "leverage": body["leverage"],
        "pnl": 0,
        "assetId": asset_id,
        "liquidated": false,
        "userId": "alice",
        "assetPrice": 50000,
        "quantity": body["quantity"],
        "type": body["type"],
    });
    state.trades.push(trade);
    state.created.push(body);

    Json(json!({ "message": "Trade created" })).into_response()
}

async fn liquidate(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let mut state = backend.state.lock().unwrap();
    let Some(trade) = state.trades.iter_mut().find(|t| t["id"] == body["id"]) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Trade not found" })),
        )
            .into_response();
    };
    trade["liquidated"] = json!(true);
    trade["pnl"] = json!(12.5);

    Json(json!({ "message": "Trade liquidated" })).into_response()
}

async fn assets() -> Json<Value> {
    Json(json!({
        "assets": [
            { "symbol": "BTC", "name": "Bitcoin", "imageUrl": "" },
            { "symbol": "ETH", "name": "Ethereum", "imageUrl": "" },
            { "symbol": "SOL", "name": "Solana", "imageUrl": "" }
        ]
    }))
}

/// Last price the mock exchange quotes for a pair.
pub fn mock_price(pair: &str) -> &'static str {
    match pair {
        "BTC_USDC" => "60000",
        "ETH_USDC" => "3000",
        _ => "150",
    }
}

/// Pair the mock exchange rejects with 503.
pub const FAILING_PAIR: &str = "FAIL_USDC";

/// Fake exchange REST API. Every body echoes the query it was called with
/// under `query`.
pub async fn spawn_mock_exchange() -> String {
    let router = Router::new()
        .route("/api/v1/klines", get(mock_klines))
        .route("/api/v1/ticker", get(mock_ticker));
    spawn_router(router).await
}

/// Mock exchange whose ticker endpoint answers only after `delay`.
pub async fn spawn_slow_ticker_exchange(delay: Duration) -> String {
    let router = Router::new()
        .route("/api/v1/klines", get(mock_klines))
        .route(
            "/api/v1/ticker",
            get(move |query: Query<HashMap<String, String>>| async move {
                tokio::time::sleep(delay).await;
                mock_ticker(query).await
            }),
        );
    spawn_router(router).await
}

async fn mock_klines(Query(query): Query<HashMap<String, String>>) -> Response {
    let symbol = query.get("symbol").cloned().unwrap_or_default();
    if symbol == FAILING_PAIR {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "message": "down" }))).into_response();
    }
    let price = mock_price(&symbol);
    Json(json!([{
        "start": "2024-05-21 11:59:00",
        "end": "2024-05-21 12:00:00",
        "open": price, "high": price, "low": price, "close": price,
        "volume": "1", "quoteVolume": price, "trades": "1",
        "query": query,
    }]))
    .into_response()
}

async fn mock_ticker(Query(query): Query<HashMap<String, String>>) -> Response {
    let symbol = query.get("symbol").cloned().unwrap_or_default();
    if symbol == FAILING_PAIR {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "message": "down" }))).into_response();
    }
    Json(json!({
        "symbol": symbol,
        "lastPrice": mock_price(&symbol),
        "priceChange": "0",
        "priceChangePercent": "0",
        "high": mock_price(&symbol),
        "low": mock_price(&symbol),
        "volume": "10",
        "query": query,
    }))
    .into_response()
}

/// What the mock websocket saw, per connection index.
#[derive(Debug, Default)]
pub struct StreamLog {
    pub subscriptions: Vec<(usize, String)>,
    pub closed: Vec<usize>,
}

/// Fake exchange websocket. After a `kline.*` subscription it pushes a
/// candle for that pair every 20ms, priced with `mock_price`.
pub async fn spawn_mock_stream() -> (String, Arc<Mutex<StreamLog>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(StreamLog::default()));

    let server_log = log.clone();
    tokio::spawn(async move {
        let mut next_id = 0;
        while let Ok((tcp, _)) = listener.accept().await {
            let id = next_id;
            next_id += 1;
            tokio::spawn(serve_stream(id, tcp, server_log.clone()));
        }
    });

    (format!("ws://{}", addr), log)
}

async fn serve_stream(id: usize, tcp: tokio::net::TcpStream, log: Arc<Mutex<StreamLog>>) {
    let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    let mut ticks = tokio::time::interval(Duration::from_millis(20));
    let mut pair: Option<String> = None;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let request: Value = serde_json::from_str(&text).unwrap_or_default();
                    let channel = request["params"][0].as_str().unwrap_or_default().to_string();
                    if channel.starts_with("kline.") {
                        pair = channel.rsplit('.').next().map(str::to_string);
                    }
                    log.lock().unwrap().subscriptions.push((id, channel));
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = ticks.tick() => {
                let Some(pair) = &pair else { continue };
                let price = mock_price(pair);
                let frame = json!({
                    "stream": format!("kline.1m.{}", pair),
                    "data": {
                        "e": "kline", "s": pair,
                        "t": "2024-05-21T12:00:00", "T": "2024-05-21T12:01:00",
                        "o": price, "c": price, "h": price, "l": price, "v": "1",
                        "n": 1, "X": false
                    }
                });
                if write.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    log.lock().unwrap().closed.push(id);
}
