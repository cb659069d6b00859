//! Runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Duration as Lookback;

use crate::api::{MarketClient, MarketRoutes, EXCHANGE_REST_URL};
use crate::feed::EXCHANGE_WS_URL;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:4000";
pub const DEFAULT_SESSION_FILE: &str = ".leverdesk-session.json";
pub const DEFAULT_PROXY_BIND: &str = "127.0.0.1:3000";

/// Where everything lives. Built from CLI flags, which fall back to the
/// environment (and `.env`) and then to these defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Trading backend root; the API lives under `/api/v1`
    pub server_url: String,

    /// Exchange REST root
    pub exchange_rest_url: String,

    /// Exchange websocket endpoint
    pub exchange_ws_url: String,

    /// File holding the session cookies between runs
    pub session_file: PathBuf,

    /// Fetch chart candles and tickers through a running proxy at this URL
    /// instead of the exchange
    pub market_via_proxy: Option<String>,

    pub feed: FeedConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            exchange_rest_url: EXCHANGE_REST_URL.to_string(),
            exchange_ws_url: EXCHANGE_WS_URL.to_string(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            market_via_proxy: None,
            feed: FeedConfig::default(),
        }
    }
}

impl AppConfig {
    /// Market client for the chart and dashboard: the proxy when one is
    /// configured, the exchange otherwise.
    pub fn market_client(&self) -> Result<MarketClient> {
        match &self.market_via_proxy {
            Some(proxy) => MarketClient::with_base_url(proxy, MarketRoutes::Proxy),
            None => self.exchange_client(),
        }
    }

    /// Market client that always talks to the exchange (used by the proxy).
    pub fn exchange_client(&self) -> Result<MarketClient> {
        MarketClient::with_base_url(&self.exchange_rest_url, MarketRoutes::Exchange)
    }
}

/// Live chart settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// History loaded on every asset selection
    pub lookback: Lookback,

    /// Candle interval for history and stream
    pub interval: String,

    /// Ticker snapshot poll period
    pub ticker_refresh: Duration,

    /// Max candles kept in memory
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            lookback: Lookback::hours(24),
            interval: "1m".to_string(),
            ticker_refresh: Duration::from_secs(5),
            capacity: 2000, // 24h of 1m bars plus headroom
        }
    }
}
