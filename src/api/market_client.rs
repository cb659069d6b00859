//! Exchange market-data REST client (candles and 24h ticker).
//!
//! Talks either to the exchange itself or to our own proxy, which exposes
//! the same query surface under different paths.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::error::{ApiError, ApiResult};
use super::types::{KlineResponse, KlinesParams, TickerParams, TickerResponse};

pub const EXCHANGE_REST_URL: &str = "https://api.backpack.exchange";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which path layout the base URL serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketRoutes {
    /// Exchange REST API (`/api/v1/klines`, `/api/v1/ticker`)
    Exchange,
    /// Local market-data proxy (`/api/klines`, `/api/ticker`)
    Proxy,
}

impl MarketRoutes {
    fn klines(&self) -> &'static str {
        match self {
            MarketRoutes::Exchange => "api/v1/klines",
            MarketRoutes::Proxy => "api/klines",
        }
    }

    fn ticker(&self) -> &'static str {
        match self {
            MarketRoutes::Exchange => "api/v1/ticker",
            MarketRoutes::Proxy => "api/ticker",
        }
    }
}

/// Raw upstream outcome, kept verbatim for pass-through.
#[derive(Debug, Clone, PartialEq)]
pub enum Forwarded {
    /// Success status with its decoded JSON body
    Body(Value),
    /// Non-success status; the body is not inspected
    Status(StatusCode),
}

/// Client for candle and ticker data.
#[derive(Clone)]
pub struct MarketClient {
    client: Client,
    base_url: Url,
    routes: MarketRoutes,
}

impl MarketClient {
    /// Create with custom base URL and path layout.
    pub fn with_base_url(base_url: &str, routes: MarketRoutes) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("Invalid market data URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            routes,
        })
    }

    async fn fetch<Q: Serialize>(&self, path: &str, query: &Q) -> ApiResult<(StatusCode, Vec<u8>)> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Decode(format!("bad endpoint {}: {}", path, e)))?;

        debug!(url = %url, "Fetching market data");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    async fn forward<Q: Serialize>(&self, path: &str, query: &Q) -> ApiResult<Forwarded> {
        let (status, body) = self.fetch(path, query).await?;
        if !status.is_success() {
            return Ok(Forwarded::Status(status));
        }
        serde_json::from_slice(&body)
            .map(Forwarded::Body)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn typed<Q: Serialize, T: DeserializeOwned>(&self, path: &str, query: &Q) -> ApiResult<T> {
        let (status, body) = self.fetch(path, query).await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .or_else(|| v.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("market data request failed with {}", status));
            return Err(ApiError::Http { status, message });
        }
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Candle request with the caller's parameters passed through untouched.
    pub async fn klines_raw(&self, params: &KlinesParams) -> ApiResult<Forwarded> {
        self.forward(self.routes.klines(), params).await
    }

    /// Ticker request with the caller's parameters passed through untouched.
    pub async fn ticker_raw(&self, params: &TickerParams) -> ApiResult<Forwarded> {
        self.forward(self.routes.ticker(), params).await
    }

    /// Candles for `pair` between `start` and `end` (epoch seconds on the wire).
    pub async fn get_klines(
        &self,
        pair: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ApiResult<Vec<KlineResponse>> {
        let params = KlinesParams {
            symbol: Some(pair.to_string()),
            interval: Some(interval.to_string()),
            start_time: Some(start.timestamp().to_string()),
            end_time: Some(end.timestamp().to_string()),
        };
        self.typed(self.routes.klines(), &params).await
    }

    pub async fn get_ticker(&self, pair: &str) -> ApiResult<TickerResponse> {
        let params = TickerParams {
            symbol: Some(pair.to_string()),
        };
        self.typed(self.routes.ticker(), &params).await
    }
}
