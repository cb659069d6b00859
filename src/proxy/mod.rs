//! Market-data proxy: forwards candle and ticker queries to the exchange.

mod error;
mod routes;

pub use error::ProxyError;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::MarketClient;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Exchange REST client
    pub market: Arc<MarketClient>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/klines", get(routes::klines))
        .route("/api/ticker", get(routes::ticker))
        .with_state(state)
        .layer(cors)
}

/// Bind `bind_addr` and serve until Ctrl+C.
pub async fn serve(market: MarketClient, bind_addr: &str) -> Result<()> {
    let app = router(AppState {
        market: Arc::new(market),
    });

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "Market-data proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down proxy");
        })
        .await
        .context("Proxy server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MarketRoutes;
    use crate::testing::{spawn_mock_exchange, spawn_router, FAILING_PAIR};
    use reqwest::StatusCode;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    async fn spawn_proxy(upstream: &str) -> String {
        let market = MarketClient::with_base_url(upstream, MarketRoutes::Exchange).unwrap();
        spawn_router(router(AppState {
            market: Arc::new(market),
        }))
        .await
    }

    async fn get_json(url: String) -> (StatusCode, Value) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_klines_forwards_query() {
        let proxy = spawn_proxy(&spawn_mock_exchange().await).await;

        let (status, body) = get_json(format!(
            "{}/api/klines?symbol=SOL_USDC&interval=5m&startTime=100&endTime=200",
            proxy
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body[0]["query"],
            json!({ "symbol": "SOL_USDC", "interval": "5m", "startTime": "100", "endTime": "200" })
        );
        assert_eq!(body[0]["close"], "150");
    }

    #[tokio::test]
    async fn test_klines_defaults() {
        let proxy = spawn_proxy(&spawn_mock_exchange().await).await;

        let (status, body) =
            get_json(format!("{}/api/klines?symbol=BTC_USDC&startTime=", proxy)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["query"], json!({ "symbol": "BTC_USDC", "interval": "1m" }));
    }

    #[tokio::test]
    async fn test_repeated_keys_use_first_value() {
        let proxy = spawn_proxy(&spawn_mock_exchange().await).await;

        let (status, body) = get_json(format!(
            "{}/api/klines?symbol=SOL_USDC&symbol=BTC_USDC&interval=5m&interval=1h",
            proxy
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["query"], json!({ "symbol": "SOL_USDC", "interval": "5m" }));

        let (status, body) =
            get_json(format!("{}/api/ticker?symbol=ETH_USDC&symbol=SOL_USDC", proxy)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lastPrice"], "3000");
    }

    #[tokio::test]
    async fn test_missing_symbol() {
        let proxy = spawn_proxy(&spawn_mock_exchange().await).await;

        for path in ["/api/klines", "/api/ticker", "/api/ticker?symbol="] {
            let (status, body) = get_json(format!("{}{}", proxy, path)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({ "error": "Symbol is required" }));
        }
    }

    #[tokio::test]
    async fn test_ticker_passthrough() {
        let proxy = spawn_proxy(&spawn_mock_exchange().await).await;

        let (status, body) = get_json(format!("{}/api/ticker?symbol=ETH_USDC", proxy)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lastPrice"], "3000");
        assert_eq!(body["query"], json!({ "symbol": "ETH_USDC" }));
    }

    #[tokio::test]
    async fn test_upstream_status_is_relayed() {
        let proxy = spawn_proxy(&spawn_mock_exchange().await).await;

        let (status, body) =
            get_json(format!("{}/api/klines?symbol={}", proxy, FAILING_PAIR)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({ "error": "Failed to fetch klines from Backpack Exchange" }));

        let (status, body) =
            get_json(format!("{}/api/ticker?symbol={}", proxy, FAILING_PAIR)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({ "error": "Failed to fetch ticker from Backpack Exchange" }));
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        let proxy = spawn_proxy("http://127.0.0.1:9").await;

        let (status, body) = get_json(format!("{}/api/ticker?symbol=SOL_USDC", proxy)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn test_market_client_through_proxy() {
        let proxy = spawn_proxy(&spawn_mock_exchange().await).await;
        let client = MarketClient::with_base_url(&proxy, MarketRoutes::Proxy).unwrap();

        let ticker = client.get_ticker("BTC_USDC").await.unwrap();
        assert_eq!(ticker.last_price, dec!(60000));

        let err = client.get_ticker(FAILING_PAIR).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.to_string(), "Failed to fetch ticker from Backpack Exchange");
    }
}
