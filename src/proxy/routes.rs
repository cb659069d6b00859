//! `GET /api/klines` and `GET /api/ticker`.

use axum::extract::{Query, State};
use axum::Json;
use serde_json::Value;
use tracing::debug;

use super::error::ProxyError;
use super::AppState;
use crate::api::{ApiResult, Forwarded, KlinesParams, TickerParams};

const DEFAULT_INTERVAL: &str = "1m";

/// Raw query pairs in request order; a key may repeat.
type QueryPairs = Vec<(String, String)>;

/// First value given for `key`. Empty values count as absent.
fn first(pairs: &QueryPairs, key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
}

fn relay(resource: &'static str, outcome: ApiResult<Forwarded>) -> Result<Json<Value>, ProxyError> {
    match outcome {
        Ok(Forwarded::Body(body)) => Ok(Json(body)),
        Ok(Forwarded::Status(status)) => Err(ProxyError::Upstream { resource, status }),
        Err(e) => Err(ProxyError::Internal(e.to_string())),
    }
}

pub async fn klines(
    State(state): State<AppState>,
    Query(query): Query<QueryPairs>,
) -> Result<Json<Value>, ProxyError> {
    let symbol = first(&query, "symbol").ok_or(ProxyError::MissingSymbol)?;

    let params = KlinesParams {
        symbol: Some(symbol),
        interval: Some(first(&query, "interval").unwrap_or_else(|| DEFAULT_INTERVAL.to_string())),
        start_time: first(&query, "startTime"),
        end_time: first(&query, "endTime"),
    };
    debug!(params = ?params, "Forwarding klines");

    relay("klines", state.market.klines_raw(&params).await)
}

pub async fn ticker(
    State(state): State<AppState>,
    Query(query): Query<QueryPairs>,
) -> Result<Json<Value>, ProxyError> {
    let symbol = first(&query, "symbol").ok_or(ProxyError::MissingSymbol)?;
    debug!(symbol = %symbol, "Forwarding ticker");

    let params = TickerParams {
        symbol: Some(symbol),
    };
    relay("ticker", state.market.ticker_raw(&params).await)
}
