//! Request and response types for the trading backend and the exchange.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Asset, AssetSymbol, Leverage, PositionType, Profile, Trade};

// Backend requests

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /trade/create`. Numbers go out as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTradeRequest {
    pub asset: AssetSymbol,
    #[serde(rename = "type")]
    pub position_type: PositionType,
    pub leverage: Leverage,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Slippage tolerance in bips
    #[serde(with = "rust_decimal::serde::float")]
    pub slippage: Decimal,
}

/// Body of `POST /trade/liquidate-asset`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidateRequest {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
}

// Backend responses

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

/// Trade listings come back under a `message` key.
#[derive(Debug, Clone, Deserialize)]
pub struct TradesResponse {
    pub message: Vec<Trade>,
}

/// Balance is a decimal string under `message`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub message: String,
}

impl BalanceResponse {
    pub fn amount(&self) -> Decimal {
        self.message.trim().parse().unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupportedAssetsResponse {
    pub assets: Vec<Asset>,
}

// Exchange REST types

/// One candle from `/api/v1/klines`. Prices are decimal strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KlineResponse {
    pub start: String,
    #[serde(default)]
    pub end: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
    #[serde(default)]
    pub quote_volume: Decimal,
    #[serde(default)]
    pub trades: String,
}

/// 24h summary from `/api/v1/ticker`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerResponse {
    #[serde(default)]
    pub symbol: String,
    pub last_price: Decimal,
    #[serde(default)]
    pub price_change: Decimal,
    #[serde(default)]
    pub price_change_percent: Decimal,
    #[serde(default)]
    pub high: Decimal,
    #[serde(default)]
    pub low: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

/// Query parameters for candle requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KlinesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}
