//! 24h price summary shown next to the chart.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::api::TickerResponse;

#[derive(Debug, Clone, PartialEq)]
pub struct TickerSummary {
    pub last_price: Decimal,
    pub price_change: Decimal,
    pub price_change_percent: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

impl TickerSummary {
    pub fn is_positive(&self) -> bool {
        self.price_change_percent >= Decimal::ZERO
    }
}

impl From<TickerResponse> for TickerSummary {
    fn from(t: TickerResponse) -> Self {
        Self {
            last_price: t.last_price,
            price_change: t.price_change,
            price_change_percent: t.price_change_percent,
            high: t.high,
            low: t.low,
            volume: t.volume,
        }
    }
}

/// Ticker payload on the `ticker.<PAIR>` stream (abbreviated keys).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamTicker {
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "v", default)]
    pub volume: Decimal,
}

impl From<StreamTicker> for TickerSummary {
    /// The stream carries open/close only; change is derived from them.
    fn from(t: StreamTicker) -> Self {
        let change = t.close - t.open;
        let change_percent = if t.open.is_zero() {
            Decimal::ZERO
        } else {
            change / t.open * Decimal::ONE_HUNDRED
        };

        Self {
            last_price: t.close,
            price_change: round_cents(change),
            price_change_percent: round_cents(change_percent),
            high: t.high,
            low: t.low,
            volume: t.volume,
        }
    }
}

/// Two decimals, halves rounded away from zero.
fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
