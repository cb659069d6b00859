//! Create-trade and liquidate forms.
//!
//! Both forms keep their raw text inputs, validate them into backend
//! requests, and report the outcome through the notifier.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::info;

use crate::api::{BackendClient, CreateTradeRequest, LiquidateRequest};
use crate::models::{Asset, AssetSymbol, Leverage, PositionType, Trade};
use crate::notify::{NotificationKind, Notifier};

/// Input rejected before reaching the backend.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct FormError {
    pub message: String,
    pub kind: NotificationKind,
}

impl FormError {
    fn warning(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: NotificationKind::Warning,
        }
    }

    fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: NotificationKind::Error,
        }
    }
}

const INVALID_QUANTITY: &str = "Please enter a valid quantity";

fn parse_positive(raw: &str) -> Result<Decimal, FormError> {
    let value = Decimal::from_str(raw.trim()).map_err(|_| FormError::warning(INVALID_QUANTITY))?;
    if value <= Decimal::ZERO {
        return Err(FormError::warning(INVALID_QUANTITY));
    }
    Ok(value)
}

/// New position form.
#[derive(Debug, Clone)]
pub struct TradeForm {
    pub asset: AssetSymbol,
    pub position_type: PositionType,
    pub leverage: Leverage,
    pub quantity: String,
    /// Slippage tolerance in bips
    pub slippage: String,
}

impl Default for TradeForm {
    fn default() -> Self {
        Self {
            asset: AssetSymbol::Btc,
            position_type: PositionType::Long,
            leverage: Leverage::default(),
            quantity: String::new(),
            slippage: "1".to_string(),
        }
    }
}

impl TradeForm {
    /// Check inputs and build the request body.
    ///
    /// `supported` is the backend's asset listing; an empty listing
    /// skips the asset check.
    pub fn validate(&self, supported: &[Asset]) -> Result<CreateTradeRequest, FormError> {
        let quantity = parse_positive(&self.quantity)?;

        if !supported.is_empty() && !supported.iter().any(|a| a.symbol == self.asset.as_str()) {
            return Err(FormError::warning("Asset is not supported"));
        }

        let slippage = if self.slippage.trim().is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from_str(self.slippage.trim())
                .ok()
                .filter(|s| *s >= Decimal::ZERO)
                .ok_or_else(|| FormError::warning("Please enter a valid slippage"))?
        };

        Ok(CreateTradeRequest {
            asset: self.asset,
            position_type: self.position_type,
            leverage: self.leverage,
            quantity,
            slippage,
        })
    }

    pub fn submit_label(&self) -> &'static str {
        match self.position_type {
            PositionType::Long => "Open Long Position",
            PositionType::Short => "Open Short Position",
        }
    }

    /// Validate and place the trade. Clears the quantity on success.
    pub async fn submit(
        &mut self,
        client: &BackendClient,
        supported: &[Asset],
        notifier: &mut Notifier,
    ) -> bool {
        let request = match self.validate(supported) {
            Ok(request) => request,
            Err(e) => {
                notifier.show(e.message, e.kind);
                return false;
            }
        };

        info!(
            asset = %request.asset,
            side = request.position_type.as_str(),
            leverage = %request.leverage,
            quantity = %request.quantity,
            "Placing trade"
        );

        match client.create_trade(&request).await {
            Ok(_) => {
                notifier.success("Trade placed successfully!");
                self.quantity.clear();
                true
            }
            Err(e) => {
                notifier.error(e.user_message("Failed to place trade"));
                false
            }
        }
    }
}

/// Quick-fill shares of the available quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityPreset {
    Quarter,
    Half,
    ThreeQuarters,
    Max,
}

impl QuantityPreset {
    fn fraction(&self) -> Decimal {
        match self {
            QuantityPreset::Quarter => Decimal::new(25, 2),
            QuantityPreset::Half => Decimal::new(5, 1),
            QuantityPreset::ThreeQuarters => Decimal::new(75, 2),
            QuantityPreset::Max => Decimal::ONE,
        }
    }
}

impl FromStr for QuantityPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('%').to_lowercase().as_str() {
            "25" => Ok(QuantityPreset::Quarter),
            "50" => Ok(QuantityPreset::Half),
            "75" => Ok(QuantityPreset::ThreeQuarters),
            "100" | "max" => Ok(QuantityPreset::Max),
            other => anyhow::bail!("Unknown preset: {}", other),
        }
    }
}

/// Partial or full close of an open trade.
#[derive(Debug, Clone)]
pub struct LiquidateForm {
    trade: Trade,
    pub quantity: String,
}

impl LiquidateForm {
    /// Starts with the full available quantity.
    pub fn new(trade: Trade) -> Self {
        let quantity = trade.quantity.normalize().to_string();
        Self { trade, quantity }
    }

    pub fn trade(&self) -> &Trade {
        &self.trade
    }

    /// Fill the quantity with a share of the position, 4 decimal places,
    /// rounded toward zero so it never exceeds what is available.
    pub fn apply_preset(&mut self, preset: QuantityPreset) {
        let amount = (self.trade.quantity * preset.fraction())
            .round_dp_with_strategy(4, RoundingStrategy::ToZero);
        self.quantity = format!("{:.4}", amount);
    }

    pub fn validate(&self) -> Result<LiquidateRequest, FormError> {
        let quantity = parse_positive(&self.quantity)?;
        if quantity > self.trade.quantity {
            return Err(FormError::error("Quantity exceeds available amount"));
        }
        Ok(LiquidateRequest {
            id: self.trade.id.clone(),
            quantity,
        })
    }

    pub async fn submit(&self, client: &BackendClient, notifier: &mut Notifier) -> bool {
        let request = match self.validate() {
            Ok(request) => request,
            Err(e) => {
                notifier.show(e.message, e.kind);
                return false;
            }
        };

        info!(id = %request.id, quantity = %request.quantity, "Liquidating trade");

        match client.liquidate_trade(&request).await {
            Ok(_) => {
                notifier.success("Trade liquidated successfully!");
                true
            }
            Err(e) => {
                notifier.error(e.user_message("Failed to liquidate trade"));
                false
            }
        }
    }
}
