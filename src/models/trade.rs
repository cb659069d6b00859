//! Trade model: a leveraged long/short position owned by the backend.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::asset_label;

/// Direction of a leveraged position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Long,
    Short,
}

impl PositionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionType::Long => "long",
            PositionType::Short => "short",
        }
    }
}

impl std::str::FromStr for PositionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(PositionType::Long),
            "short" | "sell" => Ok(PositionType::Short),
            other => anyhow::bail!("Unknown position type: {}", other),
        }
    }
}

/// Trade record as returned by `/trade/trades` and `/trade/active-trades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,

    /// Margin committed when the position was opened
    #[serde(default)]
    pub open_price: Decimal,

    /// Value returned when the position was closed
    #[serde(default)]
    pub close_price: Decimal,

    pub leverage: Decimal,

    /// Realized P&L, meaningful once liquidated
    #[serde(default)]
    pub pnl: Decimal,

    pub asset_id: i64,

    #[serde(default)]
    pub liquidated: bool,

    #[serde(default)]
    pub user_id: String,

    /// Asset price at entry
    pub asset_price: Decimal,

    pub quantity: Decimal,

    #[serde(rename = "type")]
    pub position_type: PositionType,
}

impl Trade {
    pub fn asset_symbol(&self) -> &'static str {
        asset_label(self.asset_id)
    }

    pub fn is_active(&self) -> bool {
        !self.liquidated
    }

    /// P&L to display: realized once liquidated, otherwise marked to
    /// `current_price`. Zero when no price is known.
    pub fn display_pnl(&self, current_price: Option<Decimal>) -> Decimal {
        if self.liquidated {
            return self.pnl;
        }
        let Some(current) = current_price else {
            return Decimal::ZERO;
        };
        if current.is_zero() {
            return Decimal::ZERO;
        }

        let price_diff = match self.position_type {
            PositionType::Long => current - self.asset_price,
            PositionType::Short => self.asset_price - current,
        };
        price_diff * self.quantity * self.leverage
    }

    /// P&L as a percentage of the committed margin.
    pub fn pnl_percentage(&self, pnl: Decimal) -> Decimal {
        if self.open_price > Decimal::ZERO {
            pnl / self.open_price * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_trade(id: &str, position_type: PositionType, liquidated: bool, pnl: Decimal) -> Trade {
    use rust_decimal_macros::dec;

    Trade {
        id: id.to_string(),
        open_price: dec!(1000),
        close_price: Decimal::ZERO,
        leverage: dec!(10),
        pnl,
        asset_id: 1,
        liquidated,
        user_id: "user-1".to_string(),
        asset_price: dec!(50000),
        quantity: dec!(0.02),
        position_type,
    }
}
