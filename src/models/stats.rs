//! Aggregations over fetched trade lists for the dashboard, history and
//! profile views.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use super::trade::{PositionType, Trade};

/// Summary shown on the dashboard for the currently open positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioStats {
    /// Sum of committed margin over active trades
    pub total_position_value: Decimal,
    pub long_positions: usize,
    pub short_positions: usize,
}

impl PortfolioStats {
    pub fn from_active(trades: &[Trade]) -> Self {
        Self {
            total_position_value: trades.iter().map(|t| t.open_price).sum(),
            long_positions: trades
                .iter()
                .filter(|t| t.position_type == PositionType::Long)
                .count(),
            short_positions: trades
                .iter()
                .filter(|t| t.position_type == PositionType::Short)
                .count(),
        }
    }
}

/// History filter tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeFilter {
    #[default]
    All,
    Active,
    Liquidated,
}

impl TradeFilter {
    pub fn matches(&self, trade: &Trade) -> bool {
        match self {
            TradeFilter::All => true,
            TradeFilter::Active => !trade.liquidated,
            TradeFilter::Liquidated => trade.liquidated,
        }
    }

    pub fn apply<'a>(&self, trades: &'a [Trade]) -> Vec<&'a Trade> {
        trades.iter().filter(|t| self.matches(t)).collect()
    }

    pub fn title(&self) -> &'static str {
        match self {
            TradeFilter::All => "All Trades",
            TradeFilter::Active => "Active Trades",
            TradeFilter::Liquidated => "Closed Trades",
        }
    }
}

impl FromStr for TradeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TradeFilter::All),
            "active" => Ok(TradeFilter::Active),
            "liquidated" | "closed" => Ok(TradeFilter::Liquidated),
            other => anyhow::bail!("Unknown filter: {}", other),
        }
    }
}

impl fmt::Display for TradeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TradeFilter::All => "all",
            TradeFilter::Active => "active",
            TradeFilter::Liquidated => "liquidated",
        };
        f.write_str(label)
    }
}

/// Counts and realized performance over the full trade history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeHistoryStats {
    pub total_trades: usize,
    pub active_trades: usize,
    pub closed_trades: usize,
    pub winning_trades: usize,
    /// Realized P&L over closed trades only
    pub total_pnl: Decimal,
}

impl TradeHistoryStats {
    pub fn calculate(trades: &[Trade]) -> Self {
        let closed: Vec<&Trade> = trades.iter().filter(|t| t.liquidated).collect();

        Self {
            total_trades: trades.len(),
            active_trades: trades.len() - closed.len(),
            closed_trades: closed.len(),
            winning_trades: closed.iter().filter(|t| t.pnl > Decimal::ZERO).count(),
            total_pnl: closed.iter().map(|t| t.pnl).sum(),
        }
    }

    /// Winning share of closed trades in percent, one decimal place.
    pub fn win_rate(&self) -> Option<Decimal> {
        if self.closed_trades == 0 {
            return None;
        }
        let rate = Decimal::from(self.winning_trades) / Decimal::from(self.closed_trades)
            * Decimal::ONE_HUNDRED;
        Some(rate.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn win_rate_label(&self) -> String {
        self.win_rate()
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "0".to_string())
    }
}
