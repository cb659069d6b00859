//! Data models for trades, profiles, assets, and derived statistics.

mod asset;
mod profile;
mod stats;
mod trade;

pub use asset::{asset_label, Asset, AssetSymbol, Leverage};
pub use profile::Profile;
pub use stats::{PortfolioStats, TradeFilter, TradeHistoryStats};
pub use trade::{PositionType, Trade};

#[cfg(test)]
pub(crate) use trade::sample_trade;
