//! Tradable assets and leverage options.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Asset the platform lets you trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetSymbol {
    Btc,
    Eth,
    Sol,
}

impl AssetSymbol {
    pub const ALL: [AssetSymbol; 3] = [AssetSymbol::Btc, AssetSymbol::Eth, AssetSymbol::Sol];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetSymbol::Btc => "BTC",
            AssetSymbol::Eth => "ETH",
            AssetSymbol::Sol => "SOL",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AssetSymbol::Btc => "Bitcoin",
            AssetSymbol::Eth => "Ethereum",
            AssetSymbol::Sol => "Solana",
        }
    }

    /// Backend numeric asset id (1 = BTC, 2 = ETH, 3 = SOL).
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(AssetSymbol::Btc),
            2 => Some(AssetSymbol::Eth),
            3 => Some(AssetSymbol::Sol),
            _ => None,
        }
    }

    /// Exchange trading pair quoted in USDC.
    pub fn pair(&self) -> &'static str {
        match self {
            AssetSymbol::Btc => "BTC_USDC",
            AssetSymbol::Eth => "ETH_USDC",
            AssetSymbol::Sol => "SOL_USDC",
        }
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetSymbol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Ok(AssetSymbol::Btc),
            "ETH" => Ok(AssetSymbol::Eth),
            "SOL" => Ok(AssetSymbol::Sol),
            other => bail!("Unsupported asset: {}", other),
        }
    }
}

/// Symbol label for a backend asset id, "Unknown" when unmapped.
pub fn asset_label(asset_id: i64) -> &'static str {
    AssetSymbol::from_id(asset_id)
        .map(|a| a.as_str())
        .unwrap_or("Unknown")
}

/// Supported asset as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image_url: String,
}

impl Asset {
    /// Option label used by the trade form, e.g. "BTC - Bitcoin".
    pub fn label(&self) -> String {
        format!("{} - {}", self.symbol, self.name)
    }
}

/// Allowed leverage multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Leverage {
    X1,
    X2,
    X5,
    X10,
    X25,
    X100,
}

impl Leverage {
    pub const OPTIONS: [Leverage; 6] = [
        Leverage::X1,
        Leverage::X2,
        Leverage::X5,
        Leverage::X10,
        Leverage::X25,
        Leverage::X100,
    ];

    pub fn multiplier(&self) -> u32 {
        match self {
            Leverage::X1 => 1,
            Leverage::X2 => 2,
            Leverage::X5 => 5,
            Leverage::X10 => 10,
            Leverage::X25 => 25,
            Leverage::X100 => 100,
        }
    }
}

impl Default for Leverage {
    fn default() -> Self {
        Leverage::X5
    }
}

impl From<Leverage> for u32 {
    fn from(l: Leverage) -> Self {
        l.multiplier()
    }
}

impl TryFrom<u32> for Leverage {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Leverage::OPTIONS
            .into_iter()
            .find(|l| l.multiplier() == value)
            .ok_or_else(|| format!("unsupported leverage {}x", value))
    }
}

impl FromStr for Leverage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().trim_end_matches(['x', 'X']);
        let value: u32 = raw.parse()?;
        Leverage::try_from(value).map_err(anyhow::Error::msg)
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}
