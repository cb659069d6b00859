//! HTTP clients for the trading backend and exchange market data.

mod backend_client;
mod error;
mod market_client;
mod types;

pub use backend_client::BackendClient;
pub use error::{ApiError, ApiResult};
pub use market_client::{Forwarded, MarketClient, MarketRoutes, EXCHANGE_REST_URL};
pub use types::*;
