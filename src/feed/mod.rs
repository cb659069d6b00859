//! Live chart feed: historical candles, the exchange stream, and a ticker
//! poller, reconciled into one `ChartState`.

mod candles;
mod chart;
mod stream;
mod ticker;

pub use chart::{ChartFeed, ChartState};
pub use stream::EXCHANGE_WS_URL;
