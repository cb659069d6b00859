//! Chart state and the feed that keeps it current.
//!
//! Every asset selection starts a new generation. All writers (history
//! loader, stream, ticker refresher) tag their updates with the generation
//! they were started under, and the state drops anything that does not
//! match the current one.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use super::candles::{Candle, CandleSeries, CandleUpdate};
use super::stream::{kline_channel, run_stream, ticker_channel, StreamEvent, Subscription};
use super::ticker::TickerSummary;
use crate::api::MarketClient;
use crate::config::FeedConfig;
use crate::models::AssetSymbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Offline,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Live => "live",
            ConnectionStatus::Offline => "offline",
        };
        write!(f, "{}", label)
    }
}

pub type SharedChart = Arc<RwLock<ChartState>>;

#[derive(Debug)]
pub struct ChartState {
    generation: u64,
    asset: Option<AssetSymbol>,
    candles: CandleSeries,
    ticker: Option<TickerSummary>,
    status: ConnectionStatus,
    loading: bool,
    /// Updates rejected for belonging to an older generation
    dropped_updates: u64,
}

impl ChartState {
    pub fn new(capacity: usize) -> Self {
        Self {
            generation: 0,
            asset: None,
            candles: CandleSeries::new(capacity),
            ticker: None,
            status: ConnectionStatus::Offline,
            loading: false,
            dropped_updates: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn asset(&self) -> Option<AssetSymbol> {
        self.asset
    }

    pub fn candles(&self) -> &CandleSeries {
        &self.candles
    }

    pub fn ticker(&self) -> Option<&TickerSummary> {
        self.ticker.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates
    }

    /// Switch to `asset`: new generation, empty series, no ticker.
    pub fn begin(&mut self, asset: AssetSymbol) -> u64 {
        self.generation += 1;
        self.asset = Some(asset);
        self.candles.clear();
        self.ticker = None;
        self.status = ConnectionStatus::Connecting;
        self.loading = true;
        self.generation
    }

    /// Stop accepting updates without selecting anything new.
    pub fn retire(&mut self) {
        self.generation += 1;
        self.status = ConnectionStatus::Offline;
        self.loading = false;
    }

    fn accepts(&mut self, generation: u64) -> bool {
        if generation == self.generation {
            true
        } else {
            self.dropped_updates += 1;
            false
        }
    }

    pub fn apply_event(&mut self, generation: u64, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Candle(candle) => self.apply_candle(generation, candle).is_some(),
            StreamEvent::Ticker(ticker) => self.apply_ticker(generation, ticker),
        }
    }

    pub fn apply_candle(&mut self, generation: u64, candle: Candle) -> Option<CandleUpdate> {
        if !self.accepts(generation) {
            return None;
        }
        Some(self.candles.apply(candle))
    }

    pub fn apply_ticker(&mut self, generation: u64, ticker: TickerSummary) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.ticker = Some(ticker);
        true
    }

    pub fn set_status(&mut self, generation: u64, status: ConnectionStatus) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.status = status;
        true
    }

    /// Install history and end the loading phase.
    pub fn backfill(&mut self, generation: u64, history: Vec<Candle>) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.candles.backfill(history);
        self.loading = false;
        true
    }

    pub fn finish_loading(&mut self, generation: u64) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.loading = false;
        true
    }
}

/// Owns the chart state and the subscription serving the selected asset.
pub struct ChartFeed {
    config: FeedConfig,
    market: MarketClient,
    ws_url: String,
    state: SharedChart,
    asset: Option<AssetSymbol>,
    active: Option<Subscription>,
}

impl ChartFeed {
    pub fn new(config: FeedConfig, market: MarketClient, ws_url: impl Into<String>) -> Self {
        let state = Arc::new(RwLock::new(ChartState::new(config.capacity)));
        Self {
            config,
            market,
            ws_url: ws_url.into(),
            state,
            asset: None,
            active: None,
        }
    }

    pub fn state(&self) -> SharedChart {
        Arc::clone(&self.state)
    }

    pub fn asset(&self) -> Option<AssetSymbol> {
        self.asset
    }

    /// Switch the chart to `asset`.
    ///
    /// The generation is bumped first, under the state lock, so anything
    /// the old subscription still delivers is dropped. The old connection
    /// is then closed before the new one is opened. Reselecting the active
    /// asset does nothing.
    pub async fn select_asset(&mut self, asset: AssetSymbol) {
        if self.active.is_some() && self.asset == Some(asset) {
            debug!(asset = %asset, "Asset already selected");
            return;
        }

        let generation = self.state.write().await.begin(asset);

        if let Some(previous) = self.active.take() {
            previous.close().await;
        }

        info!(asset = %asset, generation, "Chart switched");

        let pair = asset.pair();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut subscription = Subscription::new(pair.to_string(), generation, shutdown_tx);

        let channels = vec![
            kline_channel(pair, &self.config.interval),
            ticker_channel(pair),
        ];
        subscription.attach(tokio::spawn(run_stream(
            self.ws_url.clone(),
            channels,
            generation,
            self.state(),
            shutdown_rx.clone(),
        )));
        subscription.attach(tokio::spawn(load_history(
            self.market.clone(),
            self.config.clone(),
            pair.to_string(),
            generation,
            self.state(),
            shutdown_rx.clone(),
        )));
        subscription.attach(tokio::spawn(refresh_ticker(
            self.market.clone(),
            self.config.clone(),
            pair.to_string(),
            generation,
            self.state(),
            shutdown_rx,
        )));

        self.asset = Some(asset);
        self.active = Some(subscription);
    }

    /// Tear down the active subscription, if any.
    pub async fn close(&mut self) {
        self.state.write().await.retire();
        self.asset = None;
        if let Some(active) = self.active.take() {
            active.close().await;
        }
    }
}

async fn load_history(
    market: MarketClient,
    config: FeedConfig,
    pair: String,
    generation: u64,
    chart: SharedChart,
    mut shutdown: watch::Receiver<bool>,
) {
    let end = Utc::now();
    let start = end - config.lookback;

    let result = tokio::select! {
        result = market.get_klines(&pair, &config.interval, start, end) => result,
        _ = shutdown.changed() => return,
    };

    match result {
        Ok(klines) => {
            let history: Vec<Candle> = klines
                .iter()
                .filter_map(|k| match Candle::try_from(k) {
                    Ok(candle) => Some(candle),
                    Err(e) => {
                        debug!(error = %e, "Skipping candle");
                        None
                    }
                })
                .collect();
            debug!(pair = %pair, candles = history.len(), "History loaded");
            chart.write().await.backfill(generation, history);
        }
        Err(e) => {
            warn!(pair = %pair, error = %e, "Failed to fetch historical data");
            chart.write().await.finish_loading(generation);
        }
    }
}

/// Poll the ticker snapshot until shutdown. The first tick fires at once
/// and doubles as the initial fetch.
async fn refresh_ticker(
    market: MarketClient,
    config: FeedConfig,
    pair: String,
    generation: u64,
    chart: SharedChart,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(config.ticker_refresh);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }

        // Shutdown also cuts an in-flight request short
        let result = tokio::select! {
            result = market.get_ticker(&pair) => result,
            _ = shutdown.changed() => break,
        };

        match result {
            Ok(ticker) => {
                chart.write().await.apply_ticker(generation, ticker.into());
            }
            Err(e) => warn!(pair = %pair, error = %e, "Failed to fetch ticker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bar(time: i64, close: Decimal) -> Candle {
        Candle {
            time,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
        }
    }

    #[test]
    fn test_begin_resets_state() {
        let mut state = ChartState::new(100);
        let first = state.begin(AssetSymbol::Sol);
        state.apply_candle(first, bar(60, dec!(150)));
        state.set_status(first, ConnectionStatus::Live);

        let second = state.begin(AssetSymbol::Btc);
        assert_eq!(second, first + 1);
        assert!(state.candles().is_empty());
        assert!(state.ticker().is_none());
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert!(state.is_loading());
        assert_eq!(state.asset(), Some(AssetSymbol::Btc));
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let mut state = ChartState::new(100);
        let old = state.begin(AssetSymbol::Sol);
        let current = state.begin(AssetSymbol::Eth);

        assert!(state.apply_candle(old, bar(60, dec!(150))).is_none());
        assert!(!state.set_status(old, ConnectionStatus::Offline));
        assert!(!state.backfill(old, vec![bar(60, dec!(1))]));
        assert!(state.candles().is_empty());
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert_eq!(state.dropped_updates(), 3);

        assert_eq!(
            state.apply_candle(current, bar(60, dec!(3000))),
            Some(CandleUpdate::Appended)
        );
        assert!(state.backfill(current, vec![bar(0, dec!(2990))]));
        assert!(!state.is_loading());
        assert_eq!(state.candles().len(), 2);
    }

    #[test]
    fn test_retire_blocks_everything() {
        let mut state = ChartState::new(100);
        let generation = state.begin(AssetSymbol::Sol);
        state.retire();

        assert!(!state.finish_loading(generation));
        assert_eq!(state.status(), ConnectionStatus::Offline);
        assert!(!state.is_loading());
    }
}
