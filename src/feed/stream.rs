//! Exchange websocket subscriber.
//!
//! One connection per selected asset, subscribed to the candle and ticker
//! channels of its pair. Frames are decoded into `StreamEvent`s and
//! applied to the chart state under the subscription's generation.

use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::candles::{epoch_seconds, parse_time, Candle};
use super::chart::{ConnectionStatus, SharedChart};
use super::ticker::{StreamTicker, TickerSummary};

pub const EXCHANGE_WS_URL: &str = "wss://ws.backpack.exchange";

pub fn kline_channel(pair: &str, interval: &str) -> String {
    format!("kline.{}.{}", interval, pair)
}

pub fn ticker_channel(pair: &str) -> String {
    format!("ticker.{}", pair)
}

pub fn subscribe_message(channel: &str) -> String {
    json!({ "method": "SUBSCRIBE", "params": [channel] }).to_string()
}

/// Decoded stream update.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Candle(Candle),
    Ticker(TickerSummary),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    stream: String,
    data: Value,
}

/// Candle payload on the `kline.<interval>.<PAIR>` stream.
#[derive(Debug, Deserialize)]
struct StreamKline {
    #[serde(rename = "t")]
    start: Value,
    #[serde(rename = "o")]
    open: Decimal,
    #[serde(rename = "h")]
    high: Decimal,
    #[serde(rename = "l")]
    low: Decimal,
    #[serde(rename = "c")]
    close: Decimal,
    #[serde(rename = "v", default)]
    volume: Decimal,
}

impl StreamKline {
    fn into_candle(self) -> Option<Candle> {
        let time = match &self.start {
            Value::String(s) => parse_time(s)?,
            Value::Number(n) => epoch_seconds(n.as_i64()?),
            _ => return None,
        };
        Some(Candle {
            time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// Decode one text frame. Anything that is not a candle or ticker update
/// (acks, pongs, garbage) yields `None`.
pub fn parse_frame(text: &str) -> Option<StreamEvent> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;

    if envelope.stream.starts_with("kline.") {
        let kline: StreamKline = serde_json::from_value(envelope.data).ok()?;
        return kline.into_candle().map(StreamEvent::Candle);
    }
    if envelope.stream.starts_with("ticker.") {
        let ticker: StreamTicker = serde_json::from_value(envelope.data).ok()?;
        return Some(StreamEvent::Ticker(ticker.into()));
    }
    None
}

/// Handle to the tasks serving one asset selection.
///
/// Closing consumes the handle; dropping an unclosed handle closes it.
/// Either way the shutdown signal fires exactly once.
pub struct Subscription {
    pair: String,
    generation: u64,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(pair: String, generation: u64, shutdown: watch::Sender<bool>) -> Self {
        Self {
            pair,
            generation,
            shutdown: Some(shutdown),
            tasks: Vec::new(),
        }
    }

    pub(crate) fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Signal shutdown and wait for the tasks to wind down.
    pub async fn close(mut self) {
        self.signal_shutdown();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(pair = %self.pair, error = %e, "Feed task ended abnormally");
            }
        }
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            debug!(pair = %self.pair, generation = self.generation, "Closing subscription");
            // Receivers may already be gone; nothing to do then.
            tx.send_replace(true);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

/// Connect, subscribe, and pump frames into the chart until shutdown or
/// until the connection drops. No reconnection: a drop marks the chart
/// offline.
pub(crate) async fn run_stream(
    url: String,
    channels: Vec<String>,
    generation: u64,
    chart: SharedChart,
    mut shutdown: watch::Receiver<bool>,
) {
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = shutdown.changed() => return,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            warn!(url = %url, error = %e, "Stream connection failed");
            chart.write().await.set_status(generation, ConnectionStatus::Offline);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    for channel in &channels {
        if let Err(e) = write.send(Message::Text(subscribe_message(channel).into())).await {
            warn!(channel = %channel, error = %e, "Subscribe failed");
            chart.write().await.set_status(generation, ConnectionStatus::Offline);
            return;
        }
    }

    info!(url = %url, channels = ?channels, "Stream subscribed");
    chart.write().await.set_status(generation, ConnectionStatus::Live);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Close frame not sent");
                }
                break;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_frame(&text) {
                        chart.write().await.apply_event(generation, event);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Stream closed by server");
                    chart.write().await.set_status(generation, ConnectionStatus::Offline);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Stream error");
                    chart.write().await.set_status(generation, ConnectionStatus::Offline);
                    break;
                }
                None => {
                    chart.write().await.set_status(generation, ConnectionStatus::Offline);
                    break;
                }
            }
        }
    }

    debug!(generation, "Stream task finished");
}
