//! In-memory candle series for the live chart.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use crate::api::KlineResponse;

/// One OHLC bar keyed by its bucket start (epoch seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

impl TryFrom<&KlineResponse> for Candle {
    type Error = anyhow::Error;

    fn try_from(kline: &KlineResponse) -> Result<Self> {
        let time = parse_time(&kline.start)
            .ok_or_else(|| anyhow!("unparsable candle start: {}", kline.start))?;
        Ok(Candle {
            time,
            open: kline.open,
            high: kline.high,
            low: kline.low,
            close: kline.close,
            volume: kline.volume,
        })
    }
}

/// Parse an exchange timestamp into epoch seconds.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD[T ]HH:MM:SS` (read as UTC), and
/// numeric epochs in seconds, milliseconds or microseconds.
pub fn parse_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(n) = raw.parse::<i64>() {
        return Some(epoch_seconds(n));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().timestamp())
}

/// Normalize a numeric epoch of unknown unit to seconds.
pub fn epoch_seconds(n: i64) -> i64 {
    match n.abs() {
        v if v >= 1_000_000_000_000_000 => n / 1_000_000,
        v if v >= 1_000_000_000_000 => n / 1_000,
        _ => n,
    }
}

/// What an incremental update did to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleUpdate {
    Appended,
    Replaced,
    /// Older than anything we could place; ignored
    Stale,
}

/// Time-ordered, de-duplicated candle buffer with a fixed capacity.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    bars: VecDeque<Candle>,
    capacity: usize,
}

impl CandleSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.bars.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.bars.iter()
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    /// Merge one streamed bar. The current bar is replaced in place, a
    /// newer bar is appended, and an older bar only replaces an existing
    /// bucket.
    pub fn apply(&mut self, candle: Candle) -> CandleUpdate {
        let Some(last) = self.bars.back_mut() else {
            self.bars.push_back(candle);
            return CandleUpdate::Appended;
        };

        if candle.time == last.time {
            *last = candle;
            return CandleUpdate::Replaced;
        }
        if candle.time > last.time {
            self.bars.push_back(candle);
            self.trim();
            return CandleUpdate::Appended;
        }

        match self.bars.binary_search_by_key(&candle.time, |c| c.time) {
            Ok(idx) => {
                self.bars[idx] = candle;
                CandleUpdate::Replaced
            }
            Err(_) => CandleUpdate::Stale,
        }
    }

    /// Install a historical window under whatever the stream already
    /// delivered. History wins for older buckets; streamed bars win from
    /// the last historical bucket onward.
    pub fn backfill(&mut self, mut history: Vec<Candle>) {
        history.sort_by_key(|c| c.time);
        history.dedup_by_key(|c| c.time);

        let Some(history_end) = history.last().map(|c| c.time) else {
            return;
        };

        let live: Vec<Candle> = self
            .bars
            .iter()
            .filter(|c| c.time >= history_end)
            .copied()
            .collect();

        self.bars = history.into();
        for candle in live {
            self.apply(candle);
        }
        self.trim();
    }

    fn trim(&mut self) {
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn test_parse_time_formats() {
        assert_eq!(parse_time("2024-05-21 12:00:00"), Some(1716292800));
        assert_eq!(parse_time("2024-05-21T12:00:00"), Some(1716292800));
        assert_eq!(parse_time("2024-05-21T12:00:00Z"), Some(1716292800));
        assert_eq!(parse_time("1716292800000"), Some(1716292800));
        assert_eq!(parse_time("1716292800000000"), Some(1716292800));
        assert_eq!(parse_time("yesterday"), None);
    }

    #[test]
    fn test_apply_updates() {
        let mut series = CandleSeries::new(10);
        assert_eq!(series.apply(bar(60, dec!(1))), CandleUpdate::Appended);
        assert_eq!(series.apply(bar(120, dec!(2))), CandleUpdate::Appended);

        // Same bucket: in-progress bar updated
        assert_eq!(series.apply(bar(120, dec!(2.5))), CandleUpdate::Replaced);
        assert_eq!(series.last().unwrap().close, dec!(2.5));

        // Late update to an earlier bucket we hold
        assert_eq!(series.apply(bar(60, dec!(1.1))), CandleUpdate::Replaced);
        // Earlier bucket we never had
        assert_eq!(series.apply(bar(30, dec!(9))), CandleUpdate::Stale);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_capacity() {
        let mut series = CandleSeries::new(3);
        for t in 1..=5 {
            series.apply(bar(t * 60, Decimal::from(t)));
        }
        let times: Vec<i64> = series.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![180, 240, 300]);
    }

    #[test]
    fn test_backfill_keeps_newer_stream_bars() {
        let mut series = CandleSeries::new(100);
        // Stream delivered before history arrived
        series.apply(bar(180, dec!(30)));
        series.apply(bar(240, dec!(40)));

        let history = vec![bar(120, dec!(2)), bar(60, dec!(1)), bar(180, dec!(3)), bar(120, dec!(2))];
        series.backfill(history);

        let closes: Vec<(i64, Decimal)> = series.iter().map(|c| (c.time, c.close)).collect();
        assert_eq!(
            closes,
            vec![(60, dec!(1)), (120, dec!(2)), (180, dec!(30)), (240, dec!(40))]
        );
    }

    #[test]
    fn test_backfill_empty_history_is_noop() {
        let mut series = CandleSeries::new(100);
        series.apply(bar(60, dec!(1)));
        series.backfill(Vec::new());
        assert_eq!(series.len(), 1);
    }
}
