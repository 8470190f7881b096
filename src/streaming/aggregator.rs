// =============================================================================
// Bar Aggregator — higher-timeframe materialisation from 1-minute bars
// =============================================================================
//
// Single consumer of the producer channel. For every incoming 1-minute bar
// it persists the bar itself and recomputes the containing bucket of every
// enabled target interval from the in-memory rolling buffer, upserting the
// results in one batch. Buckets are written while still open and refined by
// each subsequent 1-minute bar; completeness is the reader's concern.
//
// The rolling buffer is private to this task — nothing else touches it.
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::storage::BarStore;
use crate::timeframes::{bucket_start, interval_to_seconds};
use crate::types::Bar;

/// 1-minute bars retained per symbol (~33 hours).
const BUFFER_CAP: usize = 2000;

pub struct BarAggregator {
    store: Arc<BarStore>,
    /// Target intervals above 1m, as (label, seconds).
    aggregate_intervals: Vec<(String, i64)>,
    /// Rolling 1-minute buffer per symbol, oldest first.
    buffers: HashMap<String, VecDeque<Bar>>,
    /// Last minute a stored-bar line was logged, per symbol.
    last_logged_minute: HashMap<String, i64>,
}

impl BarAggregator {
    /// `intervals` is the full enabled set including `1m`; labels must have
    /// been validated by the settings layer.
    pub fn new(store: Arc<BarStore>, intervals: &[String]) -> Result<Self> {
        let mut aggregate_intervals = Vec::new();
        for interval in intervals {
            if interval == "1m" {
                continue;
            }
            aggregate_intervals.push((interval.clone(), interval_to_seconds(interval)?));
        }

        info!(intervals = ?intervals, "bar aggregator initialised");

        Ok(Self {
            store,
            aggregate_intervals,
            buffers: HashMap::new(),
            last_logged_minute: HashMap::new(),
        })
    }

    /// Drain the producer channel until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Bar>) {
        while let Some(bar) = rx.recv().await {
            if let Err(e) = self.process_bar(bar) {
                // Store fault: log and keep consuming — the next bar retries.
                warn!(error = %e, "failed to persist bar batch");
            }
        }
        info!("bar aggregator stopped (all producers gone)");
    }

    /// Persist one incoming bar and refresh every containing bucket.
    /// Returns the number of rows upserted.
    pub fn process_bar(&mut self, bar: Bar) -> Result<usize> {
        if !bar.is_valid() {
            warn!(bar = %bar, "dropping bar that violates the OHLCV invariant");
            return Ok(0);
        }

        if bar.interval != "1m" {
            warn!(bar = %bar, "received non-1m bar — stored as-is, not aggregated");
            return self.store.upsert_bars(std::slice::from_ref(&bar));
        }

        let symbol = bar.symbol.clone();
        let latest_ts = bar.ts;

        let buffer = self.buffers.entry(symbol.clone()).or_default();
        buffer.push_back(bar.clone());
        while buffer.len() > BUFFER_CAP {
            buffer.pop_front();
        }

        let mut batch = vec![bar];
        for (interval, secs) in &self.aggregate_intervals {
            if let Some(agg) = aggregate_bucket(
                self.buffers.get(&symbol).expect("buffer just inserted"),
                &symbol,
                interval,
                *secs,
                latest_ts,
            ) {
                batch.push(agg);
            }
        }

        let written = self.store.upsert_bars(&batch)?;

        self.log_throttled(&symbol, latest_ts, written);
        Ok(written)
    }

    /// At most one stored-bar log line per minute per symbol.
    fn log_throttled(&mut self, symbol: &str, ts: i64, written: usize) {
        let minute = ts / 60;
        let last = self.last_logged_minute.get(symbol).copied().unwrap_or(0);
        if minute > last {
            self.last_logged_minute.insert(symbol.to_string(), minute);
            info!(
                symbol = %symbol,
                ts,
                aggregated = written.saturating_sub(1),
                "1m bar stored"
            );
        }
    }
}

/// Fold the buffered 1-minute bars of the bucket containing `latest_ts`
/// into one `interval` bar, or `None` when the buffer holds none of them.
fn aggregate_bucket(
    buffer: &VecDeque<Bar>,
    symbol: &str,
    interval: &str,
    interval_secs: i64,
    latest_ts: i64,
) -> Option<Bar> {
    let start = bucket_start(latest_ts, interval_secs);
    let end = start + interval_secs;

    let mut in_bucket: Vec<&Bar> = buffer
        .iter()
        .filter(|b| b.ts >= start && b.ts < end)
        .collect();
    if in_bucket.is_empty() {
        return None;
    }

    // Arrival order is ts order per producer, but sort anyway so the fold
    // never depends on it.
    in_bucket.sort_by_key(|b| b.ts);

    let open = in_bucket.first()?.open;
    let close = in_bucket.last()?.close;
    let high = in_bucket.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = in_bucket.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volume = in_bucket.iter().map(|b| b.volume).sum();

    Some(Bar {
        symbol: symbol.to_string(),
        interval: interval.to_string(),
        ts: start,
        open,
        high,
        low,
        close,
        volume,
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static STORE_SEQ: AtomicU32 = AtomicU32::new(0);

    fn temp_store() -> Arc<BarStore> {
        let seq = STORE_SEQ.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "borealis-agg-test-{}-{}.db",
            std::process::id(),
            seq
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(BarStore::open(&path).expect("open temp store"))
    }

    fn intervals(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn minute_bar(ts: i64, close: f64) -> Bar {
        Bar {
            symbol: "BTCUSDT".into(),
            interval: "1m".into(),
            ts,
            open: close,
            high: close + 0.1,
            low: close - 0.1,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn five_minutes_fold_into_one_bucket() {
        let store = temp_store();
        let mut agg = BarAggregator::new(store.clone(), &intervals(&["1m", "5m"])).unwrap();

        for (i, close) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().enumerate() {
            agg.process_bar(minute_bar(i as i64 * 60, *close)).unwrap();
        }

        let five = store.fetch_bars("BTCUSDT", "5m", 10).unwrap();
        assert_eq!(five.len(), 1);
        let b = &five[0];
        assert_eq!(b.ts, 0);
        assert_eq!(b.open, 1.0);
        assert_eq!(b.close, 5.0);
        assert!((b.high - 5.1).abs() < 1e-12);
        assert!((b.low - 0.9).abs() < 1e-12);
        assert!((b.volume - 5.0).abs() < 1e-12);
    }

    #[test]
    fn refeeding_the_same_bars_is_idempotent() {
        let store = temp_store();
        let mut agg = BarAggregator::new(store.clone(), &intervals(&["1m", "5m"])).unwrap();

        for round in 0..2 {
            for (i, close) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().enumerate() {
                agg.process_bar(minute_bar(i as i64 * 60, *close)).unwrap();
            }
            let five = store.fetch_bars("BTCUSDT", "5m", 10).unwrap();
            assert_eq!(five.len(), 1, "round {round}");
            assert_eq!(five[0].close, 5.0);
            assert_eq!(five[0].volume, 5.0);
        }

        assert_eq!(store.bar_count("BTCUSDT", "1m").unwrap(), 5);
    }

    #[test]
    fn partial_bucket_is_written_and_refined() {
        let store = temp_store();
        let mut agg = BarAggregator::new(store.clone(), &intervals(&["1m", "5m"])).unwrap();

        agg.process_bar(minute_bar(0, 1.0)).unwrap();
        let five = store.fetch_bars("BTCUSDT", "5m", 10).unwrap();
        assert_eq!(five.len(), 1);
        assert_eq!(five[0].close, 1.0);
        assert_eq!(five[0].volume, 1.0);

        agg.process_bar(minute_bar(60, 2.0)).unwrap();
        let five = store.fetch_bars("BTCUSDT", "5m", 10).unwrap();
        assert_eq!(five.len(), 1);
        assert_eq!(five[0].close, 2.0);
        assert_eq!(five[0].volume, 2.0);
        assert_eq!(five[0].open, 1.0);
    }

    #[test]
    fn bars_in_different_buckets_do_not_mix() {
        let store = temp_store();
        let mut agg = BarAggregator::new(store.clone(), &intervals(&["1m", "5m"])).unwrap();

        agg.process_bar(minute_bar(4 * 60, 1.0)).unwrap(); // bucket 0
        agg.process_bar(minute_bar(5 * 60, 2.0)).unwrap(); // bucket 300

        let five = store.fetch_bars("BTCUSDT", "5m", 10).unwrap();
        assert_eq!(five.len(), 2);
        assert_eq!(five[0].ts, 0);
        assert_eq!(five[0].close, 1.0);
        assert_eq!(five[1].ts, 300);
        assert_eq!(five[1].close, 2.0);
    }

    #[test]
    fn arrival_order_within_a_bucket_does_not_matter_once_complete() {
        let in_order = temp_store();
        let shuffled = temp_store();

        let mut agg_a = BarAggregator::new(in_order.clone(), &intervals(&["1m", "5m"])).unwrap();
        let mut agg_b = BarAggregator::new(shuffled.clone(), &intervals(&["1m", "5m"])).unwrap();

        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        for (i, c) in closes.iter().enumerate() {
            agg_a.process_bar(minute_bar(i as i64 * 60, *c)).unwrap();
        }
        // Same bars, scrambled arrival; the final fold still sorts by ts.
        for i in [2usize, 0, 3, 1, 4] {
            agg_b.process_bar(minute_bar(i as i64 * 60, closes[i])).unwrap();
        }

        let a = in_order.fetch_bars("BTCUSDT", "5m", 10).unwrap();
        let b = shuffled.fetch_bars("BTCUSDT", "5m", 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn multiple_target_intervals_are_all_materialised() {
        let store = temp_store();
        let mut agg =
            BarAggregator::new(store.clone(), &intervals(&["1m", "5m", "15m", "1h"])).unwrap();

        for i in 0..60 {
            agg.process_bar(minute_bar(i * 60, 100.0 + i as f64)).unwrap();
        }

        assert_eq!(store.bar_count("BTCUSDT", "1m").unwrap(), 60);
        assert_eq!(store.bar_count("BTCUSDT", "5m").unwrap(), 12);
        assert_eq!(store.bar_count("BTCUSDT", "15m").unwrap(), 4);
        assert_eq!(store.bar_count("BTCUSDT", "1h").unwrap(), 1);

        let hour = store.fetch_bars("BTCUSDT", "1h", 1).unwrap();
        assert_eq!(hour[0].open, 100.0);
        assert_eq!(hour[0].close, 159.0);
        assert_eq!(hour[0].volume, 60.0);
    }

    #[test]
    fn invalid_bars_are_dropped() {
        let store = temp_store();
        let mut agg = BarAggregator::new(store.clone(), &intervals(&["1m", "5m"])).unwrap();

        let mut bad = minute_bar(0, 100.0);
        bad.high = 10.0; // below the body
        assert_eq!(agg.process_bar(bad).unwrap(), 0);
        assert_eq!(store.bar_count("BTCUSDT", "1m").unwrap(), 0);
    }

    #[test]
    fn non_1m_bars_are_stored_verbatim() {
        let store = temp_store();
        let mut agg = BarAggregator::new(store.clone(), &intervals(&["1m", "5m"])).unwrap();

        let mut hourly = minute_bar(0, 50.0);
        hourly.interval = "1h".into();
        agg.process_bar(hourly).unwrap();

        assert_eq!(store.bar_count("BTCUSDT", "1h").unwrap(), 1);
        assert_eq!(store.bar_count("BTCUSDT", "5m").unwrap(), 0);
    }

    #[test]
    fn buffer_evicts_beyond_capacity() {
        let store = temp_store();
        let mut agg = BarAggregator::new(store.clone(), &intervals(&["1m"])).unwrap();

        for i in 0..(BUFFER_CAP as i64 + 10) {
            agg.process_bar(minute_bar(i * 60, 1.0)).unwrap();
        }

        let buffer = agg.buffers.get("BTCUSDT").unwrap();
        assert_eq!(buffer.len(), BUFFER_CAP);
        assert_eq!(buffer.front().unwrap().ts, 10 * 60);
    }
}
