// =============================================================================
// Binance REST Poller — kline polling fallback for WebSocket-hostile networks
// =============================================================================
//
// Every poll cycle fetches the latest two 1-minute klines per symbol and
// emits the second-to-last one — the most recent *closed* kline (the last
// entry is usually still open). A per-symbol high-water mark deduplicates so
// a bar is never emitted twice even though the poll cadence is much faster
// than the bar cadence.
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::providers::{parse_json_f64, ProviderError};
use crate::types::Bar;

const KLINES_URL: &str = "https://api.binance.com/api/v3/klines";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after an unexpected cycle-level error.
const ERROR_PAUSE: Duration = Duration::from_secs(5);

/// 1-minute kline poller for a set of symbols.
pub struct BinanceRestPoller {
    symbols: Vec<String>,
    poll_interval: Duration,
    client: reqwest::Client,
    /// Last emitted bar `ts` per symbol — the dedup high-water mark.
    last_emitted: HashMap<String, i64>,
}

impl BinanceRestPoller {
    pub fn new(symbols: &[String], poll_seconds: f64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");

        Self {
            symbols: symbols.iter().map(|s| s.to_uppercase()).collect(),
            poll_interval: Duration::from_secs_f64(poll_seconds.max(1.0)),
            client,
            last_emitted: HashMap::new(),
        }
    }

    /// Poll until shutdown. Transient errors are logged and retried on the
    /// next cycle; the poller itself never fails terminally.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<Bar>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ProviderError> {
        if self.symbols.is_empty() {
            warn!("no symbols configured — REST poller not started");
            return Ok(());
        }

        info!(
            symbols = self.symbols.len(),
            poll_s = self.poll_interval.as_secs_f64(),
            "Binance REST poller started"
        );

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let mut cycle_failed = false;
            let symbols = self.symbols.clone();
            for symbol in &symbols {
                match self.fetch_latest_closed(symbol).await {
                    Ok(Some(bar)) => {
                        if self.mark_emitted(&bar) {
                            debug!(bar = %bar, "closed kline polled");
                            if tx.send(bar).await.is_err() {
                                // Aggregator gone — only happens on shutdown.
                                return Ok(());
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "kline poll failed");
                        cycle_failed = true;
                    }
                }
            }

            let pause = if cycle_failed {
                self.poll_interval.max(ERROR_PAUSE)
            } else {
                self.poll_interval
            };

            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Record the bar's `ts` as emitted; `false` when it was already seen.
    fn mark_emitted(&mut self, bar: &Bar) -> bool {
        let last = self.last_emitted.entry(bar.symbol.clone()).or_insert(0);
        if bar.ts > *last {
            *last = bar.ts;
            true
        } else {
            false
        }
    }

    /// Fetch the most recent closed 1m kline for `symbol`, or `None` when
    /// the exchange has fewer than two klines.
    async fn fetch_latest_closed(&self, symbol: &str) -> Result<Option<Bar>> {
        let url = format!("{KLINES_URL}?symbol={symbol}&interval=1m&limit=2");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {status}: {body}");
        }

        let klines = body.as_array().context("klines response is not an array")?;
        if klines.len() < 2 {
            warn!(symbol, count = klines.len(), "not enough klines to pick a closed one");
            return Ok(None);
        }

        // Index -1 may still be open; -2 is the last closed kline.
        let kline = &klines[klines.len() - 2];
        let bar = parse_rest_kline(symbol, kline)?;
        Ok(Some(bar))
    }
}

/// Parse one entry of the klines array-of-arrays response.
///
/// Indices: [0] openTime(ms), [1] open, [2] high, [3] low, [4] close,
/// [5] volume, [6] closeTime, ...
fn parse_rest_kline(symbol: &str, entry: &serde_json::Value) -> Result<Bar> {
    let arr = entry.as_array().context("kline entry is not an array")?;
    if arr.len() < 6 {
        anyhow::bail!("malformed kline entry with {} elements", arr.len());
    }

    let open_time_ms = arr[0].as_i64().context("kline openTime is not an integer")?;

    let bar = Bar {
        symbol: symbol.to_uppercase(),
        interval: "1m".to_string(),
        ts: open_time_ms / 1000,
        open: parse_json_f64(&arr[1], "open")?,
        high: parse_json_f64(&arr[2], "high")?,
        low: parse_json_f64(&arr[3], "low")?,
        close: parse_json_f64(&arr[4], "close")?,
        volume: parse_json_f64(&arr[5], "volume")?,
    };

    if !bar.is_valid() {
        anyhow::bail!("kline violates OHLCV invariant: {bar}");
    }

    Ok(bar)
}
