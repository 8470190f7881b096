// =============================================================================
// Binance WebSocket Client — multiplexed 1-minute kline stream
// =============================================================================
//
// One connection subscribed to every configured symbol's 1m kline stream.
// Only finalised klines (`k.x == true`) become bars. Reconnects use
// exponential backoff with jitter, capped at 60 s. In fail-fast mode, three
// consecutive failed handshakes surface `ProviderError::Unavailable` so the
// supervisor can fall back to REST polling.
//
// tungstenite answers server pings automatically, so the read loop only has
// to care about text frames.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

use crate::providers::{parse_json_f64, ProviderError};
use crate::types::Bar;

/// Connection handshake timeout.
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Reconnect backoff ceiling, seconds.
const MAX_BACKOFF_SECS: f64 = 60.0;

/// Consecutive handshake failures tolerated in fail-fast mode.
const MAX_HANDSHAKE_FAILURES: u32 = 3;

/// Multiplexed 1-minute kline stream over a single connection.
pub struct BinanceWsClient {
    /// Stream path wants lowercase symbols.
    symbols: Vec<String>,
    fail_fast: bool,
}

impl BinanceWsClient {
    pub fn new(symbols: &[String], fail_fast: bool) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_lowercase()).collect(),
            fail_fast,
        }
    }

    fn stream_url(&self) -> String {
        let streams: Vec<String> = self
            .symbols
            .iter()
            .map(|s| format!("{s}@kline_1m"))
            .collect();
        format!("wss://stream.binance.com:9443/ws/{}", streams.join("/"))
    }

    /// Run until shutdown, the bar channel closes, or (in fail-fast mode)
    /// the transport proves unavailable. Transient errors reconnect
    /// internally and are never surfaced.
    pub async fn run(
        &self,
        tx: mpsc::Sender<Bar>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ProviderError> {
        if self.symbols.is_empty() {
            warn!("no symbols configured — WebSocket client not started");
            return Ok(());
        }

        let url = self.stream_url();
        let mut attempt: u32 = 0;
        let mut handshake_failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            info!(url = %url, symbols = self.symbols.len(), "connecting to kline WebSocket");

            let connected = tokio::time::timeout(OPEN_TIMEOUT, connect_async(&url)).await;
            match connected {
                Ok(Ok((ws_stream, _response))) => {
                    attempt = 0;
                    handshake_failures = 0;
                    info!(symbols = self.symbols.len(), "kline WebSocket connected");

                    let (_write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            _ = shutdown.changed() => {
                                info!("kline WebSocket shutting down");
                                return Ok(());
                            }
                            msg = read.next() => match msg {
                                Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                                    match parse_kline_message(&text) {
                                        Ok(Some(bar)) => {
                                            debug!(bar = %bar, "closed kline received");
                                            if tx.send(bar).await.is_err() {
                                                // Aggregator gone — only happens on shutdown.
                                                return Ok(());
                                            }
                                        }
                                        Ok(None) => {} // open kline or non-kline event
                                        Err(e) => {
                                            warn!(error = %e, "failed to parse kline message — dropped");
                                        }
                                    }
                                }
                                Some(Ok(_)) => {} // ping/pong/binary handled upstream
                                Some(Err(e)) => {
                                    error!(error = %e, "kline WebSocket read error — reconnecting");
                                    break;
                                }
                                None => {
                                    warn!("kline WebSocket stream ended — reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    handshake_failures += 1;
                    error!(
                        error = %e,
                        failures = handshake_failures,
                        "kline WebSocket handshake failed"
                    );
                    if self.fail_fast && handshake_failures >= MAX_HANDSHAKE_FAILURES {
                        return Err(ProviderError::Unavailable(format!(
                            "handshake failed {MAX_HANDSHAKE_FAILURES} times — network may block WebSockets"
                        )));
                    }
                }
                Err(_) => {
                    handshake_failures += 1;
                    error!(
                        failures = handshake_failures,
                        timeout_s = OPEN_TIMEOUT.as_secs(),
                        "kline WebSocket handshake timed out"
                    );
                    if self.fail_fast && handshake_failures >= MAX_HANDSHAKE_FAILURES {
                        return Err(ProviderError::Unavailable(format!(
                            "handshake timed out {MAX_HANDSHAKE_FAILURES} times"
                        )));
                    }
                }
            }

            attempt += 1;
            let delay = reconnect_delay(attempt);
            info!(attempt, delay_s = format!("{delay:.1}"), "reconnecting to kline WebSocket");

            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_secs_f64(delay)) => {}
            }
        }
    }
}

/// `min(2^attempt + U(0,1), 60)` seconds.
fn reconnect_delay(attempt: u32) -> f64 {
    let base = 2f64.powi(attempt.min(16) as i32);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    (base + jitter).min(MAX_BACKOFF_SECS)
}

/// Parse one stream message. Returns `Ok(Some(bar))` only for a finalised
/// 1-minute kline; open klines and non-kline events are `Ok(None)`.
///
/// Accepts both the combined-stream envelope
/// `{ "stream": ..., "data": { "e": "kline", ... } }` and the direct
/// single-stream payload `{ "e": "kline", "s": ..., "k": { ... } }`.
fn parse_kline_message(text: &str) -> Result<Option<Bar>> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    let payload = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    if payload["e"].as_str() != Some("kline") {
        return Ok(None);
    }

    let k = &payload["k"];
    let is_closed = k["x"].as_bool().context("missing field k.x")?;
    if !is_closed {
        return Ok(None);
    }

    let symbol = payload["s"]
        .as_str()
        .context("missing field s")?
        .to_uppercase();
    let open_time_ms = k["t"].as_i64().context("missing field k.t")?;

    let bar = Bar {
        symbol,
        interval: "1m".to_string(),
        ts: open_time_ms / 1000,
        open: parse_json_f64(&k["o"], "k.o")?,
        high: parse_json_f64(&k["h"], "k.h")?,
        low: parse_json_f64(&k["l"], "k.l")?,
        close: parse_json_f64(&k["c"], "k.c")?,
        volume: parse_json_f64(&k["v"], "k.v")?,
    };

    if !bar.is_valid() {
        anyhow::bail!("kline violates OHLCV invariant: {bar}");
    }

    Ok(Some(bar))
}
