// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read-only JSON surface over the bar store and the signal engine:
//
//   GET  /health                 liveness probe
//   GET  /v1/providers           transport policy and live ingestion status
//   GET  /v1/bars                recent bars, oldest first
//   GET  /v1/meta/instruments    symbols / intervals / bar counts
//   POST /v1/signal              multi-horizon signal with trade plan
//
// CORS is permissive: this is a local-first service fronted by local tools.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::signals::config::DEFAULT_HORIZONS;
use crate::signals::{generate_signal, SignalRequestOptions};
use crate::timeframes::{interval_sort_key, is_valid_interval, CANONICAL_INTERVALS};

/// Clamp bounds for `/v1/bars` limit.
const BARS_LIMIT_MIN: u32 = 1;
const BARS_LIMIT_MAX: u32 = 1000;

/// Accepted range for the number of bars the signal engine reads per horizon.
const SIGNAL_BAR_LIMIT_MIN: u32 = 20;
const SIGNAL_BAR_LIMIT_MAX: u32 = 500;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/providers", get(providers))
        .route("/v1/bars", get(get_bars))
        .route("/v1/meta/instruments", get(get_instruments))
        .route("/v1/signal", post(post_signal))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let provider = state
        .settings
        .providers
        .first()
        .cloned()
        .unwrap_or_else(|| "binance".to_string());

    Json(json!({
        "ok": true,
        "ts": chrono::Utc::now().timestamp(),
        "provider": provider,
    }))
}

// =============================================================================
// Providers
// =============================================================================

async fn providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "enabled": state.settings.providers,
        "binance": {
            "transport": state.settings.transport.to_string(),
            "active_transport": state.streaming.active_transport(),
            "rest_fallback_triggered": state.streaming.rest_fallback_triggered(),
            "symbols": state.settings.symbols,
            "rest_poll_seconds": state.settings.rest_poll_seconds,
        },
    }))
}

// =============================================================================
// Bars
// =============================================================================

#[derive(Debug, Deserialize)]
struct BarsQuery {
    symbol: String,
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default = "default_bars_limit")]
    limit: u32,
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_bars_limit() -> u32 {
    300
}

async fn get_bars(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BarsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = normalize_symbol(&q.symbol)?;
    let interval = q.interval.trim().to_lowercase();
    if !is_valid_interval(&interval) {
        return Err(ApiError::bad_request(format!(
            "unknown interval '{}' — use one of {}",
            q.interval,
            CANONICAL_INTERVALS.join(",")
        )));
    }

    let limit = q.limit.clamp(BARS_LIMIT_MIN, BARS_LIMIT_MAX);
    let bars = state.store.fetch_bars(&symbol, &interval, limit)?;

    Ok(Json(bars))
}

// =============================================================================
// Metadata
// =============================================================================

#[derive(Debug, Deserialize)]
struct InstrumentsQuery {
    #[serde(default = "default_min_bars_1m")]
    min_bars_1m: u64,
}

fn default_min_bars_1m() -> u64 {
    50
}

async fn get_instruments(
    State(state): State<Arc<AppState>>,
    Query(q): Query<InstrumentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let store = &state.store;

    // Symbols meeting the minimum 1-minute coverage.
    let mut symbols = Vec::new();
    for symbol in store.distinct_symbols("1m")? {
        if store.bar_count(&symbol, "1m")? >= q.min_bars_1m {
            symbols.push(symbol);
        }
    }

    if symbols.is_empty() {
        return Ok(Json(json!({
            "symbols": [],
            "intervals": [],
            "counts": {},
        })));
    }

    // Intervals actually present, canonical ascending order.
    let mut intervals: Vec<String> = store
        .distinct_intervals()?
        .into_iter()
        .filter(|iv| CANONICAL_INTERVALS.contains(&iv.as_str()))
        .collect();
    intervals.sort_by_key(|iv| interval_sort_key(iv));

    // serde_json's map keeps keys sorted, so the payload is deterministic.
    let mut counts = serde_json::Map::new();
    for symbol in &symbols {
        let mut per_interval = serde_json::Map::new();
        for interval in &intervals {
            per_interval.insert(interval.clone(), json!(store.bar_count(symbol, interval)?));
        }
        counts.insert(symbol.clone(), serde_json::Value::Object(per_interval));
    }

    Ok(Json(json!({
        "symbols": symbols,
        "intervals": intervals,
        "counts": counts,
    })))
}

// =============================================================================
// Signal
// =============================================================================

#[derive(Debug, Deserialize)]
struct SignalRequest {
    symbol: String,
    #[serde(default)]
    horizons: Option<Vec<String>>,
    #[serde(default = "default_signal_bar_limit")]
    bar_limit: u32,
    #[serde(default)]
    explain: bool,
    #[serde(default)]
    debug: bool,
}

fn default_signal_bar_limit() -> u32 {
    100
}

async fn post_signal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = normalize_symbol(&req.symbol)?;

    if !(SIGNAL_BAR_LIMIT_MIN..=SIGNAL_BAR_LIMIT_MAX).contains(&req.bar_limit) {
        return Err(ApiError::bad_request(format!(
            "bar_limit {} out of range [{SIGNAL_BAR_LIMIT_MIN}, {SIGNAL_BAR_LIMIT_MAX}]",
            req.bar_limit
        )));
    }

    let horizons: Vec<String> = match &req.horizons {
        Some(list) if !list.is_empty() => {
            let mut horizons = Vec::with_capacity(list.len());
            for horizon in list {
                let h = horizon.trim().to_lowercase();
                if !is_valid_interval(&h) {
                    return Err(ApiError::bad_request(format!(
                        "unknown horizon '{horizon}' — use one of {}",
                        CANONICAL_INTERVALS.join(",")
                    )));
                }
                horizons.push(h);
            }
            horizons
        }
        _ => DEFAULT_HORIZONS.iter().map(|h| h.to_string()).collect(),
    };

    let options = SignalRequestOptions {
        bar_limit: req.bar_limit,
        explain: req.explain,
        debug: req.debug,
    };

    let now = chrono::Utc::now().timestamp();
    let response = generate_signal(&state.store, &symbol, &horizons, &options, now);

    info!(
        symbol = %symbol,
        state = %response.state,
        confidence = response.confidence,
        "signal generated"
    );

    Ok(Json(response))
}

// =============================================================================
// Helpers
// =============================================================================

fn normalize_symbol(symbol: &str) -> Result<String, ApiError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("symbol must not be empty"));
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::bad_request(format!(
            "symbol '{trimmed}' contains invalid characters"
        )));
    }
    Ok(trimmed.to_uppercase())
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_normalise_to_uppercase() {
        assert_eq!(normalize_symbol(" btcusdt ").unwrap(), "BTCUSDT");
        assert_eq!(normalize_symbol("ETHUSDT").unwrap(), "ETHUSDT");
    }

    #[test]
    fn empty_or_odd_symbols_are_rejected() {
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("   ").is_err());
        assert!(normalize_symbol("BTC/USDT").is_err());
        assert!(normalize_symbol("btc usdt").is_err());
    }

    #[test]
    fn bars_limit_clamps_into_range() {
        assert_eq!(0u32.clamp(BARS_LIMIT_MIN, BARS_LIMIT_MAX), 1);
        assert_eq!(5_000u32.clamp(BARS_LIMIT_MIN, BARS_LIMIT_MAX), 1000);
        assert_eq!(300u32.clamp(BARS_LIMIT_MIN, BARS_LIMIT_MAX), 300);
    }

    #[test]
    fn signal_request_defaults() {
        let req: SignalRequest = serde_json::from_str(r#"{ "symbol": "btcusdt" }"#).unwrap();
        assert_eq!(req.bar_limit, 100);
        assert!(req.horizons.is_none());
        assert!(!req.explain);
        assert!(!req.debug);
    }

    #[test]
    fn signal_request_parses_full_body() {
        let req: SignalRequest = serde_json::from_str(
            r#"{ "symbol": "BTCUSDT", "horizons": ["5m", "1h"], "bar_limit": 50,
                 "explain": true, "debug": true }"#,
        )
        .unwrap();
        assert_eq!(req.horizons.as_deref(), Some(&["5m".to_string(), "1h".to_string()][..]));
        assert_eq!(req.bar_limit, 50);
        assert!(req.explain && req.debug);
    }
}
