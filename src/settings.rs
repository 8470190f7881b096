// =============================================================================
// Settings — immutable process configuration read from the environment
// =============================================================================
//
// Every tunable is read exactly once at startup (after `.env` loading) and
// the resulting value is passed to components at construction. Nothing here
// is mutated after startup; runtime state such as the active transport lives
// in `AppState` instead.
// =============================================================================

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{error, info};

use crate::timeframes::{interval_sort_key, is_valid_interval};

/// Transport policy for the Binance producer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Ws,
    Rest,
    Auto,
}

impl Transport {
    /// Parse a transport string. Unknown values fall back to `Auto` with a
    /// logged error, mirroring the forgiving startup behaviour of the rest
    /// of the config surface.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "ws" => Self::Ws,
            "rest" => Self::Rest,
            "auto" => Self::Auto,
            other => {
                error!(
                    transport = %other,
                    "invalid transport — must be 'ws', 'rest', or 'auto'; defaulting to 'auto'"
                );
                Self::Auto
            }
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ws => write!(f, "ws"),
            Self::Rest => write!(f, "rest"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_intervals() -> Vec<String> {
    ["1m", "5m", "15m", "1h", "4h", "1d", "1w"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Immutable configuration for the whole process.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// HTTP listen address, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,

    /// Enabled upstream providers. Only `binance` is supported.
    pub providers: Vec<String>,

    /// Subscription set, uppercase.
    pub symbols: Vec<String>,

    /// Transport policy for ingestion.
    pub transport: Transport,

    /// REST polling cadence in seconds (floored at 1.0).
    pub rest_poll_seconds: f64,

    /// Target bar intervals. Always contains `1m`.
    pub bar_intervals: Vec<String>,

    /// Path of the embedded SQLite database.
    pub store_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            providers: vec!["binance".to_string()],
            symbols: default_symbols(),
            transport: Transport::Auto,
            rest_poll_seconds: 2.0,
            bar_intervals: default_intervals(),
            store_path: "data/market.db".to_string(),
        }
    }
}

impl Settings {
    /// Build settings from `BOREALIS_*` environment variables, falling back
    /// to defaults for anything unset. Interval and symbol lists are
    /// validated here so the rest of the process never sees a bad label.
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();

        let bind_addr = env_or("BOREALIS_BIND_ADDR", &defaults.bind_addr);
        let store_path = env_or("BOREALIS_STORE_PATH", &defaults.store_path);

        let providers = match std::env::var("BOREALIS_PROVIDERS") {
            Ok(raw) => split_list(&raw).iter().map(|s| s.to_lowercase()).collect(),
            Err(_) => defaults.providers.clone(),
        };

        // Symbols are accepted lowercase and normalised to uppercase, the
        // form they are stored and served in.
        let symbols = match std::env::var("BOREALIS_SYMBOLS") {
            Ok(raw) => split_list(&raw).iter().map(|s| s.to_uppercase()).collect(),
            Err(_) => defaults.symbols.clone(),
        };
        if symbols.is_empty() {
            bail!("BOREALIS_SYMBOLS resolved to an empty symbol list");
        }

        let transport = Transport::parse_or_default(&env_or("BOREALIS_TRANSPORT", "auto"));

        let rest_poll_seconds = match std::env::var("BOREALIS_REST_POLL_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .context("BOREALIS_REST_POLL_SECONDS is not a number")?
                .max(1.0),
            Err(_) => defaults.rest_poll_seconds,
        };

        let mut bar_intervals: Vec<String> = match std::env::var("BOREALIS_BAR_INTERVALS") {
            Ok(raw) => split_list(&raw).iter().map(|s| s.to_lowercase()).collect(),
            Err(_) => defaults.bar_intervals.clone(),
        };
        for interval in &bar_intervals {
            if !is_valid_interval(interval) {
                bail!("BOREALIS_BAR_INTERVALS contains unsupported interval '{interval}'");
            }
        }
        if !bar_intervals.iter().any(|i| i == "1m") {
            bail!("BOREALIS_BAR_INTERVALS must include '1m' (it is the ingestion base)");
        }
        bar_intervals.sort_by_key(|iv| interval_sort_key(iv));
        bar_intervals.dedup();

        let settings = Self {
            bind_addr,
            providers,
            symbols,
            transport,
            rest_poll_seconds,
            bar_intervals,
            store_path,
        };

        info!(
            symbols = ?settings.symbols,
            transport = %settings.transport,
            intervals = ?settings.bar_intervals,
            store = %settings.store_path,
            "settings loaded"
        );

        Ok(settings)
    }

    /// `true` when the Binance provider is enabled.
    pub fn binance_enabled(&self) -> bool {
        self.providers.iter().any(|p| p == "binance")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
