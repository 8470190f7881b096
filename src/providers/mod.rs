// =============================================================================
// Providers Module
// =============================================================================
//
// Market-data producers. Each provider pushes finalised 1-minute bars into
// the supervisor's channel and reports how it ended through
// `ProviderError` — the supervisor pattern-matches on the variant instead of
// catching exceptions.

pub mod binance_rest;
pub mod binance_ws;

pub use binance_rest::BinanceRestPoller;
pub use binance_ws::BinanceWsClient;

use anyhow::{Context, Result};

/// Terminal condition of a producer run.
#[derive(Debug)]
pub enum ProviderError {
    /// The WebSocket handshake failed repeatedly in fail-fast mode; the
    /// transport is considered unavailable on this network.
    Unavailable(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "provider unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Binance sends numeric kline fields as JSON strings; accept either form.
pub(crate) fn parse_json_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_and_number_forms() {
        assert_eq!(parse_json_f64(&json!("37020.5"), "c").unwrap(), 37020.5);
        assert_eq!(parse_json_f64(&json!(12.25), "v").unwrap(), 12.25);
    }

    #[test]
    fn rejects_other_json_types() {
        assert!(parse_json_f64(&json!(null), "c").is_err());
        assert!(parse_json_f64(&json!([1, 2]), "c").is_err());
        assert!(parse_json_f64(&json!("not-a-number"), "c").is_err());
    }
}
