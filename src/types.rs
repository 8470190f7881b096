// =============================================================================
// Shared types used across the Borealis signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::timeframes::interval_to_seconds;

/// A single finalised OHLCV bar.
///
/// Identity is `(symbol, interval, ts)` where `ts` is the Unix-second start
/// of the bucket, UTC. Symbols are always uppercase by the time a bar exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub interval: String,
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Check the OHLCV invariant: `low <= min(open, close)`,
    /// `max(open, close) <= high`, `volume >= 0`, and `ts` aligned to the
    /// bar's own interval. Ingestion drops bars that fail this.
    pub fn is_valid(&self) -> bool {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);

        if !(self.low <= body_low && body_high <= self.high) {
            return false;
        }
        if !(self.volume >= 0.0) {
            return false;
        }

        match interval_to_seconds(&self.interval) {
            Ok(secs) => self.ts % secs == 0,
            Err(_) => false,
        }
    }
}

impl std::fmt::Display for Bar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{} ts={} c={}",
            self.symbol, self.interval, self.ts, self.close
        )
    }
}
