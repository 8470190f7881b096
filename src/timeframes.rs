// =============================================================================
// Timeframe helpers — interval parsing and bucket alignment
// =============================================================================
//
// Every bar series is identified by an interval label (`1m`, `5m`, `15m`,
// `1h`, `4h`, `1d`, `1w`). Bucket starts are anchored to the Unix epoch in
// UTC: minutes, hours, and days therefore land on their natural UTC
// boundaries. The weekly bucket uses the same rule with 604 800 s, which
// anchors weeks to the epoch Thursday; this is the canonical alignment.
// =============================================================================

use anyhow::{bail, Result};

/// Canonical interval set, ascending. Used for validation and for ordering
/// interval lists in API responses.
pub const CANONICAL_INTERVALS: &[&str] = &["1m", "5m", "15m", "1h", "4h", "1d", "1w"];

/// Parse an interval label like `5m` / `4h` / `1d` / `1w` into seconds.
pub fn interval_to_seconds(interval: &str) -> Result<i64> {
    let s = interval.trim();
    if s.len() < 2 {
        bail!("unsupported interval '{interval}' — use forms like 1m, 5m, 1h, 1d, 1w");
    }

    let (num, unit) = s.split_at(s.len() - 1);
    let n: i64 = match num.parse() {
        Ok(n) if n > 0 => n,
        _ => bail!("unsupported interval '{interval}' — use forms like 1m, 5m, 1h, 1d, 1w"),
    };

    let secs = match unit {
        "m" => n * 60,
        "h" => n * 3_600,
        "d" => n * 86_400,
        "w" => n * 604_800,
        _ => bail!("unsupported interval unit '{unit}' in '{interval}'"),
    };

    Ok(secs)
}

/// `true` when `interval` parses as a supported label.
pub fn is_valid_interval(interval: &str) -> bool {
    interval_to_seconds(interval).is_ok()
}

/// Start of the bucket containing `ts` for a bucket width of
/// `interval_secs` seconds, anchored to the Unix epoch.
pub fn bucket_start(ts: i64, interval_secs: i64) -> i64 {
    (ts / interval_secs) * interval_secs
}

/// Sort key placing interval labels in ascending duration order. Unknown
/// labels sort last.
pub fn interval_sort_key(interval: &str) -> i64 {
    interval_to_seconds(interval).unwrap_or(i64::MAX)
}
