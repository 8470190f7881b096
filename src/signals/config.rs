// =============================================================================
// Signal Engine Constants
// =============================================================================
//
// Every knob of the analytical pipeline lives here. All of these are plain
// constants: the engine has no tunable runtime state and identical inputs
// always produce identical outputs.
// =============================================================================

/// Horizons analysed when a request does not name its own set.
pub const DEFAULT_HORIZONS: &[&str] = &["1m", "5m", "15m", "1h", "4h", "1d"];

/// Horizons counted as "short term" for conflict detection.
pub const SHORT_TERM_HORIZONS: &[&str] = &["1m", "5m", "15m"];

/// Horizons counted as "long term" for conflict detection.
pub const LONG_TERM_HORIZONS: &[&str] = &["1h", "4h", "1d", "1w"];

/// Consensus weight per horizon — longer horizons carry more weight.
pub fn horizon_weight(horizon: &str) -> f64 {
    match horizon {
        "1m" => 0.5,
        "5m" => 0.8,
        "15m" => 1.0,
        "1h" => 1.5,
        "4h" => 2.0,
        "1d" => 2.5,
        "1w" => 3.0,
        _ => 1.0,
    }
}

/// Bars considered full coverage per horizon for the sufficiency component
/// of confidence. Calibrated so one clean momentum window (20 bars) already
/// earns solid-but-not-full sufficiency on every horizon.
pub fn expected_bars(horizon: &str) -> usize {
    match horizon {
        "1m" => 30,
        "5m" => 30,
        "15m" => 30,
        "1h" => 24,
        "4h" => 21,
        "1d" => 15,
        "1w" => 13,
        _ => 30,
    }
}

/// How long a trade plan stays valid, in seconds, indexed by the primary
/// horizon that produced it.
pub fn validity_window_secs(horizon: &str) -> i64 {
    match horizon {
        "1m" => 300,
        "5m" => 3_600,
        "15m" => 14_400,
        "1h" => 21_600,
        "4h" => 86_400,
        "1d" => 432_000,
        "1w" => 1_209_600,
        _ => 3_600,
    }
}

// --- Feature extraction --------------------------------------------------

/// Look-back window for the momentum return.
pub const MOMENTUM_LOOKBACK: usize = 20;

/// Look-back window for the volatility estimate.
pub const VOLATILITY_LOOKBACK: usize = 20;

/// Scale inside `tanh(scale * r)`. With 10.0 a 2% lookback move lands at
/// momentum ~0.20 and ~11% at ~0.80, matching the weak/strong tag edges.
pub const MOMENTUM_TANH_SCALE: f64 = 10.0;

/// |momentum| below this reads as "no trend".
pub const TREND_EPSILON: f64 = 0.1;

/// Scale inside `stability = 1 / (1 + scale * volatility)`.
pub const STABILITY_SCALE: f64 = 20.0;

// --- Confidence ----------------------------------------------------------

/// Below this many bars, sufficiency is capped under 0.5.
pub const MIN_BARS_FOR_CONFIDENCE: usize = 10;

/// Sufficiency cap applied when `n_bars < MIN_BARS_FOR_CONFIDENCE`.
pub const LOW_DATA_SUFFICIENCY_CAP: f64 = 0.4;

/// Continuity cap applied when timestamps are non-monotonic.
pub const NON_MONOTONIC_CONTINUITY_CAP: f64 = 0.4;

/// Scale applied to volatility before the penalty cap.
pub const VOLATILITY_PENALTY_SCALE: f64 = 10.0;

/// Ceiling on the volatility penalty (a 50% haircut at most).
pub const MAX_VOLATILITY_PENALTY: f64 = 0.5;

// --- Per-horizon tag thresholds ------------------------------------------

/// Direction score at or above which a horizon reads "strong".
pub const STRONG_DIRECTION_THRESHOLD: f64 = 0.5;

/// Direction score at or above which a horizon reads "weak" (below is neutral).
pub const WEAK_DIRECTION_THRESHOLD: f64 = 0.2;

/// Volatility above this tags `{h}_high_volatility`.
pub const HIGH_VOLATILITY_THRESHOLD: f64 = 0.05;

/// Volatility below this tags `{h}_low_volatility`.
pub const LOW_VOLATILITY_THRESHOLD: f64 = 0.01;

/// Horizon confidence above this tags `{h}_high_confidence`.
pub const HIGH_HORIZON_CONFIDENCE: f64 = 0.7;

/// Horizon confidence below this tags `{h}_low_confidence`.
pub const LOW_HORIZON_CONFIDENCE: f64 = 0.3;

// --- Consensus tags -------------------------------------------------------

pub const STRONG_AGREEMENT_THRESHOLD: f64 = 0.8;
pub const MODERATE_AGREEMENT_THRESHOLD: f64 = 0.5;

/// Mean horizon confidence above this tags `high_data_quality`, below the
/// low bound tags `low_data_quality`.
pub const HIGH_DATA_QUALITY_THRESHOLD: f64 = 0.7;
pub const LOW_DATA_QUALITY_THRESHOLD: f64 = 0.3;

// --- State mapping --------------------------------------------------------

pub const STRONG_BUY_THRESHOLD: f64 = 0.65;
pub const BUY_THRESHOLD: f64 = 0.20;
pub const SELL_THRESHOLD: f64 = -0.20;
pub const STRONG_SELL_THRESHOLD: f64 = -0.65;

/// Consensus confidence at or above which `high_confidence_signal` is tagged.
pub const HIGH_CONFIDENCE_SIGNAL: f64 = 0.75;

/// Consensus confidence at or below which `low_confidence_signal` is tagged.
pub const LOW_CONFIDENCE_SIGNAL: f64 = 0.4;

// --- Trade plan ------------------------------------------------------------

/// Fractional buffer beyond the swing for the invalidation price.
pub const INVALIDATION_BUFFER_PCT: f64 = 0.02;

/// Bars of the primary horizon scanned for the invalidation swing.
pub const INVALIDATION_LOOKBACK: usize = 20;

/// Position size (% of capital) by consensus-confidence band. Bands are
/// half-open `[low, high)` except the last, which includes 1.0.
pub const SIZE_BY_CONFIDENCE: &[(f64, f64, f64)] = &[
    (0.0, 0.4, 0.25),
    (0.4, 0.6, 0.5),
    (0.6, 0.75, 1.0),
    (0.75, 0.9, 1.5),
    (0.9, 1.0, 2.0),
];
