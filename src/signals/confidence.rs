// =============================================================================
// Confidence Scoring — data sufficiency × continuity × volatility penalty
// =============================================================================
//
// Confidence is a pure function of the bar slice shape, never of price
// direction. Each component lives in [0, 1] and the composite is their
// product, so any single weak component drags the whole score down.
// =============================================================================

use crate::signals::config::{
    expected_bars, LOW_DATA_SUFFICIENCY_CAP, MAX_VOLATILITY_PENALTY, MIN_BARS_FOR_CONFIDENCE,
    NON_MONOTONIC_CONTINUITY_CAP, VOLATILITY_PENALTY_SCALE,
};
use crate::timeframes::interval_to_seconds;
use crate::types::Bar;

/// Composite confidence [0, 1] for a horizon.
pub fn compute_confidence(
    horizon: &str,
    n_bars: usize,
    continuity_score: f64,
    volatility: f64,
) -> f64 {
    let sufficiency = compute_sufficiency(horizon, n_bars);
    let continuity = continuity_score.clamp(0.0, 1.0);
    let volatility_penalty =
        1.0 - (volatility * VOLATILITY_PENALTY_SCALE).min(MAX_VOLATILITY_PENALTY);

    (sufficiency * continuity * volatility_penalty).clamp(0.0, 1.0)
}

/// Data sufficiency [0, 1]: linear in coverage of the expected bar count,
/// capped under 0.5 while the slice is below the minimum bar count.
fn compute_sufficiency(horizon: &str, n_bars: usize) -> f64 {
    let expected = expected_bars(horizon).max(1);
    let coverage = (n_bars as f64 / expected as f64).min(1.0);

    if n_bars < MIN_BARS_FOR_CONFIDENCE {
        coverage.min(LOW_DATA_SUFFICIENCY_CAP)
    } else {
        coverage
    }
}

/// Continuity score [0, 1] for a bar slice against its nominal interval.
///
/// 1.0 when timestamps step by exactly the interval; otherwise it falls
/// linearly with the fraction of missing or misaligned steps. Non-monotonic
/// timestamps cap the score under 0.5 regardless of step quality.
pub fn compute_continuity(bars: &[Bar], interval: &str) -> f64 {
    if bars.len() < 2 {
        return 1.0;
    }

    let step = match interval_to_seconds(interval) {
        Ok(secs) => secs,
        Err(_) => return NON_MONOTONIC_CONTINUITY_CAP,
    };

    let mut monotonic = true;
    let mut bad_steps = 0usize;
    let total_steps = bars.len() - 1;

    for pair in bars.windows(2) {
        let delta = pair[1].ts - pair[0].ts;
        if delta <= 0 {
            monotonic = false;
        }
        if delta != step {
            bad_steps += 1;
        }
    }

    let score = 1.0 - bad_steps as f64 / total_steps as f64;

    if monotonic {
        score.clamp(0.0, 1.0)
    } else {
        score.clamp(0.0, NON_MONOTONIC_CONTINUITY_CAP)
    }
}
