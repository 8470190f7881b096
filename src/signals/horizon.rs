// =============================================================================
// Per-Horizon Signal — direction, strength, confidence, and rationale tags
// =============================================================================

use crate::signals::config::{
    HIGH_HORIZON_CONFIDENCE, HIGH_VOLATILITY_THRESHOLD, LOW_HORIZON_CONFIDENCE,
    LOW_VOLATILITY_THRESHOLD, STRONG_DIRECTION_THRESHOLD, WEAK_DIRECTION_THRESHOLD,
};
use crate::signals::confidence::{compute_confidence, compute_continuity};
use crate::signals::features::{compute_direction_score, compute_strength, extract_features};
use crate::signals::types::HorizonSignal;
use crate::types::Bar;

/// Compute the full signal for one horizon from its bar slice (oldest first).
pub fn compute_horizon_signal(horizon: &str, bars: &[Bar]) -> HorizonSignal {
    let features = extract_features(horizon, bars);

    let direction_score = compute_direction_score(&features);
    let strength = compute_strength(&features);

    let continuity = compute_continuity(bars, horizon);
    let confidence = compute_confidence(horizon, features.n_bars, continuity, features.volatility);

    let mut rationale = Vec::new();

    // Direction band tag — exactly one per horizon.
    if direction_score >= STRONG_DIRECTION_THRESHOLD {
        rationale.push(format!("{horizon}_strong_bullish"));
    } else if direction_score >= WEAK_DIRECTION_THRESHOLD {
        rationale.push(format!("{horizon}_weak_bullish"));
    } else if direction_score <= -STRONG_DIRECTION_THRESHOLD {
        rationale.push(format!("{horizon}_strong_bearish"));
    } else if direction_score <= -WEAK_DIRECTION_THRESHOLD {
        rationale.push(format!("{horizon}_weak_bearish"));
    } else {
        rationale.push(format!("{horizon}_neutral"));
    }

    if features.volatility > HIGH_VOLATILITY_THRESHOLD {
        rationale.push(format!("{horizon}_high_volatility"));
    } else if features.volatility < LOW_VOLATILITY_THRESHOLD {
        rationale.push(format!("{horizon}_low_volatility"));
    }

    if confidence > HIGH_HORIZON_CONFIDENCE {
        rationale.push(format!("{horizon}_high_confidence"));
    } else if confidence < LOW_HORIZON_CONFIDENCE {
        rationale.push(format!("{horizon}_low_confidence"));
    }

    HorizonSignal {
        horizon: horizon.to_string(),
        direction_score,
        strength,
        confidence,
        features,
        rationale,
    }
}
