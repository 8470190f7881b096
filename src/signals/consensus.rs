// =============================================================================
// Consensus — weighted multi-horizon combination with agreement detection
// =============================================================================
//
// Direction is a weighted average where each horizon contributes its
// direction score scaled by `horizon_weight * confidence`: long horizons and
// trustworthy data dominate. Agreement measures raw sign alignment and
// discounts the combined confidence.
// =============================================================================

use crate::signals::config::{
    horizon_weight, HIGH_DATA_QUALITY_THRESHOLD, LONG_TERM_HORIZONS, LOW_DATA_QUALITY_THRESHOLD,
    MODERATE_AGREEMENT_THRESHOLD, SHORT_TERM_HORIZONS, STRONG_AGREEMENT_THRESHOLD, TREND_EPSILON,
    WEAK_DIRECTION_THRESHOLD,
};
use crate::signals::types::{ConsensusSignal, HorizonSignal};

/// Combine per-horizon signals into a consensus.
pub fn compute_consensus(horizon_signals: Vec<HorizonSignal>) -> ConsensusSignal {
    if horizon_signals.is_empty() {
        return ConsensusSignal::no_data();
    }

    let mut weighted_direction = 0.0;
    let mut total_weight = 0.0;
    for signal in &horizon_signals {
        let effective_weight = horizon_weight(&signal.horizon) * signal.confidence;
        weighted_direction += signal.direction_score * effective_weight;
        total_weight += effective_weight;
    }

    let direction = if total_weight > 0.0 {
        weighted_direction / total_weight
    } else {
        0.0
    };

    let agreement_score = compute_agreement_score(&horizon_signals);

    let avg_confidence =
        horizon_signals.iter().map(|s| s.confidence).sum::<f64>() / horizon_signals.len() as f64;
    let confidence = (avg_confidence * agreement_score).clamp(0.0, 1.0);

    let rationale = build_consensus_rationale(&horizon_signals, agreement_score, avg_confidence);

    ConsensusSignal {
        direction,
        confidence,
        agreement_score,
        horizon_signals,
        rationale,
    }
}

/// Sign-balance agreement [0, 1].
///
/// Each horizon contributes the sign of its direction score; exact zeros
/// (the no-momentum degenerate case) are dropped. A perfectly split field
/// scores 0, unanimity scores 1, and an empty field is vacuously 1.
pub fn compute_agreement_score(horizon_signals: &[HorizonSignal]) -> f64 {
    let mut pos = 0usize;
    let mut neg = 0usize;
    for signal in horizon_signals {
        if signal.direction_score > 0.0 {
            pos += 1;
        } else if signal.direction_score < 0.0 {
            neg += 1;
        }
    }

    let total = pos + neg;
    if total == 0 {
        return 1.0;
    }

    let agreement = 1.0 - 2.0 * pos.min(neg) as f64 / total as f64;
    agreement.clamp(0.0, 1.0)
}

fn build_consensus_rationale(
    horizon_signals: &[HorizonSignal],
    agreement_score: f64,
    avg_confidence: f64,
) -> Vec<String> {
    let mut rationale = Vec::new();

    let bullish = horizon_signals
        .iter()
        .filter(|s| s.direction_score > TREND_EPSILON)
        .count();
    let bearish = horizon_signals
        .iter()
        .filter(|s| s.direction_score < -TREND_EPSILON)
        .count();
    let both_signs_present = horizon_signals.iter().any(|s| s.direction_score > 0.0)
        && horizon_signals.iter().any(|s| s.direction_score < 0.0);

    // Agreement band.
    if agreement_score >= STRONG_AGREEMENT_THRESHOLD {
        rationale.push("strong_agreement".to_string());
    } else if agreement_score >= MODERATE_AGREEMENT_THRESHOLD {
        rationale.push("moderate_agreement".to_string());
    } else {
        rationale.push("weak_agreement".to_string());
        if both_signs_present {
            rationale.push("conflicting_signals".to_string());
        }
    }

    // Directional majority.
    if bullish > bearish * 2 && bullish > 0 {
        rationale.push("majority_bullish".to_string());
    } else if bearish > bullish * 2 && bearish > 0 {
        rationale.push("majority_bearish".to_string());
    } else if bullish > 0 && bearish > 0 {
        rationale.push("mixed_directions".to_string());
    }

    // Short-vs-long conflict.
    let short_avg = subset_average(horizon_signals, SHORT_TERM_HORIZONS);
    let long_avg = subset_average(horizon_signals, LONG_TERM_HORIZONS);
    if let (Some(short), Some(long)) = (short_avg, long_avg) {
        if short > WEAK_DIRECTION_THRESHOLD && long < -WEAK_DIRECTION_THRESHOLD {
            rationale.push("short_term_bullish_long_term_bearish".to_string());
        } else if short < -WEAK_DIRECTION_THRESHOLD && long > WEAK_DIRECTION_THRESHOLD {
            rationale.push("short_term_bearish_long_term_bullish".to_string());
        }
    }

    // Data quality across all contributing horizons.
    if avg_confidence > HIGH_DATA_QUALITY_THRESHOLD {
        rationale.push("high_data_quality".to_string());
    } else if avg_confidence < LOW_DATA_QUALITY_THRESHOLD {
        rationale.push("low_data_quality".to_string());
    }

    rationale
}

/// Mean direction score over the signals whose horizon is in `subset`, or
/// `None` when the subset is empty.
fn subset_average(horizon_signals: &[HorizonSignal], subset: &[&str]) -> Option<f64> {
    let members: Vec<f64> = horizon_signals
        .iter()
        .filter(|s| subset.contains(&s.horizon.as_str()))
        .map(|s| s.direction_score)
        .collect();

    if members.is_empty() {
        None
    } else {
        Some(members.iter().sum::<f64>() / members.len() as f64)
    }
}
