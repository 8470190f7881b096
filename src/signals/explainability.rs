// =============================================================================
// Explainability — confidence breakdown and debug trace
// =============================================================================
//
// Strictly presentational: every number here is already present in the
// signal response. Nothing is recalculated; the debug trace only re-states
// the arithmetic that produced the consensus so a reader can audit it.
// =============================================================================

use serde_json::json;

use crate::signals::config::{
    horizon_weight, BUY_THRESHOLD, SELL_THRESHOLD, STRONG_BUY_THRESHOLD, STRONG_SELL_THRESHOLD,
};
use crate::signals::{round4, round6};
use crate::signals::types::{ConfidenceBreakdown, ConfidenceBreakdownLabels, ConsensusSignal};

/// Fixed prose labels for the three breakdown components.
const BREAKDOWN_LABELS: ConfidenceBreakdownLabels = ConfidenceBreakdownLabels {
    total: "Consensus confidence: data quality discounted by agreement",
    data_quality: "Average confidence across analyzed timeframes",
    agreement: "Alignment between timeframe signals (1.0 = perfect agreement)",
};

/// Fixed note attached to every debug trace.
const DEBUG_NOTE: &str =
    "Debug trace shows intermediate values from the signal pipeline. No recalculation performed.";

/// Decompose the consensus confidence into its two factors.
pub fn confidence_breakdown(consensus: &ConsensusSignal) -> ConfidenceBreakdown {
    let signals = &consensus.horizon_signals;

    let data_quality = if signals.is_empty() {
        0.0
    } else {
        signals.iter().map(|s| s.confidence).sum::<f64>() / signals.len() as f64
    };

    ConfidenceBreakdown {
        total: round4(consensus.confidence),
        data_quality: round4(data_quality),
        agreement: round4(consensus.agreement_score),
        explanation: BREAKDOWN_LABELS,
    }
}

/// Full debug trace: raw per-horizon features, the consensus arithmetic,
/// the state thresholds, and the tag list.
pub fn build_debug_trace(
    symbol: &str,
    consensus: &ConsensusSignal,
    requested_horizons: &[String],
) -> serde_json::Value {
    let signals = &consensus.horizon_signals;

    let horizon_details: Vec<serde_json::Value> = signals
        .iter()
        .map(|s| {
            let weight = horizon_weight(&s.horizon);
            let effective_weight = weight * s.confidence;
            json!({
                "horizon": s.horizon,
                "direction_score": round4(s.direction_score),
                "strength": round4(s.strength),
                "confidence": round4(s.confidence),
                "weight": weight,
                "effective_weight": round4(effective_weight),
                "weighted_direction": round4(s.direction_score * effective_weight),
                "features": {
                    "n_bars": s.features.n_bars,
                    "momentum": round4(s.features.momentum),
                    "volatility": round6(s.features.volatility),
                    "trend_direction": s.features.trend_direction,
                    "stability": round4(s.features.stability),
                },
                "rationale": s.rationale,
            })
        })
        .collect();

    let total_weighted_direction: f64 = signals
        .iter()
        .map(|s| s.direction_score * horizon_weight(&s.horizon) * s.confidence)
        .sum();
    let total_effective_weight: f64 = signals
        .iter()
        .map(|s| horizon_weight(&s.horizon) * s.confidence)
        .sum();
    let avg_horizon_confidence = if signals.is_empty() {
        0.0
    } else {
        signals.iter().map(|s| s.confidence).sum::<f64>() / signals.len() as f64
    };

    let analyzed: Vec<&str> = signals.iter().map(|s| s.horizon.as_str()).collect();
    let missing: Vec<&String> = requested_horizons
        .iter()
        .filter(|h| !analyzed.contains(&h.as_str()))
        .collect();

    json!({
        "symbol": symbol,
        "horizons_analyzed": analyzed,
        "horizons_requested": requested_horizons,
        "horizons_missing": missing,
        "horizon_details": horizon_details,
        "consensus_calculation": {
            "total_weighted_direction": round4(total_weighted_direction),
            "total_effective_weight": round4(total_effective_weight),
            "direction": round4(consensus.direction),
            "agreement_score": round4(consensus.agreement_score),
            "avg_horizon_confidence": round4(avg_horizon_confidence),
            "confidence": round4(consensus.confidence),
        },
        "thresholds": {
            "strong_buy": STRONG_BUY_THRESHOLD,
            "buy": BUY_THRESHOLD,
            "sell": SELL_THRESHOLD,
            "strong_sell": STRONG_SELL_THRESHOLD,
        },
        "rationale_tags": consensus.rationale,
        "note": DEBUG_NOTE,
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::types::{FeatureSet, HorizonSignal};

    fn signal(horizon: &str, direction: f64, confidence: f64) -> HorizonSignal {
        HorizonSignal {
            horizon: horizon.to_string(),
            direction_score: direction,
            strength: direction.abs(),
            confidence,
            features: FeatureSet::empty(horizon),
            rationale: vec![format!("{horizon}_neutral")],
        }
    }

    fn consensus(signals: Vec<HorizonSignal>) -> ConsensusSignal {
        ConsensusSignal {
            direction: 0.3,
            confidence: 0.48,
            agreement_score: 0.8,
            horizon_signals: signals,
            rationale: vec!["moderate_agreement".to_string()],
        }
    }

    #[test]
    fn breakdown_reexposes_response_values() {
        let c = consensus(vec![signal("1m", 0.3, 0.5), signal("1h", 0.3, 0.7)]);
        let b = confidence_breakdown(&c);
        assert!((b.total - 0.48).abs() < 1e-9);
        assert!((b.data_quality - 0.6).abs() < 1e-9);
        assert!((b.agreement - 0.8).abs() < 1e-9);
    }

    #[test]
    fn breakdown_of_empty_consensus_is_zeroed() {
        let b = confidence_breakdown(&ConsensusSignal::no_data());
        assert_eq!(b.total, 0.0);
        assert_eq!(b.data_quality, 0.0);
        assert_eq!(b.agreement, 0.0);
    }

    #[test]
    fn debug_trace_lists_missing_horizons() {
        let c = consensus(vec![signal("1m", 0.3, 0.5)]);
        let requested = vec!["1m".to_string(), "1d".to_string()];
        let trace = build_debug_trace("BTCUSDT", &c, &requested);

        assert_eq!(trace["symbol"], "BTCUSDT");
        assert_eq!(trace["horizons_missing"][0], "1d");
        assert_eq!(trace["horizons_analyzed"][0], "1m");
    }

    #[test]
    fn debug_trace_restates_consensus_arithmetic() {
        let c = consensus(vec![signal("1m", 0.4, 0.5), signal("1h", -0.2, 0.8)]);
        let trace = build_debug_trace("ETHUSDT", &c, &["1m".to_string(), "1h".to_string()]);

        // 0.4 * (0.5*0.5) + (-0.2) * (1.5*0.8) = 0.1 - 0.24 = -0.14
        let twd = trace["consensus_calculation"]["total_weighted_direction"]
            .as_f64()
            .unwrap();
        assert!((twd + 0.14).abs() < 1e-9);

        let tew = trace["consensus_calculation"]["total_effective_weight"]
            .as_f64()
            .unwrap();
        assert!((tew - 1.45).abs() < 1e-9);

        assert!(trace["note"].as_str().unwrap().contains("No recalculation"));
    }

    #[test]
    fn debug_trace_is_deterministic() {
        let c = consensus(vec![signal("5m", 0.1, 0.6), signal("4h", 0.2, 0.7)]);
        let requested = vec!["5m".to_string(), "4h".to_string()];
        let a = build_debug_trace("BTCUSDT", &c, &requested);
        let b = build_debug_trace("BTCUSDT", &c, &requested);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
