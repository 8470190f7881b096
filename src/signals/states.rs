// =============================================================================
// State Mapping — consensus direction to discrete signal state
// =============================================================================
//
// Total piecewise mapping over [-1, +1]. Boundary values resolve outward:
// exactly 0.20 is BUY, exactly 0.65 is STRONG_BUY, and symmetrically for
// the sell side.
// =============================================================================

use crate::signals::config::{
    BUY_THRESHOLD, HIGH_CONFIDENCE_SIGNAL, LOW_CONFIDENCE_SIGNAL, SELL_THRESHOLD,
    STRONG_BUY_THRESHOLD, STRONG_SELL_THRESHOLD,
};
use crate::signals::types::{ConsensusSignal, SignalState};

/// Map a consensus to its discrete state and extend the rationale with the
/// state tag plus confidence qualifiers.
pub fn map_to_signal_state(consensus: &ConsensusSignal) -> (SignalState, Vec<String>) {
    let direction = consensus.direction;
    let mut rationale = consensus.rationale.clone();

    let state = if direction >= STRONG_BUY_THRESHOLD {
        rationale.push("signal_strong_buy".to_string());
        SignalState::StrongBuy
    } else if direction >= BUY_THRESHOLD {
        rationale.push("signal_buy".to_string());
        SignalState::Buy
    } else if direction <= STRONG_SELL_THRESHOLD {
        rationale.push("signal_strong_sell".to_string());
        SignalState::StrongSell
    } else if direction <= SELL_THRESHOLD {
        rationale.push("signal_sell".to_string());
        SignalState::Sell
    } else {
        rationale.push("signal_neutral".to_string());
        SignalState::Neutral
    };

    let confidence = consensus.confidence;
    if confidence >= HIGH_CONFIDENCE_SIGNAL {
        rationale.push("high_confidence_signal".to_string());
    } else if confidence <= LOW_CONFIDENCE_SIGNAL {
        rationale.push("low_confidence_signal".to_string());
    }

    (state, rationale)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn consensus(direction: f64, confidence: f64) -> ConsensusSignal {
        ConsensusSignal {
            direction,
            confidence,
            agreement_score: 1.0,
            horizon_signals: Vec::new(),
            rationale: Vec::new(),
        }
    }

    fn state_of(direction: f64) -> SignalState {
        map_to_signal_state(&consensus(direction, 0.5)).0
    }

    #[test]
    fn boundaries_resolve_outward() {
        assert_eq!(state_of(0.65), SignalState::StrongBuy);
        assert_eq!(state_of(0.20), SignalState::Buy);
        assert_eq!(state_of(-0.20), SignalState::Sell);
        assert_eq!(state_of(-0.65), SignalState::StrongSell);
    }

    #[test]
    fn interior_values_map_as_expected() {
        assert_eq!(state_of(0.9), SignalState::StrongBuy);
        assert_eq!(state_of(0.4), SignalState::Buy);
        assert_eq!(state_of(0.19), SignalState::Neutral);
        assert_eq!(state_of(0.0), SignalState::Neutral);
        assert_eq!(state_of(-0.19), SignalState::Neutral);
        assert_eq!(state_of(-0.4), SignalState::Sell);
        assert_eq!(state_of(-0.9), SignalState::StrongSell);
    }

    #[test]
    fn mapping_is_total_over_the_range() {
        // Sweep the whole direction range; every value must map.
        let mut d = -1.0;
        while d <= 1.0 {
            let _ = state_of(d);
            d += 0.001;
        }
        // Extremes included.
        assert_eq!(state_of(1.0), SignalState::StrongBuy);
        assert_eq!(state_of(-1.0), SignalState::StrongSell);
    }

    #[test]
    fn state_tag_is_appended() {
        let (_, tags) = map_to_signal_state(&consensus(0.3, 0.5));
        assert!(tags.contains(&"signal_buy".to_string()));

        let (_, tags) = map_to_signal_state(&consensus(0.0, 0.5));
        assert!(tags.contains(&"signal_neutral".to_string()));
    }

    #[test]
    fn confidence_qualifiers() {
        let (_, tags) = map_to_signal_state(&consensus(0.3, 0.8));
        assert!(tags.contains(&"high_confidence_signal".to_string()));

        let (_, tags) = map_to_signal_state(&consensus(0.3, 0.75));
        assert!(tags.contains(&"high_confidence_signal".to_string()));

        let (_, tags) = map_to_signal_state(&consensus(0.3, 0.4));
        assert!(tags.contains(&"low_confidence_signal".to_string()));

        let (_, tags) = map_to_signal_state(&consensus(0.3, 0.5));
        assert!(!tags.iter().any(|t| t.contains("confidence_signal")));
    }

    #[test]
    fn existing_rationale_is_preserved_in_order() {
        let mut c = consensus(0.7, 0.5);
        c.rationale = vec!["strong_agreement".to_string(), "majority_bullish".to_string()];
        let (_, tags) = map_to_signal_state(&c);
        assert_eq!(tags[0], "strong_agreement");
        assert_eq!(tags[1], "majority_bullish");
        assert_eq!(tags[2], "signal_strong_buy");
    }
}
