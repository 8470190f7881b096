// =============================================================================
// Trade Plan — entry, invalidation, validity, and size suggestion
// =============================================================================
//
// The plan is anchored to the primary horizon: the longest analysed horizon
// with enough bars to be trusted. Its latest close is the entry reference,
// its recent swing bounds the invalidation, and its validity window bounds
// the plan's lifetime.
// =============================================================================

use crate::signals::config::{
    validity_window_secs, INVALIDATION_BUFFER_PCT, INVALIDATION_LOOKBACK, MIN_BARS_FOR_CONFIDENCE,
    MODERATE_AGREEMENT_THRESHOLD, SIZE_BY_CONFIDENCE,
};
use crate::signals::types::{ConsensusSignal, SignalState, TradePlan};
use crate::timeframes::interval_sort_key;
use crate::types::Bar;

/// Pick the horizon that anchors the trade plan: the longest analysed
/// horizon with at least `MIN_BARS_FOR_CONFIDENCE` bars, falling back to the
/// longest with any data at all.
pub fn select_primary_horizon(consensus: &ConsensusSignal) -> Option<String> {
    let qualified = consensus
        .horizon_signals
        .iter()
        .filter(|s| s.features.n_bars >= MIN_BARS_FOR_CONFIDENCE)
        .max_by_key(|s| interval_sort_key(&s.horizon));

    if let Some(signal) = qualified {
        return Some(signal.horizon.clone());
    }

    consensus
        .horizon_signals
        .iter()
        .filter(|s| s.features.n_bars > 0)
        .max_by_key(|s| interval_sort_key(&s.horizon))
        .map(|s| s.horizon.clone())
}

/// Build the trade plan for a signal.
///
/// `primary_bars` is the oldest-first bar slice of `primary_horizon`;
/// `rationale` is the tag list accumulated by the state mapper and is
/// extended with position, sizing, and agreement tags.
#[allow(clippy::too_many_arguments)]
pub fn generate_trade_plan(
    symbol: &str,
    state: SignalState,
    confidence: f64,
    consensus: &ConsensusSignal,
    primary_horizon: &str,
    primary_bars: &[Bar],
    mut rationale: Vec<String>,
    now: i64,
) -> TradePlan {
    let last_close = primary_bars.last().map(|b| b.close).unwrap_or(0.0);

    let (entry_price, invalidation_price) = if state.is_buy() {
        rationale.push("long_position".to_string());
        (Some(last_close), buy_invalidation(primary_bars, last_close))
    } else if state.is_sell() {
        rationale.push("short_position".to_string());
        (Some(last_close), sell_invalidation(primary_bars, last_close))
    } else {
        rationale.push("no_position_neutral".to_string());
        // Advisory only: report whichever bound sits nearer the last close.
        let below = buy_invalidation(primary_bars, last_close);
        let above = sell_invalidation(primary_bars, last_close);
        let nearer = if (last_close - below).abs() <= (above - last_close).abs() {
            below
        } else {
            above
        };
        (None, nearer)
    };

    let valid_until_ts = now + validity_window_secs(primary_horizon);

    let size_suggestion_pct = size_suggestion(confidence);
    if size_suggestion_pct <= 0.5 {
        rationale.push("conservative_sizing".to_string());
    } else if size_suggestion_pct >= 1.5 {
        rationale.push("aggressive_sizing".to_string());
    }

    if consensus.agreement_score < MODERATE_AGREEMENT_THRESHOLD {
        rationale.push("low_agreement_warning".to_string());
    }

    TradePlan {
        state,
        confidence,
        entry_price,
        invalidation_price,
        valid_until_ts,
        size_suggestion_pct,
        rationale,
        symbol: symbol.to_string(),
        as_of_ts: now,
        horizons_analyzed: consensus
            .horizon_signals
            .iter()
            .map(|s| s.horizon.clone())
            .collect(),
    }
}

/// Stop level for a long: recent swing low minus the buffer, forced below
/// the entry reference.
fn buy_invalidation(bars: &[Bar], last_close: f64) -> f64 {
    let swing_low = recent_window(bars)
        .iter()
        .map(|b| b.low)
        .fold(f64::INFINITY, f64::min);

    let invalidation = if swing_low.is_finite() {
        swing_low * (1.0 - INVALIDATION_BUFFER_PCT)
    } else {
        last_close * (1.0 - INVALIDATION_BUFFER_PCT)
    };

    if invalidation >= last_close {
        last_close * (1.0 - INVALIDATION_BUFFER_PCT)
    } else {
        invalidation
    }
}

/// Stop level for a short: recent swing high plus the buffer, forced above
/// the entry reference.
fn sell_invalidation(bars: &[Bar], last_close: f64) -> f64 {
    let swing_high = recent_window(bars)
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);

    let invalidation = if swing_high.is_finite() {
        swing_high * (1.0 + INVALIDATION_BUFFER_PCT)
    } else {
        last_close * (1.0 + INVALIDATION_BUFFER_PCT)
    };

    if invalidation <= last_close {
        last_close * (1.0 + INVALIDATION_BUFFER_PCT)
    } else {
        invalidation
    }
}

fn recent_window(bars: &[Bar]) -> &[Bar] {
    let start = bars.len().saturating_sub(INVALIDATION_LOOKBACK);
    &bars[start..]
}

/// Size suggestion (% of capital) from the confidence bands. Monotonic
/// non-decreasing in confidence by construction of the table.
pub fn size_suggestion(confidence: f64) -> f64 {
    let c = confidence.clamp(0.0, 1.0);
    for &(low, high, size) in SIZE_BY_CONFIDENCE {
        if c >= low && (c < high || (high >= 1.0 && c <= high)) {
            return size;
        }
    }
    SIZE_BY_CONFIDENCE[0].2
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::types::{FeatureSet, HorizonSignal};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "BTCUSDT".into(),
                interval: "1h".into(),
                ts: i as i64 * 3_600,
                open: close,
                high: close + 0.1,
                low: close - 0.1,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn signal_with_bars(horizon: &str, n_bars: usize) -> HorizonSignal {
        let mut features = FeatureSet::empty(horizon);
        features.n_bars = n_bars;
        HorizonSignal {
            horizon: horizon.to_string(),
            direction_score: 0.5,
            strength: 0.5,
            confidence: 0.8,
            features,
            rationale: Vec::new(),
        }
    }

    fn consensus_with(signals: Vec<HorizonSignal>, agreement: f64) -> ConsensusSignal {
        ConsensusSignal {
            direction: 0.5,
            confidence: 0.8,
            agreement_score: agreement,
            horizon_signals: signals,
            rationale: Vec::new(),
        }
    }

    #[test]
    fn primary_is_longest_qualified_horizon() {
        let consensus = consensus_with(
            vec![
                signal_with_bars("1m", 100),
                signal_with_bars("1h", 50),
                signal_with_bars("1d", 3), // too thin to qualify
            ],
            1.0,
        );
        assert_eq!(select_primary_horizon(&consensus).as_deref(), Some("1h"));
    }

    #[test]
    fn primary_falls_back_to_longest_with_any_data() {
        let consensus = consensus_with(
            vec![signal_with_bars("1h", 2), signal_with_bars("4h", 1)],
            1.0,
        );
        assert_eq!(select_primary_horizon(&consensus).as_deref(), Some("4h"));
    }

    #[test]
    fn primary_is_none_without_data() {
        let consensus = consensus_with(vec![signal_with_bars("1h", 0)], 1.0);
        assert_eq!(select_primary_horizon(&consensus), None);
    }

    #[test]
    fn buy_plan_invalidates_below_entry() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let bars = bars_from_closes(&closes);
        let consensus = consensus_with(vec![signal_with_bars("1h", 20)], 1.0);

        let plan = generate_trade_plan(
            "BTCUSDT",
            SignalState::Buy,
            0.7,
            &consensus,
            "1h",
            &bars,
            Vec::new(),
            1_700_000_000,
        );

        assert_eq!(plan.entry_price, Some(119.0));
        assert!(plan.invalidation_price < 119.0);
        // Swing low is 99.9; buffered stop is 2% under it.
        assert!((plan.invalidation_price - 99.9 * 0.98).abs() < 1e-9);
        assert!(plan.rationale.contains(&"long_position".to_string()));
        assert_eq!(plan.valid_until_ts, 1_700_000_000 + 21_600);
    }

    #[test]
    fn sell_plan_invalidates_above_entry() {
        let closes: Vec<f64> = (0..20).map(|i| 120.0 - i as f64).collect();
        let bars = bars_from_closes(&closes);
        let consensus = consensus_with(vec![signal_with_bars("1h", 20)], 1.0);

        let plan = generate_trade_plan(
            "BTCUSDT",
            SignalState::Sell,
            0.7,
            &consensus,
            "1h",
            &bars,
            Vec::new(),
            1_700_000_000,
        );

        assert_eq!(plan.entry_price, Some(101.0));
        assert!(plan.invalidation_price > 101.0);
        assert!((plan.invalidation_price - 120.1 * 1.02).abs() < 1e-9);
        assert!(plan.rationale.contains(&"short_position".to_string()));
    }

    #[test]
    fn neutral_plan_has_no_entry() {
        let bars = bars_from_closes(&[100.0; 20]);
        let consensus = consensus_with(vec![signal_with_bars("1h", 20)], 1.0);

        let plan = generate_trade_plan(
            "BTCUSDT",
            SignalState::Neutral,
            0.2,
            &consensus,
            "1h",
            &bars,
            Vec::new(),
            0,
        );

        assert_eq!(plan.entry_price, None);
        assert!(plan.rationale.contains(&"no_position_neutral".to_string()));
    }

    #[test]
    fn invalidation_stays_below_entry_despite_elevated_history() {
        // Every earlier bar trades well above the final close; the stop must
        // still land under the entry, anchored to the window's lowest low.
        let mut bars = bars_from_closes(&[110.0; 19]);
        bars.push(Bar {
            symbol: "BTCUSDT".into(),
            interval: "1h".into(),
            ts: 19 * 3_600,
            open: 100.0,
            high: 100.1,
            low: 99.9,
            close: 100.0,
            volume: 1.0,
        });
        let consensus = consensus_with(vec![signal_with_bars("1h", bars.len())], 1.0);
        let plan = generate_trade_plan(
            "BTCUSDT",
            SignalState::Buy,
            0.7,
            &consensus,
            "1h",
            &bars,
            Vec::new(),
            0,
        );
        assert!(plan.invalidation_price < 100.0);
        assert!((plan.invalidation_price - 99.9 * 0.98).abs() < 1e-9);
    }

    #[test]
    fn empty_bars_use_buffered_zero_reference() {
        let consensus = consensus_with(Vec::new(), 1.0);
        let plan = generate_trade_plan(
            "BTCUSDT",
            SignalState::Buy,
            0.7,
            &consensus,
            "1h",
            &[],
            Vec::new(),
            0,
        );
        assert_eq!(plan.entry_price, Some(0.0));
        assert!(plan.invalidation_price <= 0.0 + 1e-12);
    }

    #[test]
    fn size_bands_match_the_table() {
        assert_eq!(size_suggestion(0.0), 0.25);
        assert_eq!(size_suggestion(0.39), 0.25);
        assert_eq!(size_suggestion(0.4), 0.5);
        assert_eq!(size_suggestion(0.59), 0.5);
        assert_eq!(size_suggestion(0.6), 1.0);
        assert_eq!(size_suggestion(0.74), 1.0);
        assert_eq!(size_suggestion(0.75), 1.5);
        assert_eq!(size_suggestion(0.89), 1.5);
        assert_eq!(size_suggestion(0.9), 2.0);
        assert_eq!(size_suggestion(1.0), 2.0);
    }

    #[test]
    fn size_is_monotonic_in_confidence() {
        let mut prev = 0.0;
        let mut c = 0.0;
        while c <= 1.0 {
            let size = size_suggestion(c);
            assert!(size >= prev, "size regressed at confidence {c}");
            prev = size;
            c += 0.01;
        }
    }

    #[test]
    fn low_agreement_emits_warning_without_shrinking_size() {
        let bars = bars_from_closes(&[100.0; 20]);
        let consensus = consensus_with(vec![signal_with_bars("1h", 20)], 0.3);

        let plan = generate_trade_plan(
            "BTCUSDT",
            SignalState::Buy,
            0.7,
            &consensus,
            "1h",
            &bars,
            Vec::new(),
            0,
        );

        assert!(plan.rationale.contains(&"low_agreement_warning".to_string()));
        assert_eq!(plan.size_suggestion_pct, size_suggestion(0.7));
    }

    #[test]
    fn sizing_band_tags() {
        let bars = bars_from_closes(&[100.0; 20]);
        let consensus = consensus_with(vec![signal_with_bars("1h", 20)], 1.0);

        let timid = generate_trade_plan(
            "BTCUSDT",
            SignalState::Buy,
            0.2,
            &consensus,
            "1h",
            &bars,
            Vec::new(),
            0,
        );
        assert!(timid.rationale.contains(&"conservative_sizing".to_string()));

        let bold = generate_trade_plan(
            "BTCUSDT",
            SignalState::Buy,
            0.95,
            &consensus,
            "1h",
            &bars,
            Vec::new(),
            0,
        );
        assert!(bold.rationale.contains(&"aggressive_sizing".to_string()));
    }
}
