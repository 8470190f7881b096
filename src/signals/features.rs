// =============================================================================
// Feature Extraction — deterministic features from an ordered bar slice
// =============================================================================
//
// Pure functions over oldest-first bar slices. Insufficient data degrades to
// neutral values rather than erroring; the confidence scorer is responsible
// for discounting those cases.
// =============================================================================

use crate::signals::config::{
    MOMENTUM_LOOKBACK, MOMENTUM_TANH_SCALE, STABILITY_SCALE, TREND_EPSILON, VOLATILITY_LOOKBACK,
};
use crate::signals::types::FeatureSet;
use crate::types::Bar;

/// Extract the feature set for a single horizon from `bars` (oldest first).
pub fn extract_features(horizon: &str, bars: &[Bar]) -> FeatureSet {
    let n_bars = bars.len();
    if n_bars == 0 {
        return FeatureSet::empty(horizon);
    }

    let last_close = bars[n_bars - 1].close;
    let first_close = bars[0].close;

    let momentum = compute_momentum(bars);
    let volatility = compute_volatility(bars);

    let trend_direction = if momentum > TREND_EPSILON {
        1.0
    } else if momentum < -TREND_EPSILON {
        -1.0
    } else {
        0.0
    };

    // Stability is a signal-to-noise proxy: calm series -> 1, noisy -> 0.
    let stability = (1.0 / (1.0 + volatility * STABILITY_SCALE)).clamp(0.0, 1.0);

    let avg_range = bars.iter().map(|b| b.high - b.low).sum::<f64>() / n_bars as f64;

    FeatureSet {
        horizon: horizon.to_string(),
        n_bars,
        momentum,
        volatility,
        trend_direction,
        stability,
        last_close,
        first_close,
        avg_range,
    }
}

/// tanh-normalised return over the momentum lookback, [-1, +1].
///
/// Returns 0.0 when fewer than two bars span the window.
fn compute_momentum(bars: &[Bar]) -> f64 {
    let n = bars.len();
    let lookback = MOMENTUM_LOOKBACK.min(n);
    if lookback <= 1 {
        return 0.0;
    }

    let start = bars[n - lookback].close;
    let last = bars[n - 1].close;
    let r = (last - start) / start.max(1e-9);

    (MOMENTUM_TANH_SCALE * r).tanh()
}

/// Sample standard deviation of per-bar log returns over the volatility
/// lookback. 0.0 when there are not enough bars for two returns.
fn compute_volatility(bars: &[Bar]) -> f64 {
    let n = bars.len();
    let lookback = VOLATILITY_LOOKBACK.min(n.saturating_sub(1));
    if lookback < 2 {
        return 0.0;
    }

    let mut returns = Vec::with_capacity(lookback);
    for i in (n - lookback)..n {
        let prev = bars[i - 1].close.max(1e-9);
        let curr = bars[i].close.max(1e-9);
        returns.push((curr / prev).ln());
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() - 1).max(1) as f64;

    variance.max(0.0).sqrt()
}

/// Directional score [-1, +1]: momentum discounted by stability, so a strong
/// move in a noisy series carries less conviction than the same move in a
/// calm one.
pub fn compute_direction_score(features: &FeatureSet) -> f64 {
    (features.momentum * features.stability).clamp(-1.0, 1.0)
}

/// Direction-independent strength [0, 1].
pub fn compute_strength(features: &FeatureSet) -> f64 {
    features.momentum.abs().clamp(0.0, 1.0)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "BTCUSDT".into(),
                interval: "1m".into(),
                ts: i as i64 * 60,
                open: close,
                high: close + 0.1,
                low: close - 0.1,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn empty_slice_yields_neutral_features() {
        let f = extract_features("1h", &[]);
        assert_eq!(f.n_bars, 0);
        assert_eq!(f.momentum, 0.0);
        assert_eq!(f.trend_direction, 0.0);
        assert_eq!(f.stability, 0.0);
    }

    #[test]
    fn single_bar_has_zero_momentum() {
        let f = extract_features("1m", &bars_from_closes(&[100.0]));
        assert_eq!(f.momentum, 0.0);
        assert_eq!(f.volatility, 0.0);
        assert_eq!(f.last_close, 100.0);
    }

    #[test]
    fn steady_uptrend_is_bullish() {
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64).collect();
        let f = extract_features("1m", &bars_from_closes(&closes));
        assert!(f.momentum > 0.5, "momentum = {}", f.momentum);
        assert_eq!(f.trend_direction, 1.0);
        assert_eq!(f.last_close, 120.0);
        assert_eq!(f.first_close, 100.0);
    }

    #[test]
    fn steady_downtrend_is_bearish() {
        let closes: Vec<f64> = (0..21).map(|i| 120.0 - i as f64).collect();
        let f = extract_features("1m", &bars_from_closes(&closes));
        assert!(f.momentum < -0.5, "momentum = {}", f.momentum);
        assert_eq!(f.trend_direction, -1.0);
    }

    #[test]
    fn flat_series_is_neutral() {
        let f = extract_features("1m", &bars_from_closes(&[100.0; 30]));
        assert_eq!(f.momentum, 0.0);
        assert_eq!(f.trend_direction, 0.0);
        assert_eq!(f.volatility, 0.0);
        assert_eq!(f.stability, 1.0);
    }

    #[test]
    fn choppy_series_has_higher_volatility_than_smooth() {
        let smooth: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.01).collect();
        let choppy: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 105.0 })
            .collect();

        let f_smooth = extract_features("1m", &bars_from_closes(&smooth));
        let f_choppy = extract_features("1m", &bars_from_closes(&choppy));

        assert!(f_choppy.volatility > f_smooth.volatility);
        assert!(f_choppy.stability < f_smooth.stability);
    }

    #[test]
    fn momentum_is_bounded() {
        // A 10x move must still land inside [-1, 1].
        let closes: Vec<f64> = (0..25).map(|i| 100.0 * (1.0 + i as f64)).collect();
        let f = extract_features("1m", &bars_from_closes(&closes));
        assert!(f.momentum <= 1.0 && f.momentum >= -1.0);
        assert!(f.momentum > 0.99);
    }

    #[test]
    fn avg_range_uses_high_minus_low() {
        let f = extract_features("1m", &bars_from_closes(&[100.0, 101.0]));
        assert!((f.avg_range - 0.2).abs() < 1e-12);
    }

    #[test]
    fn direction_score_is_momentum_times_stability() {
        let mut f = extract_features("1m", &bars_from_closes(&[100.0, 101.0, 102.0]));
        f.momentum = 0.8;
        f.stability = 0.5;
        assert!((compute_direction_score(&f) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn strength_ignores_sign() {
        let mut f = FeatureSet::empty("1m");
        f.momentum = -0.7;
        f.stability = 0.9;
        assert!((compute_strength(&f) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn features_are_deterministic() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.37).sin()).collect();
        let bars = bars_from_closes(&closes);
        let a = extract_features("15m", &bars);
        let b = extract_features("15m", &bars);
        assert_eq!(a, b);
    }
}
