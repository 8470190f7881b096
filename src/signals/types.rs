// =============================================================================
// Signal Engine Types
// =============================================================================
//
// Everything here is transient: computed per request from a snapshot of the
// store, serialised into the response, and discarded. The engine holds no
// session state.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Discrete signal states, ordered bearish to bullish for readability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalState {
    #[serde(rename = "STRONG_BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "NEUTRAL")]
    Neutral,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "STRONG_SELL")]
    StrongSell,
}

impl SignalState {
    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBuy => "STRONG_BUY",
            Self::Buy => "BUY",
            Self::Neutral => "NEUTRAL",
            Self::Sell => "SELL",
            Self::StrongSell => "STRONG_SELL",
        }
    }

    /// `true` for BUY / STRONG_BUY.
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy | Self::StrongBuy)
    }

    /// `true` for SELL / STRONG_SELL.
    pub fn is_sell(&self) -> bool {
        matches!(self, Self::Sell | Self::StrongSell)
    }
}

impl std::fmt::Display for SignalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deterministic features extracted from one horizon's bar slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSet {
    pub horizon: String,
    pub n_bars: usize,
    /// tanh-normalised lookback return, [-1, +1].
    pub momentum: f64,
    /// Standard deviation of per-bar log returns, >= 0.
    pub volatility: f64,
    /// Sign of momentum: -1.0, 0.0, or +1.0.
    pub trend_direction: f64,
    /// Inverse-volatility signal-to-noise proxy, [0, 1].
    pub stability: f64,
    pub last_close: f64,
    pub first_close: f64,
    /// Mean (high - low) over the slice.
    pub avg_range: f64,
}

impl FeatureSet {
    /// Neutral features for a horizon with no data.
    pub fn empty(horizon: &str) -> Self {
        Self {
            horizon: horizon.to_string(),
            n_bars: 0,
            momentum: 0.0,
            volatility: 0.0,
            trend_direction: 0.0,
            stability: 0.0,
            last_close: 0.0,
            first_close: 0.0,
            avg_range: 0.0,
        }
    }
}

/// Signal derived from a single horizon.
#[derive(Debug, Clone, Serialize)]
pub struct HorizonSignal {
    pub horizon: String,
    /// [-1, +1]: -1 = bearish, +1 = bullish.
    pub direction_score: f64,
    /// [0, 1]: magnitude of the directional bias.
    pub strength: f64,
    /// [0, 1]: data-quality confidence.
    pub confidence: f64,
    pub features: FeatureSet,
    pub rationale: Vec<String>,
}

/// Multi-horizon consensus.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusSignal {
    /// [-1, +1] weighted average direction.
    pub direction: f64,
    /// [0, 1] mean horizon confidence discounted by agreement.
    pub confidence: f64,
    /// [0, 1] sign alignment across horizons.
    pub agreement_score: f64,
    pub horizon_signals: Vec<HorizonSignal>,
    pub rationale: Vec<String>,
}

impl ConsensusSignal {
    /// The no-data consensus: neutral everything plus the `no_data` tag.
    pub fn no_data() -> Self {
        Self {
            direction: 0.0,
            confidence: 0.0,
            agreement_score: 0.0,
            horizon_signals: Vec::new(),
            rationale: vec!["no_data".to_string()],
        }
    }
}

/// Actionable plan derived from the final state.
#[derive(Debug, Clone, Serialize)]
pub struct TradePlan {
    pub state: SignalState,
    pub confidence: f64,
    /// None for NEUTRAL — there is no position to enter.
    pub entry_price: Option<f64>,
    pub invalidation_price: f64,
    pub valid_until_ts: i64,
    pub size_suggestion_pct: f64,
    pub rationale: Vec<String>,
    pub symbol: String,
    pub as_of_ts: i64,
    pub horizons_analyzed: Vec<String>,
}

/// Per-horizon summary block in the wire response.
#[derive(Debug, Clone, Serialize)]
pub struct HorizonDetail {
    pub horizon: String,
    pub direction_score: f64,
    pub strength: f64,
    pub confidence: f64,
    pub rationale: Vec<String>,
    pub features: FeatureSummary,
}

/// Feature block in the wire response (volatility keeps extra precision).
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub n_bars: usize,
    pub momentum: f64,
    pub volatility: f64,
    pub trend_direction: f64,
    pub stability: f64,
}

/// Consensus summary block in the wire response.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusSummary {
    pub direction: f64,
    pub confidence: f64,
    pub agreement_score: f64,
    pub rationale: Vec<String>,
}

/// Trade-plan block in the wire response.
#[derive(Debug, Clone, Serialize)]
pub struct TradePlanSummary {
    pub state: SignalState,
    pub confidence: f64,
    pub entry_price: Option<f64>,
    pub invalidation_price: f64,
    pub valid_until_ts: i64,
    pub size_suggestion_pct: f64,
    pub rationale: Vec<String>,
    pub horizons_analyzed: Vec<String>,
}

/// Human-readable explanation: categorised sentences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub drivers: Vec<String>,
    pub risks: Vec<String>,
    pub notes: Vec<String>,
}

/// Static prose labels attached to the confidence breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceBreakdownLabels {
    pub total: &'static str,
    pub data_quality: &'static str,
    pub agreement: &'static str,
}

/// Decomposition of the consensus confidence — values already present in
/// the response, never recomputed.
#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceBreakdown {
    pub total: f64,
    pub data_quality: f64,
    pub agreement: f64,
    pub explanation: ConfidenceBreakdownLabels,
}

/// Full response for `POST /v1/signal`.
#[derive(Debug, Clone, Serialize)]
pub struct SignalResponse {
    pub symbol: String,
    pub state: SignalState,
    pub confidence: f64,
    pub trade_plan: TradePlanSummary,
    pub consensus: ConsensusSummary,
    pub horizon_details: Vec<HorizonDetail>,
    pub as_of_ts: i64,
    pub version: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_breakdown: Option<ConfidenceBreakdown>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_trace: Option<serde_json::Value>,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_state_serialises_to_wire_names() {
        let json = serde_json::to_string(&SignalState::StrongBuy).unwrap();
        assert_eq!(json, "\"STRONG_BUY\"");
        let back: SignalState = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(back, SignalState::Sell);
    }

    #[test]
    fn state_side_helpers() {
        assert!(SignalState::Buy.is_buy());
        assert!(SignalState::StrongBuy.is_buy());
        assert!(SignalState::Sell.is_sell());
        assert!(SignalState::StrongSell.is_sell());
        assert!(!SignalState::Neutral.is_buy());
        assert!(!SignalState::Neutral.is_sell());
    }

    #[test]
    fn no_data_consensus_is_tagged() {
        let c = ConsensusSignal::no_data();
        assert_eq!(c.direction, 0.0);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.rationale, vec!["no_data"]);
    }
}
