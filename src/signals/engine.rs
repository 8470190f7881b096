// =============================================================================
// Signal Engine — per-request orchestration of the analytical pipeline
// =============================================================================
//
// fetch bars per horizon -> per-horizon signals -> consensus -> discrete
// state -> trade plan -> serialisable response. Everything after the store
// reads is pure; given the same bars the response is identical apart from
// the wall-clock `as_of_ts` / `valid_until_ts` pair.
//
// A fetch failure on one horizon degrades that horizon to "no data" — the
// request still succeeds and the confidence arithmetic absorbs the loss.
// =============================================================================

use std::collections::HashMap;

use tracing::warn;

use crate::signals::consensus::compute_consensus;
use crate::signals::explainability::{build_debug_trace, confidence_breakdown};
use crate::signals::horizon::compute_horizon_signal;
use crate::signals::rationale::categorize_rationale;
use crate::signals::states::map_to_signal_state;
use crate::signals::trade_plan::{generate_trade_plan, select_primary_horizon};
use crate::signals::types::{
    ConsensusSummary, FeatureSummary, HorizonDetail, SignalResponse, TradePlanSummary,
};
use crate::signals::{round2, round4, round6};
use crate::storage::BarStore;
use crate::types::Bar;

/// Wire version tag on every signal response.
const RESPONSE_VERSION: &str = "2.0";

/// Fallback primary horizon when nothing produced a signal.
const DEFAULT_PRIMARY_HORIZON: &str = "1h";

/// Options for a single signal request.
#[derive(Debug, Clone)]
pub struct SignalRequestOptions {
    pub bar_limit: u32,
    pub explain: bool,
    pub debug: bool,
}

/// Run the full pipeline for `symbol` over `horizons`.
///
/// `now` is the single wall-clock input; passing it in keeps the rest of the
/// pipeline reproducible in tests.
pub fn generate_signal(
    store: &BarStore,
    symbol: &str,
    horizons: &[String],
    options: &SignalRequestOptions,
    now: i64,
) -> SignalResponse {
    // Step 1: fetch bars for every requested horizon.
    let mut horizon_bars: HashMap<String, Vec<Bar>> = HashMap::new();
    for horizon in horizons {
        let bars = match store.fetch_bars(symbol, horizon, options.bar_limit) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, horizon = %horizon, error = %e,
                      "bar fetch failed — horizon degrades to no data");
                Vec::new()
            }
        };
        horizon_bars.insert(horizon.clone(), bars);
    }

    // Step 2: per-horizon signals, only where data exists.
    let horizon_signals = horizons
        .iter()
        .filter_map(|horizon| {
            let bars = horizon_bars.get(horizon)?;
            if bars.is_empty() {
                None
            } else {
                Some(compute_horizon_signal(horizon, bars))
            }
        })
        .collect();

    // Steps 3-4: consensus and discrete state.
    let consensus = compute_consensus(horizon_signals);
    let (state, rationale) = map_to_signal_state(&consensus);

    // Step 5: trade plan anchored to the primary horizon.
    let primary_horizon =
        select_primary_horizon(&consensus).unwrap_or_else(|| DEFAULT_PRIMARY_HORIZON.to_string());
    let empty = Vec::new();
    let primary_bars = horizon_bars.get(&primary_horizon).unwrap_or(&empty);

    let plan = generate_trade_plan(
        symbol,
        state,
        consensus.confidence,
        &consensus,
        &primary_horizon,
        primary_bars,
        rationale,
        now,
    );

    // Step 6: assemble the wire response.
    let horizon_details: Vec<HorizonDetail> = consensus
        .horizon_signals
        .iter()
        .map(|s| HorizonDetail {
            horizon: s.horizon.clone(),
            direction_score: round4(s.direction_score),
            strength: round4(s.strength),
            confidence: round4(s.confidence),
            rationale: s.rationale.clone(),
            features: FeatureSummary {
                n_bars: s.features.n_bars,
                momentum: round4(s.features.momentum),
                volatility: round6(s.features.volatility),
                trend_direction: s.features.trend_direction,
                stability: round4(s.features.stability),
            },
        })
        .collect();

    let trade_plan = TradePlanSummary {
        state: plan.state,
        confidence: round4(plan.confidence),
        entry_price: plan.entry_price.map(round2),
        invalidation_price: round2(plan.invalidation_price),
        valid_until_ts: plan.valid_until_ts,
        size_suggestion_pct: round2(plan.size_suggestion_pct),
        rationale: plan.rationale.clone(),
        horizons_analyzed: plan.horizons_analyzed.clone(),
    };

    let consensus_summary = ConsensusSummary {
        direction: round4(consensus.direction),
        confidence: round4(consensus.confidence),
        agreement_score: round4(consensus.agreement_score),
        rationale: consensus.rationale.clone(),
    };

    // Step 7: optional explainability layers.
    let include_explanation = options.explain || options.debug;
    let explanation = include_explanation.then(|| categorize_rationale(&trade_plan.rationale));
    let breakdown = include_explanation.then(|| confidence_breakdown(&consensus));
    let debug_trace = options
        .debug
        .then(|| build_debug_trace(symbol, &consensus, horizons));

    SignalResponse {
        symbol: symbol.to_string(),
        state,
        confidence: round4(consensus.confidence),
        trade_plan,
        consensus: consensus_summary,
        horizon_details,
        as_of_ts: now,
        version: RESPONSE_VERSION,
        explanation,
        confidence_breakdown: breakdown,
        debug_trace,
    }
}
