// =============================================================================
// Signals Module
// =============================================================================
//
// The deterministic analytical pipeline, leaves first:
// - features / confidence: pure functions over ordered bar slices
// - horizon: per-horizon direction, strength, confidence, and tags
// - consensus: weighted multi-horizon combination with agreement detection
// - states: discrete state mapping
// - trade_plan: entry / invalidation / validity / sizing
// - engine: per-request orchestration into the wire response
// - rationale / explainability: presentational layers over the result

pub mod config;
pub mod confidence;
pub mod consensus;
pub mod engine;
pub mod explainability;
pub mod features;
pub mod horizon;
pub mod rationale;
pub mod states;
pub mod trade_plan;
pub mod types;

pub use engine::{generate_signal, SignalRequestOptions};
pub use types::{SignalResponse, SignalState};

/// Round to 4 decimals — scores, confidences, and weights on the wire.
pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Round to 2 decimals — prices and size percentages on the wire.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Round to 6 decimals — volatility keeps extra precision on the wire.
pub(crate) fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}
