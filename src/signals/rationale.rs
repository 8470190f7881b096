// =============================================================================
// Rationale Taxonomy — tags to categorised human-readable sentences
// =============================================================================
//
// Purely presentational: a static mapping from every rationale tag the
// pipeline can emit to a (category, sentence) pair. Horizon-prefixed tags
// (`15m_strong_bullish`, `1d_low_confidence`, ...) are recognised by
// structure so every horizon shares one sentence template. Unknown tags
// become generic notes. Output order follows input tag order, so identical
// responses always explain identically.
// =============================================================================

use crate::signals::types::Explanation;

/// Category of a rationale tag in the explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Driver,
    Risk,
    Note,
}

/// Horizons recognised as tag prefixes, with their prose names.
const HORIZON_LABELS: &[(&str, &str)] = &[
    ("1m", "1-minute"),
    ("5m", "5-minute"),
    ("15m", "15-minute"),
    ("1h", "1-hour"),
    ("4h", "4-hour"),
    ("1d", "Daily"),
    ("1w", "Weekly"),
];

/// Classify one tag into a category and a human-readable sentence.
pub fn classify_tag(tag: &str) -> (Category, String) {
    if let Some(classified) = classify_global_tag(tag) {
        return classified;
    }
    if let Some(classified) = classify_horizon_tag(tag) {
        return classified;
    }
    (Category::Note, format!("Unknown rationale: {tag}"))
}

/// Split the input tags into drivers, risks, and notes, preserving order.
pub fn categorize_rationale(tags: &[String]) -> Explanation {
    let mut drivers = Vec::new();
    let mut risks = Vec::new();
    let mut notes = Vec::new();

    for tag in tags {
        let (category, sentence) = classify_tag(tag);
        match category {
            Category::Driver => drivers.push(sentence),
            Category::Risk => risks.push(sentence),
            Category::Note => notes.push(sentence),
        }
    }

    Explanation {
        drivers,
        risks,
        notes,
    }
}

fn classify_global_tag(tag: &str) -> Option<(Category, String)> {
    use Category::*;

    let (category, sentence) = match tag {
        // Consensus drivers.
        "strong_agreement" => (Driver, "Strong alignment across multiple timeframes"),
        "moderate_agreement" => (Driver, "Moderate agreement between analyzed timeframes"),
        "majority_bullish" => (Driver, "Majority of timeframes show bullish bias"),
        "majority_bearish" => (Driver, "Majority of timeframes show bearish bias"),
        "high_confidence_signal" => {
            (Driver, "High confidence due to quality data and clear trend")
        }
        "high_data_quality" => (Driver, "Excellent data quality with minimal gaps"),

        // State drivers.
        "signal_strong_buy" => (Driver, "Signal strength exceeds strong buy threshold (>=0.65)"),
        "signal_buy" => (Driver, "Signal strength exceeds buy threshold (>=0.20)"),
        "signal_strong_sell" => {
            (Driver, "Signal strength exceeds strong sell threshold (<=-0.65)")
        }
        "signal_sell" => (Driver, "Signal strength exceeds sell threshold (<=-0.20)"),

        // Trade plan drivers.
        "long_position" => (Driver, "Buy signal suggests long position"),
        "short_position" => (Driver, "Sell signal suggests short position"),
        "aggressive_sizing" => (Driver, "High confidence supports larger position size"),

        // Risks.
        "weak_agreement" => (
            Risk,
            "Weak agreement between timeframes - conflicting signals detected",
        ),
        "conflicting_signals" => (Risk, "Timeframes show conflicting directional bias"),
        "mixed_directions" => (Risk, "Mixed bullish and bearish signals across horizons"),
        "short_term_bullish_long_term_bearish" => (
            Risk,
            "Short-term uptrend conflicts with long-term downtrend",
        ),
        "short_term_bearish_long_term_bullish" => (
            Risk,
            "Short-term downtrend conflicts with long-term uptrend",
        ),
        "low_confidence_signal" => (Risk, "Low confidence due to data quality or uncertainty"),
        "low_data_quality" => (Risk, "Limited or gappy data reduces signal reliability"),
        "low_agreement_warning" => (
            Risk,
            "Low agreement between timeframes - proceed with caution",
        ),
        "conservative_sizing" => (Risk, "Low confidence suggests smaller position size"),
        "signal_neutral" => (Risk, "Signal strength within neutral range (+/-0.20)"),
        "no_position_neutral" => (Risk, "Neutral signal - no clear trade opportunity"),

        // Notes.
        "no_data" => (Note, "Insufficient data available for analysis"),

        _ => return None,
    };

    Some((category, sentence.to_string()))
}

fn classify_horizon_tag(tag: &str) -> Option<(Category, String)> {
    use Category::*;

    for (prefix, label) in HORIZON_LABELS {
        let Some(suffix) = tag
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
        else {
            continue;
        };

        let (category, sentence) = match suffix {
            "strong_bullish" => (Driver, format!("{label} timeframe shows strong bullish momentum")),
            "weak_bullish" => (Driver, format!("{label} timeframe shows weak bullish bias")),
            "strong_bearish" => (Driver, format!("{label} timeframe shows strong bearish momentum")),
            "weak_bearish" => (Driver, format!("{label} timeframe shows weak bearish bias")),
            "neutral" => (Risk, format!("{label} timeframe shows no clear direction")),
            "high_volatility" => (Note, format!("{label} timeframe experiencing high volatility")),
            "low_volatility" => (Note, format!("{label} timeframe experiencing low volatility")),
            "high_confidence" => (Note, format!("{label} timeframe has high confidence data")),
            "low_confidence" => (Note, format!("{label} timeframe has low confidence data")),
            _ => continue,
        };

        return Some((category, sentence));
    }

    None
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn global_tags_classify() {
        let (cat, text) = classify_tag("strong_agreement");
        assert_eq!(cat, Category::Driver);
        assert!(text.contains("alignment"));

        let (cat, _) = classify_tag("conflicting_signals");
        assert_eq!(cat, Category::Risk);

        let (cat, _) = classify_tag("no_data");
        assert_eq!(cat, Category::Note);
    }

    #[test]
    fn horizon_tags_classify_for_every_horizon() {
        for (prefix, label) in HORIZON_LABELS {
            let (cat, text) = classify_tag(&format!("{prefix}_strong_bullish"));
            assert_eq!(cat, Category::Driver);
            assert!(text.starts_with(label), "{text}");

            let (cat, _) = classify_tag(&format!("{prefix}_neutral"));
            assert_eq!(cat, Category::Risk);

            let (cat, _) = classify_tag(&format!("{prefix}_high_volatility"));
            assert_eq!(cat, Category::Note);

            let (cat, _) = classify_tag(&format!("{prefix}_low_confidence"));
            assert_eq!(cat, Category::Note);
        }
    }

    #[test]
    fn unknown_tags_become_generic_notes() {
        let (cat, text) = classify_tag("mystery_tag");
        assert_eq!(cat, Category::Note);
        assert_eq!(text, "Unknown rationale: mystery_tag");

        // Unknown suffix on a known horizon prefix is still unknown.
        let (cat, text) = classify_tag("1h_sideways_chop");
        assert_eq!(cat, Category::Note);
        assert!(text.starts_with("Unknown rationale"));
    }

    #[test]
    fn categorisation_preserves_input_order() {
        let explanation = categorize_rationale(&tags(&[
            "15m_weak_bullish",
            "majority_bullish",
            "1h_neutral",
            "weak_agreement",
            "1m_high_volatility",
        ]));

        assert_eq!(explanation.drivers.len(), 2);
        assert!(explanation.drivers[0].starts_with("15-minute"));
        assert_eq!(explanation.drivers[1], "Majority of timeframes show bullish bias");
        assert_eq!(explanation.risks.len(), 2);
        assert!(explanation.risks[0].starts_with("1-hour"));
        assert_eq!(explanation.notes.len(), 1);
    }

    #[test]
    fn categorisation_is_deterministic() {
        let input = tags(&["signal_buy", "long_position", "bogus", "1d_low_volatility"]);
        let a = categorize_rationale(&input);
        let b = categorize_rationale(&input);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_is_empty_explanation() {
        let e = categorize_rationale(&[]);
        assert!(e.drivers.is_empty() && e.risks.is_empty() && e.notes.is_empty());
    }
}
