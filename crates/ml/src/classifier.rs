//! Keyword-based category classifier and urgency keyword detection.

use std::sync::LazyLock;

use regex::RegexBuilder;
use triage_core::TicketCategory;

/// Category keyword tables, checked in order: Billing, Technical, Legal.
/// First match wins; no match defaults to Technical.
static CATEGORY_PATTERNS: LazyLock<Vec<(TicketCategory, regex::Regex)>> = LazyLock::new(|| {
    let table: [(TicketCategory, &str); 3] = [
        (
            TicketCategory::Billing,
            r"\b(?:bill|invoice|payment|charge|refund|subscription|plan upgrade|plan downgrade|billing|overcharge|double charge|cancel subscription)\b",
        ),
        (
            TicketCategory::Technical,
            r"\b(?:bug|error|crash|login|api|integration|slow|timeout|broken|not working|doesn't work|failed|failure|technical|support|help|issue)\b",
        ),
        (
            TicketCategory::Legal,
            r"\b(?:legal|lawyer|attorney|compliance|gdpr|privacy|terms|contract|subpoena|litigation|dispute|liability)\b",
        ),
    ];
    table
        .into_iter()
        .map(|(category, pattern)| {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("category pattern compiles");
            (category, re)
        })
        .collect()
});

/// Urgency keywords for the baseline scorer.
static URGENCY_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"\b(?:asap|as soon as possible|urgent|emergency|critical|broken|outage|down|not working|immediately|right now|P0|P1|severity 1)\b",
    )
    .case_insensitive(true)
    .build()
    .expect("urgency pattern compiles")
});

/// Classify ticket text into Billing, Technical, or Legal.
pub fn match_category(text: &str) -> TicketCategory {
    for (category, re) in CATEGORY_PATTERNS.iter() {
        if re.is_match(text) {
            return *category;
        }
    }
    TicketCategory::Technical
}

/// True when the text carries an urgency keyword.
pub fn has_urgency_keyword(text: &str) -> bool {
    URGENCY_RE.is_match(text)
}

/// Number of distinct urgency keyword hits, used by the lexicon model.
pub fn urgency_keyword_hits(text: &str) -> usize {
    URGENCY_RE.find_iter(text).count()
}
