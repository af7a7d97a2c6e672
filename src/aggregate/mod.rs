//! Pure aggregation passes over fully fetched in-memory row sets.
//!
//! Every function here is a synchronous transform: fetch happens upstream
//! (fan-out joined in [`crate::service`]), then one build-then-query pass
//! over indexed maps. No aggregator mutates its inputs or performs I/O.

pub mod campaigns;
pub mod firmographics;
pub mod funnel;
pub mod normalize;
pub mod opportunities;

use crate::types::CampaignSendRecord;

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage with the divide-by-zero guard every rate in the dashboard
/// uses: 0 when the denominator is 0, never NaN or infinity.
pub(crate) fn pct(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        round1(numerator / denominator * 100.0)
    }
}

/// Sum of the send log's `interested` column over in-window rows.
///
/// The funnel's "Interested" stage and the per-campaign `positiveReplies`
/// both come from this column, never from reply categorization.
pub fn sum_interested(sends: &[CampaignSendRecord]) -> i64 {
    sends.iter().map(|s| s.interested).sum()
}

/// Lowercased, trimmed email for join keys. `None` for empty values so
/// blank cells never join to each other.
pub(crate) fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
