//! Firmographic performance breakdowns.
//!
//! Slices the lead population by company/role attributes and joins each
//! category against the reply set (engagement) and meeting set (booking) by
//! email. Coverage is measured per dimension: enrichment data is patchy and
//! a 12%-coverage dimension should not be read like a 95%-coverage one.

use std::collections::{HashMap, HashSet};

use crate::aggregate::normalize::{
    normalize_company_age, normalize_company_size, normalize_job_title, normalize_revenue,
};
use crate::aggregate::{normalize_email, pct};
use crate::types::{
    FirmographicCategory, FirmographicDimensionResult, FirmographicInsightsData, LeadRecord,
    MeetingRecord, ReplyRecord,
};

/// Fixed dimension set, in display order.
const DIMENSIONS: [&str; 9] = [
    "industry",
    "revenue",
    "company_size",
    "geography",
    "job_title",
    "tech_stack",
    "company_maturity",
    "funding_status",
    "signals",
];

/// A value that actually says something: non-empty and not the literal
/// "unknown" placeholder enrichment vendors emit.
fn meaningful(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(trimmed)
    }
}

/// Categories a lead contributes to one dimension. Usually 0 or 1; the
/// signals dimension can return up to three.
fn categories_for(lead: &LeadRecord, dimension: &str, current_year: i32) -> Vec<String> {
    match dimension {
        "industry" => meaningful(lead.industry.as_deref())
            .map(|v| vec![v.to_string()])
            .unwrap_or_default(),
        "revenue" => meaningful(lead.revenue.as_deref())
            .and_then(normalize_revenue)
            .map(|v| vec![v])
            .unwrap_or_default(),
        "company_size" => meaningful(lead.company_size.as_deref())
            .and_then(normalize_company_size)
            .map(|v| vec![v])
            .unwrap_or_default(),
        // HQ state, falling back to country when state is absent.
        "geography" => meaningful(lead.hq_state.as_deref())
            .or_else(|| meaningful(lead.hq_country.as_deref()))
            .map(|v| vec![v.to_string()])
            .unwrap_or_default(),
        "job_title" => meaningful(lead.job_title.as_deref())
            .map(|v| vec![normalize_job_title(v)])
            .unwrap_or_default(),
        "tech_stack" => meaningful(lead.tech_stack.as_deref())
            .map(|v| vec![v.to_string()])
            .unwrap_or_default(),
        "company_maturity" => meaningful(lead.founded.as_deref())
            .and_then(|v| normalize_company_age(v, current_year))
            .map(|v| vec![v])
            .unwrap_or_default(),
        // No data source wired yet; the dimension renders with zero coverage.
        "funding_status" => Vec::new(),
        "signals" => [&lead.signal_1, &lead.signal_2, &lead.signal_3]
            .iter()
            .filter_map(|s| meaningful(s.as_deref()))
            .map(|v| v.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Default)]
struct CategoryCounts {
    leads_in: usize,
    engaged: usize,
    positive: usize,
    booked: usize,
}

/// Full firmographic breakdown for one query window.
pub fn aggregate_firmographics(
    leads: &[LeadRecord],
    replies: &[ReplyRecord],
    meetings: &[MeetingRecord],
    current_year: i32,
) -> FirmographicInsightsData {
    // Index the join targets once, by email.
    let mut replied: HashSet<String> = HashSet::new();
    let mut positive: HashSet<String> = HashSet::new();
    for reply in replies {
        let Some(email) = reply.from_email.as_deref().and_then(normalize_email) else {
            continue;
        };
        let is_positive = reply
            .category
            .as_deref()
            .map(|c| c.trim().eq_ignore_ascii_case("interested"))
            .unwrap_or(false);
        if is_positive {
            positive.insert(email.clone());
        }
        replied.insert(email);
    }
    let booked: HashSet<String> = meetings
        .iter()
        .filter_map(|m| normalize_email(&m.email))
        .collect();

    let total_leads = leads.len();
    let mut dimensions = Vec::with_capacity(DIMENSIONS.len());

    for dimension in DIMENSIONS {
        let mut counts: HashMap<String, CategoryCounts> = HashMap::new();
        let mut leads_with_data = 0usize;

        for lead in leads {
            let categories = categories_for(lead, dimension, current_year);
            if categories.is_empty() {
                continue;
            }
            leads_with_data += 1;

            let email = normalize_email(&lead.email);
            let is_engaged = email.as_ref().map(|e| replied.contains(e)).unwrap_or(false);
            let is_positive = email.as_ref().map(|e| positive.contains(e)).unwrap_or(false);
            let is_booked = email.as_ref().map(|e| booked.contains(e)).unwrap_or(false);

            for category in categories {
                let entry = counts.entry(category).or_default();
                entry.leads_in += 1;
                if is_engaged {
                    entry.engaged += 1;
                }
                if is_positive {
                    entry.positive += 1;
                }
                if is_booked {
                    entry.booked += 1;
                }
            }
        }

        let mut categories: Vec<FirmographicCategory> = counts
            .into_iter()
            .map(|(label, c)| FirmographicCategory {
                label,
                leads_in: c.leads_in,
                engaged: c.engaged,
                positive: c.positive,
                booked: c.booked,
                engagement_rate: pct(c.engaged as f64, c.leads_in as f64),
                conversion_rate: pct(c.booked as f64, c.leads_in as f64),
            })
            .collect();
        categories.sort_by(|a, b| {
            b.leads_in
                .cmp(&a.leads_in)
                .then_with(|| a.label.cmp(&b.label))
        });

        dimensions.push(FirmographicDimensionResult {
            dimension: dimension.to_string(),
            coverage: pct(leads_with_data as f64, total_leads as f64),
            total_leads,
            leads_with_data,
            categories,
        });
    }

    FirmographicInsightsData {
        total_leads,
        dimensions,
    }
}
