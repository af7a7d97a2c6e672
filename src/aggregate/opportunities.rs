//! Opportunity stage rollups.
//!
//! Buckets dollar-valued opportunities into the pipeline stage taxonomy.
//! Two modes:
//!
//! - Unfiltered (no date window): group by the stored stage label.
//! - Windowed: reconcile against lead progression so a lead is counted in
//!   exactly one stage — engaged-leads claim first (at the classifier's
//!   deepest stage), then meetings-booked claims whoever is left.

use std::collections::{HashMap, HashSet};

use crate::aggregate::normalize_email;
use crate::stages::{deepest_stage, PipelineStage, STAGE_ORDER};
use crate::types::{EngagedLeadRecord, MeetingRecord, OpportunityRecord, OpportunityStageRollup};

/// Display taxonomy: the six engaged-lead stages plus Meeting Booked at the
/// shallow end. Matches the 7-stage vocabulary the sales tooling writes.
pub const OPPORTUNITY_STAGES: [&str; 7] = [
    "Meeting Booked",
    "Showed Up to Disco",
    "Qualified",
    "Demo Booked",
    "Showed Up to Demo",
    "Proposal Sent",
    "Closed",
];

/// Map a stored stage label onto the display taxonomy. Tolerates case and
/// snake_case variants; anything unrecognized returns `None` and keeps its
/// stored label so no dollar value silently disappears from the board.
fn canonical_stage(label: &str) -> Option<&'static str> {
    let folded: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    OPPORTUNITY_STAGES
        .iter()
        .find(|stage| stage.to_lowercase() == folded)
        .copied()
}

#[derive(Default, Clone, Copy)]
struct Bucket {
    count: usize,
    value: f64,
}

fn to_rollups(
    mut buckets: HashMap<String, Bucket>,
    include_empty_stages: bool,
) -> Vec<OpportunityStageRollup> {
    let mut rollups: Vec<OpportunityStageRollup> = Vec::new();
    for stage in OPPORTUNITY_STAGES {
        match buckets.remove(stage) {
            Some(bucket) => rollups.push(OpportunityStageRollup {
                stage: stage.to_string(),
                count: bucket.count,
                value: bucket.value,
            }),
            None if include_empty_stages => rollups.push(OpportunityStageRollup {
                stage: stage.to_string(),
                count: 0,
                value: 0.0,
            }),
            None => {}
        }
    }
    // Unrecognized stored labels trail the taxonomy, alphabetically.
    let mut extras: Vec<(String, Bucket)> = buckets.into_iter().collect();
    extras.sort_by(|a, b| a.0.cmp(&b.0));
    for (stage, bucket) in extras {
        rollups.push(OpportunityStageRollup {
            stage,
            count: bucket.count,
            value: bucket.value,
        });
    }
    rollups
}

/// Unfiltered mode: group opportunities directly by stored stage.
pub fn aggregate_opportunities_unfiltered(
    opportunities: &[OpportunityRecord],
) -> Vec<OpportunityStageRollup> {
    let mut buckets: HashMap<String, Bucket> = HashMap::new();
    for opp in opportunities {
        let stage = canonical_stage(&opp.stage)
            .map(str::to_string)
            .unwrap_or_else(|| opp.stage.trim().to_string());
        if stage.is_empty() {
            continue;
        }
        let bucket = buckets.entry(stage).or_default();
        bucket.count += 1;
        bucket.value += opp.value;
    }
    to_rollups(buckets, false)
}

/// Windowed mode: reconcile opportunities against lead progression.
///
/// Every lead is counted at most once. Engaged-lead rows claim their email
/// at the classifier-deepest stage; meeting rows claim only emails not
/// already claimed, landing in Meeting Booked. Opportunity value attaches
/// by email match; a lead without an opportunity still counts with zero
/// value.
pub fn aggregate_opportunities_windowed(
    opportunities: &[OpportunityRecord],
    engaged: &[EngagedLeadRecord],
    meetings: &[MeetingRecord],
) -> Vec<OpportunityStageRollup> {
    // Total opportunity value per contact email.
    let mut value_by_email: HashMap<String, f64> = HashMap::new();
    for opp in opportunities {
        if let Some(email) = normalize_email(&opp.contact_email) {
            *value_by_email.entry(email).or_insert(0.0) += opp.value;
        }
    }

    let mut claimed: HashSet<String> = HashSet::new();
    let mut by_stage: HashMap<PipelineStage, Bucket> = HashMap::new();
    let mut meeting_bucket = Bucket::default();

    // Pass 1: engaged leads claim their email at the deepest stage.
    for lead in engaged {
        let Some(email) = normalize_email(&lead.email) else {
            continue;
        };
        let Some(stage) = deepest_stage(lead) else {
            continue; // no flag set yet; a meeting row may still claim them
        };
        if !claimed.insert(email.clone()) {
            continue; // duplicate engaged-lead row for the same person
        }
        let bucket = by_stage.entry(stage).or_default();
        bucket.count += 1;
        bucket.value += value_by_email.get(&email).copied().unwrap_or(0.0);
    }

    // Pass 2: meetings claim only emails nobody claimed yet.
    for meeting in meetings {
        let Some(email) = normalize_email(&meeting.email) else {
            continue;
        };
        if !claimed.insert(email.clone()) {
            continue;
        }
        meeting_bucket.count += 1;
        meeting_bucket.value += value_by_email.get(&email).copied().unwrap_or(0.0);
    }

    let mut buckets: HashMap<String, Bucket> = HashMap::new();
    buckets.insert("Meeting Booked".to_string(), meeting_bucket);
    for stage in STAGE_ORDER {
        buckets.insert(
            stage.as_str().to_string(),
            by_stage.get(&stage).copied().unwrap_or_default(),
        );
    }
    to_rollups(buckets, true)
}
