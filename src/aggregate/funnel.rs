//! Pipeline/funnel stage sequence.
//!
//! Builds the ordered top-of-funnel-to-close sequence: Total Sent → Unique
//! Contacts → Real Replies → Interested → Meetings Booked → the six
//! engaged-lead stages. Stages after Meetings Booked count CUMULATIVELY per
//! flag — this view answers "how many ever reached at least this stage",
//! unlike the deepest-stage classification used by the campaign and
//! opportunity views. Keep the two counting policies separate; unifying
//! them silently changes displayed totals.

use std::collections::HashSet;

use crate::aggregate::campaigns::is_out_of_office;
use crate::aggregate::{pct, sum_interested};
use crate::stages::{stage_flag, PipelineStage, STAGE_ORDER};
use crate::types::{
    CampaignSendRecord, EngagedLeadRecord, ForecastOverrideRecord, FunnelStage, MeetingRecord,
    ReplyRecord,
};

/// Count of engaged leads whose flag for `stage` is set, independently of
/// any other flag. Cumulative-reach counting for the funnel view.
pub fn count_reaching_stage(engaged: &[EngagedLeadRecord], stage: PipelineStage) -> i64 {
    engaged.iter().filter(|lead| stage_flag(lead, stage)).count() as i64
}

/// Unique real repliers across the whole window, keyed by (identity,
/// client): a lead replying to two campaigns counts once here, unlike the
/// per-campaign dedup in the campaign stats view. Identities that only ever
/// replied out-of-office are excluded.
fn count_real_repliers(replies: &[ReplyRecord]) -> i64 {
    let mut real: HashSet<(String, String)> = HashSet::new();
    for reply in replies {
        let Some(identity) = reply.identity() else {
            continue;
        };
        let ooo = reply
            .category
            .as_deref()
            .map(is_out_of_office)
            .unwrap_or(false);
        if !ooo {
            real.insert((identity, reply.client.clone()));
        }
    }
    real.len() as i64
}

/// The ordered funnel for one query window.
///
/// When a manual forecast/actuals row has a non-zero entry for a stage's
/// metric key, the manual value replaces the computed one — an operator
/// override path, not a fallback-on-error.
pub fn aggregate_funnel(
    sends: &[CampaignSendRecord],
    replies: &[ReplyRecord],
    meetings: &[MeetingRecord],
    engaged: &[EngagedLeadRecord],
    overrides: Option<&ForecastOverrideRecord>,
) -> Vec<FunnelStage> {
    let mut stages: Vec<(&'static str, &'static str, i64)> = vec![
        (
            "Total Sent",
            "total_sent",
            sends.iter().map(|s| s.emails_sent).sum(),
        ),
        (
            "Unique Contacts",
            "unique_contacts",
            sends.iter().map(|s| s.unique_leads_contacted).sum(),
        ),
        ("Real Replies", "real_replies", count_real_repliers(replies)),
        ("Interested", "interested", sum_interested(sends)),
        ("Meetings Booked", "meetings_booked", meetings.len() as i64),
    ];
    for stage in STAGE_ORDER {
        stages.push((
            stage.as_str(),
            stage.metric_key(),
            count_reaching_stage(engaged, stage),
        ));
    }

    // Manual value > 0 wins, else the computed value stands.
    if let Some(overrides) = overrides {
        for (_, key, value) in stages.iter_mut() {
            let manual = overrides.metric(key);
            if manual > 0 {
                *value = manual;
            }
        }
    }

    let mut result = Vec::with_capacity(stages.len());
    let mut previous: Option<i64> = None;
    for (name, _, value) in stages {
        let percentage = match previous {
            None => {
                if value > 0 {
                    100.0
                } else {
                    0.0
                }
            }
            Some(prev) => pct(value as f64, prev as f64),
        };
        result.push(FunnelStage {
            name: name.to_string(),
            value,
            percentage,
        });
        previous = Some(value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn send(sent: i64, unique: i64, interested: i64) -> CampaignSendRecord {
        serde_json::from_value(json!({
            "campaign_id": "c1",
            "client": "acme",
            "date": "2026-03-10",
            "emails_sent": sent,
            "unique_leads_contacted": unique,
            "interested": interested,
        }))
        .unwrap()
    }

    fn reply(identity: &str, campaign: &str, category: &str) -> ReplyRecord {
        serde_json::from_value(json!({
            "lead_id": identity,
            "campaign_id": campaign,
            "client": "acme",
            "category": category,
        }))
        .unwrap()
    }

    fn meeting(email: &str) -> MeetingRecord {
        serde_json::from_value(json!({
            "email": email,
            "campaign_id": "c1",
            "client": "acme",
        }))
        .unwrap()
    }

    fn engaged(email: &str, flags: &[&str]) -> EngagedLeadRecord {
        let mut row = serde_json::Map::new();
        row.insert("email".into(), json!(email));
        row.insert("client".into(), json!("acme"));
        for flag in flags {
            row.insert((*flag).into(), json!(true));
        }
        serde_json::from_value(serde_json::Value::Object(row)).unwrap()
    }

    #[test]
    fn stage_sequence_is_fixed_and_ordered() {
        let stages = aggregate_funnel(&[], &[], &[], &[], None);
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Total Sent",
                "Unique Contacts",
                "Real Replies",
                "Interested",
                "Meetings Booked",
                "Showed Up to Disco",
                "Qualified",
                "Demo Booked",
                "Showed Up to Demo",
                "Proposal Sent",
                "Closed",
            ]
        );
    }

    #[test]
    fn cumulative_flag_counting_is_independent_per_stage() {
        // One lead reached disco only; one reached qualified (with disco);
        // one skipped straight to qualified (inconsistent flags).
        let leads = vec![
            engaged("a@x.com", &["showed_up_to_disco"]),
            engaged("b@x.com", &["showed_up_to_disco", "qualified"]),
            engaged("c@x.com", &["qualified"]),
        ];
        assert_eq!(
            count_reaching_stage(&leads, PipelineStage::ShowedUpToDisco),
            2
        );
        assert_eq!(count_reaching_stage(&leads, PipelineStage::Qualified), 2);
        assert_eq!(count_reaching_stage(&leads, PipelineStage::Closed), 0);
    }

    #[test]
    fn real_replies_are_unique_per_lead_across_campaigns() {
        let replies = vec![
            reply("lead-1", "c1", "Interested"),
            reply("lead-1", "c2", "Question"), // same lead, second campaign
            reply("lead-2", "c1", "Out of office"),
        ];
        assert_eq!(count_real_repliers(&replies), 1);
    }

    #[test]
    fn percentages_chain_off_the_previous_stage() {
        let sends = vec![send(1000, 400, 20)];
        let replies: Vec<ReplyRecord> =
            (0..40).map(|i| reply(&format!("l{}", i), "c1", "Interested")).collect();
        let meetings: Vec<MeetingRecord> = (0..10).map(|i| meeting(&format!("m{}@x.com", i))).collect();

        let stages = aggregate_funnel(&sends, &replies, &meetings, &[], None);
        assert_eq!(stages[0].value, 1000);
        assert_eq!(stages[0].percentage, 100.0);
        assert_eq!(stages[1].percentage, 40.0); // 400 / 1000
        assert_eq!(stages[2].percentage, 10.0); // 40 / 400
        assert_eq!(stages[3].percentage, 50.0); // 20 / 40
        assert_eq!(stages[4].percentage, 50.0); // 10 / 20
    }

    #[test]
    fn zero_denominator_yields_zero_percent_never_nan() {
        let meetings = vec![meeting("m@x.com")];
        let stages = aggregate_funnel(&[], &[], &meetings, &[], None);
        for (i, stage) in stages.iter().enumerate() {
            assert!(
                stage.percentage.is_finite(),
                "stage {} produced a non-finite percentage",
                i
            );
        }
        // Interested is 0, so Meetings Booked divides by zero and guards.
        assert_eq!(stages[4].value, 1);
        assert_eq!(stages[4].percentage, 0.0);
    }

    #[test]
    fn manual_override_replaces_computed_values_only_when_non_zero() {
        let sends = vec![send(1000, 400, 20)];
        let overrides: ForecastOverrideRecord = serde_json::from_value(json!({
            "client": "acme",
            "month": 3,
            "year": 2026,
            "meetings_booked": 25,
        }))
        .unwrap();

        let stages = aggregate_funnel(&sends, &[], &[], &[], Some(&overrides));
        let meetings_stage = stages.iter().find(|s| s.name == "Meetings Booked").unwrap();
        assert_eq!(meetings_stage.value, 25); // manual wins
        let sent_stage = stages.iter().find(|s| s.name == "Total Sent").unwrap();
        assert_eq!(sent_stage.value, 1000); // zero override leaves computed
    }

    #[test]
    fn empty_window_is_all_zero() {
        let stages = aggregate_funnel(&[], &[], &[], &[], None);
        assert!(stages.iter().all(|s| s.value == 0 && s.percentage == 0.0));
    }
}
