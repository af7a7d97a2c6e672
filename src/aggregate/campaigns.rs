//! Campaign stats rollup.
//!
//! Joins the send log, replies, meetings, and campaign metadata into one row
//! per distinct (campaign_id, client) pair. All joins are build-then-query
//! over indexed maps; identity is always the pair, never the display name.

use std::collections::{HashMap, HashSet};

use crate::types::{
    CampaignMetadataRecord, CampaignSendRecord, CampaignStat, CampaignStatsPage, CampaignStatus,
    MeetingRecord, ReplyRecord,
};

/// Performance score weights: a ranking heuristic for the campaign table,
/// not a statistical model.
const MEETING_WEIGHT: i64 = 10;
const POSITIVE_REPLY_WEIGHT: i64 = 3;
const REAL_REPLY_WEIGHT: i64 = 1;

type CampaignKey = (String, String);

#[derive(Default)]
struct SendTotals {
    campaign_name: String,
    total_sent: i64,
    unique_prospects: i64,
    bounces: i64,
    interested: i64,
}

/// Whether a reply category marks an out-of-office auto-response.
pub(crate) fn is_out_of_office(category: &str) -> bool {
    let lowered = category.to_lowercase();
    lowered.contains("out of office") || lowered.contains("ooo")
}

/// Normalize a free-text campaign status.
///
/// Substring rules, first match wins; unrecognized non-empty text defaults
/// to active (operators type all sorts of things for a live campaign),
/// empty or absent text stays unknown.
pub fn normalize_status(raw: Option<&str>) -> CampaignStatus {
    let text = match raw {
        Some(text) if !text.trim().is_empty() => text.trim().to_lowercase(),
        _ => return CampaignStatus::Unknown,
    };

    if ["active", "running", "in progress"].iter().any(|s| text.contains(s)) {
        return CampaignStatus::Active;
    }
    if ["paused", "on hold"].iter().any(|s| text.contains(s)) {
        return CampaignStatus::Paused;
    }
    if ["completed", "stopped", "finished", "done", "ended"]
        .iter()
        .any(|s| text.contains(s))
    {
        return CampaignStatus::Completed;
    }
    CampaignStatus::Active
}

/// One row per (campaign_id, client) pair seen in sends, replies, or
/// meetings. Campaigns absent from the send log still appear, with zeroed
/// send metrics — absence from the send table is not absence from the
/// campaign population.
pub fn aggregate_campaign_stats(
    sends: &[CampaignSendRecord],
    replies: &[ReplyRecord],
    meetings: &[MeetingRecord],
    metadata: &[CampaignMetadataRecord],
) -> Vec<CampaignStat> {
    // Index every source by the campaign key before assembly. Rows with an
    // empty campaign id cannot join anywhere and are dropped, never grouped
    // under a blank key.
    let mut send_totals: HashMap<CampaignKey, SendTotals> = HashMap::new();
    for send in sends {
        if send.campaign_id.trim().is_empty() {
            continue;
        }
        let totals = send_totals
            .entry((send.campaign_id.clone(), send.client.clone()))
            .or_default();
        if totals.campaign_name.is_empty() && !send.campaign_name.is_empty() {
            totals.campaign_name = send.campaign_name.clone();
        }
        totals.total_sent += send.emails_sent;
        totals.unique_prospects += send.unique_leads_contacted;
        totals.bounces += send.bounced;
        totals.interested += send.interested;
    }

    // Per campaign: identity → has at least one non-OOO reply. The same
    // person replying on several threads collapses to one identity.
    let mut repliers: HashMap<CampaignKey, HashMap<String, bool>> = HashMap::new();
    for reply in replies {
        if reply.campaign_id.trim().is_empty() {
            continue;
        }
        let Some(identity) = reply.identity() else {
            continue; // unattributable row, excluded silently
        };
        let key = (reply.campaign_id.clone(), reply.client.clone());
        let real = !reply
            .category
            .as_deref()
            .map(is_out_of_office)
            .unwrap_or(false);
        let entry = repliers.entry(key).or_default().entry(identity).or_insert(false);
        *entry |= real;
    }

    let mut meeting_counts: HashMap<CampaignKey, i64> = HashMap::new();
    let mut meeting_names: HashMap<CampaignKey, String> = HashMap::new();
    for meeting in meetings {
        if meeting.campaign_id.trim().is_empty() {
            continue;
        }
        let key = (meeting.campaign_id.clone(), meeting.client.clone());
        *meeting_counts.entry(key.clone()).or_insert(0) += 1;
        if !meeting.campaign_name.is_empty() {
            meeting_names.entry(key).or_insert_with(|| meeting.campaign_name.clone());
        }
    }

    let status_by_key: HashMap<CampaignKey, Option<&str>> = metadata
        .iter()
        .map(|m| {
            (
                (m.campaign_id.clone(), m.client.clone()),
                m.status.as_deref(),
            )
        })
        .collect();

    let mut keys: HashSet<CampaignKey> = HashSet::new();
    keys.extend(send_totals.keys().cloned());
    keys.extend(repliers.keys().cloned());
    keys.extend(meeting_counts.keys().cloned());

    let mut stats: Vec<CampaignStat> = keys
        .into_iter()
        .map(|key| {
            let totals = send_totals.remove(&key).unwrap_or_default();
            let replier_map = repliers.get(&key);
            let total_replies = replier_map.map(|m| m.len() as i64).unwrap_or(0);
            let real_replies = replier_map
                .map(|m| m.values().filter(|real| **real).count() as i64)
                .unwrap_or(0);
            let meetings_booked = meeting_counts.get(&key).copied().unwrap_or(0);
            let status = normalize_status(status_by_key.get(&key).copied().flatten());

            let campaign_name = if !totals.campaign_name.is_empty() {
                totals.campaign_name
            } else {
                meeting_names.get(&key).cloned().unwrap_or_else(|| key.0.clone())
            };

            let performance_score = meetings_booked * MEETING_WEIGHT
                + totals.interested * POSITIVE_REPLY_WEIGHT
                + real_replies * REAL_REPLY_WEIGHT;

            CampaignStat {
                campaign_id: key.0,
                client: key.1,
                campaign_name,
                total_sent: totals.total_sent,
                unique_prospects: totals.unique_prospects,
                bounces: totals.bounces,
                total_replies,
                real_replies,
                positive_replies: totals.interested,
                meetings_booked,
                status: status.as_str().to_string(),
                performance_score,
            }
        })
        .collect();

    // Deterministic default order: totalSent descending, then name, then id.
    stats.sort_by(|a, b| {
        b.total_sent
            .cmp(&a.total_sent)
            .then_with(|| a.campaign_name.cmp(&b.campaign_name))
            .then_with(|| a.campaign_id.cmp(&b.campaign_id))
    });
    stats
}

/// Pure slice over the fully materialized, sorted array. `page` is 1-based.
pub fn paginate_campaign_stats(
    stats: Vec<CampaignStat>,
    page: usize,
    page_size: usize,
) -> CampaignStatsPage {
    let total_count = stats.len();
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size);
    let campaigns = stats
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();
    CampaignStatsPage {
        campaigns,
        total_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn send(campaign: &str, client: &str, sent: i64, unique: i64, interested: i64) -> CampaignSendRecord {
        serde_json::from_value(serde_json::json!({
            "campaign_id": campaign,
            "campaign_name": format!("{} name", campaign),
            "client": client,
            "date": NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            "emails_sent": sent,
            "unique_leads_contacted": unique,
            "bounced": 1,
            "interested": interested,
        }))
        .unwrap()
    }

    fn reply(identity: &str, campaign: &str, client: &str, category: &str) -> ReplyRecord {
        serde_json::from_value(serde_json::json!({
            "lead_id": identity,
            "campaign_id": campaign,
            "client": client,
            "category": category,
        }))
        .unwrap()
    }

    fn meeting(email: &str, campaign: &str, client: &str) -> MeetingRecord {
        serde_json::from_value(serde_json::json!({
            "email": email,
            "campaign_id": campaign,
            "campaign_name": format!("{} name", campaign),
            "client": client,
        }))
        .unwrap()
    }

    #[test]
    fn end_to_end_campaign_scenario() {
        // 3 send rows totaling 1000 sent / 400 unique contacts.
        let sends = vec![
            send("X", "A", 400, 150, 3),
            send("X", "A", 350, 150, 2),
            send("X", "A", 250, 100, 1),
        ];

        // 50 reply rows, 45 unique identities (5 rows duplicate an existing
        // identity), 3 of the 45 only ever reply out-of-office.
        let mut replies = Vec::new();
        for i in 0..45 {
            let category = if i < 3 { "Out Of Office" } else { "Interested" };
            replies.push(reply(&format!("lead-{}", i), "X", "A", category));
        }
        for i in 10..15 {
            // duplicate rows on the same thread
            replies.push(reply(&format!("lead-{}", i), "X", "A", "Interested"));
        }
        assert_eq!(replies.len(), 50);

        let meetings = vec![meeting("a@x.com", "X", "A"), meeting("b@x.com", "X", "A")];

        let stats = aggregate_campaign_stats(&sends, &replies, &meetings, &[]);
        assert_eq!(stats.len(), 1);
        let stat = &stats[0];
        assert_eq!(stat.total_sent, 1000);
        assert_eq!(stat.unique_prospects, 400);
        assert_eq!(stat.total_replies, 45);
        assert_eq!(stat.real_replies, 42);
        assert_eq!(stat.meetings_booked, 2);
        assert_eq!(stat.positive_replies, 6);
        assert!(stat.total_replies >= stat.real_replies && stat.real_replies >= 0);
    }

    #[test]
    fn identity_with_any_real_reply_counts_as_real() {
        // Same person: one OOO auto-response and one real reply.
        let replies = vec![
            reply("lead-1", "X", "A", "OOO"),
            reply("lead-1", "X", "A", "Interested"),
        ];
        let stats = aggregate_campaign_stats(&[], &replies, &[], &[]);
        assert_eq!(stats[0].total_replies, 1);
        assert_eq!(stats[0].real_replies, 1);
    }

    #[test]
    fn campaign_without_sends_still_appears_zeroed() {
        let replies = vec![reply("lead-1", "ghost", "A", "Interested")];
        let meetings = vec![meeting("g@x.com", "ghost", "A")];
        let stats = aggregate_campaign_stats(&[], &replies, &meetings, &[]);
        assert_eq!(stats.len(), 1);
        let stat = &stats[0];
        assert_eq!(stat.campaign_id, "ghost");
        assert_eq!(stat.total_sent, 0);
        assert_eq!(stat.unique_prospects, 0);
        assert_eq!(stat.total_replies, 1);
        assert_eq!(stat.meetings_booked, 1);
        assert_eq!(stat.status, "unknown");
    }

    #[test]
    fn rows_without_a_campaign_id_are_excluded() {
        // A blank join key must not synthesize a visible campaign row.
        let replies = vec![reply("lead-1", "", "A", "Interested")];
        let meetings = vec![meeting("m@x.com", "", "A")];
        let stats = aggregate_campaign_stats(&[], &replies, &meetings, &[]);
        assert!(stats.is_empty());

        // Alongside a real campaign, the blank-key rows still vanish.
        let sends = vec![send("X", "A", 100, 50, 0)];
        let stats = aggregate_campaign_stats(&sends, &replies, &meetings, &[]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].campaign_id, "X");
        assert_eq!(stats[0].total_replies, 0);
        assert_eq!(stats[0].meetings_booked, 0);
    }

    #[test]
    fn same_name_different_pairs_stay_distinct() {
        let mut a = send("c1", "A", 100, 50, 0);
        let mut b = send("c2", "B", 200, 80, 0);
        a.campaign_name = "Spring Push".into();
        b.campaign_name = "Spring Push".into();
        let stats = aggregate_campaign_stats(&[a, b], &[], &[], &[]);
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn performance_score_uses_fixed_weights() {
        let sends = vec![send("X", "A", 10, 10, 4)];
        let replies = vec![
            reply("l1", "X", "A", "Interested"),
            reply("l2", "X", "A", "Question"),
        ];
        let meetings = vec![meeting("m@x.com", "X", "A")];
        let stats = aggregate_campaign_stats(&sends, &replies, &meetings, &[]);
        // 1 meeting * 10 + 4 positive * 3 + 2 real * 1
        assert_eq!(stats[0].performance_score, 24);
    }

    #[test]
    fn status_normalization_rules() {
        assert_eq!(normalize_status(Some("Currently Running")), CampaignStatus::Active);
        assert_eq!(normalize_status(Some("in progress")), CampaignStatus::Active);
        assert_eq!(normalize_status(Some("Paused by client")), CampaignStatus::Paused);
        assert_eq!(normalize_status(Some("on hold")), CampaignStatus::Paused);
        assert_eq!(normalize_status(Some("Stopped 3/1")), CampaignStatus::Completed);
        assert_eq!(normalize_status(Some("done")), CampaignStatus::Completed);
        assert_eq!(normalize_status(Some("warming up")), CampaignStatus::Active);
        assert_eq!(normalize_status(Some("  ")), CampaignStatus::Unknown);
        assert_eq!(normalize_status(None), CampaignStatus::Unknown);
    }

    #[test]
    fn default_sort_is_total_sent_descending() {
        let sends = vec![
            send("small", "A", 10, 5, 0),
            send("big", "A", 500, 200, 0),
            send("mid", "A", 100, 40, 0),
        ];
        let stats = aggregate_campaign_stats(&sends, &[], &[], &[]);
        let ids: Vec<&str> = stats.iter().map(|s| s.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["big", "mid", "small"]);
    }

    #[test]
    fn pagination_is_a_pure_slice() {
        let sends: Vec<CampaignSendRecord> = (0..5)
            .map(|i| send(&format!("c{}", i), "A", 100 - i, 10, 0))
            .collect();
        let stats = aggregate_campaign_stats(&sends, &[], &[], &[]);

        let page = paginate_campaign_stats(stats.clone(), 2, 2);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.campaigns.len(), 2);
        assert_eq!(page.campaigns[0].campaign_id, "c2");

        let past_end = paginate_campaign_stats(stats, 4, 2);
        assert_eq!(past_end.campaigns.len(), 0);
        assert_eq!(past_end.total_count, 5);
    }
}
