//! Row and payload types.
//!
//! Raw record structs deserialize store rows as-is (snake_case columns,
//! `#[serde(default)]` everywhere a source is known to be sparse). Derived
//! payload structs serialize camelCase for the presentation layer. Raw rows
//! are read-only inputs; nothing in this crate writes them back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Query window
// ============================================================================

/// Inclusive date range for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

// ============================================================================
// Raw store rows
// ============================================================================

/// One row per campaign per day in the send log.
///
/// Campaign identity is always the (campaign_id, client) pair. Display names
/// repeat across distinct pairs and are never used as a join key.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignSendRecord {
    pub campaign_id: String,
    #[serde(default)]
    pub campaign_name: String,
    pub client: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub emails_sent: i64,
    #[serde(default)]
    pub unique_leads_contacted: i64,
    #[serde(default)]
    pub bounced: i64,
    /// Positive replies as tracked by the sending tool. Independent of the
    /// replies table; the two are never conflated.
    #[serde(default)]
    pub interested: i64,
}

/// One row per inbound reply event.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRecord {
    #[serde(default)]
    pub lead_id: Option<String>,
    /// Fallback identity when lead_id is absent.
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub client: String,
    /// Free text. "Out of office" detection is a case-insensitive substring
    /// match; "interested" marks a positive reply.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl ReplyRecord {
    /// Dedup identity: lead_id when present (trimmed, case preserved — lead
    /// identifiers are opaque and may be case-sensitive), else the sender
    /// email lowercased. `None` means the row cannot be attributed to anyone
    /// and is skipped.
    pub fn identity(&self) -> Option<String> {
        if let Some(id) = self.lead_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }
        let email = self
            .from_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some(email.to_lowercase())
    }
}

/// One row per booked meeting, attributed to exactly one campaign+client
/// pair at booking time.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingRecord {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub campaign_name: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    // Firmographic snapshot taken at booking time.
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub revenue: Option<String>,
    #[serde(default)]
    pub hq_state: Option<String>,
}

/// One row per lead that progressed past initial reply.
///
/// The six stage flags are kept as raw JSON values because upstream typing is
/// inconsistent; read them through [`crate::truthy::parse_truthy`] only.
#[derive(Debug, Clone, Deserialize)]
pub struct EngagedLeadRecord {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub date_created: Option<NaiveDate>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub showed_up_to_disco: Value,
    #[serde(default)]
    pub qualified: Value,
    #[serde(default)]
    pub demo_booked: Value,
    #[serde(default)]
    pub showed_up_to_demo: Value,
    #[serde(default)]
    pub proposal_sent: Value,
    #[serde(default)]
    pub closed: Value,
}

/// One row per sales opportunity, created by external sales tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct OpportunityRecord {
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row per campaign with free-text status.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignMetadataRecord {
    pub campaign_id: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One row per campaign prospect with enrichment attributes. This is the
/// lead population the firmographic views slice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadRecord {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub date_added: Option<NaiveDate>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub revenue: Option<String>,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub hq_state: Option<String>,
    #[serde(default)]
    pub hq_country: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub tech_stack: Option<String>,
    #[serde(default)]
    pub founded: Option<String>,
    #[serde(default)]
    pub signal_1: Option<String>,
    #[serde(default)]
    pub signal_2: Option<String>,
    #[serde(default)]
    pub signal_3: Option<String>,
}

/// Manually entered forecast/actuals row, one per (client, month, year).
///
/// Non-zero entries override the computed funnel value for display. Zero
/// means "no manual entry", never "display zero".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastOverrideRecord {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub month: u32,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub total_sent: i64,
    #[serde(default)]
    pub unique_contacts: i64,
    #[serde(default)]
    pub real_replies: i64,
    #[serde(default)]
    pub interested: i64,
    #[serde(default)]
    pub meetings_booked: i64,
    #[serde(default)]
    pub showed_up_to_disco: i64,
    #[serde(default)]
    pub qualified: i64,
    #[serde(default)]
    pub demo_booked: i64,
    #[serde(default)]
    pub showed_up_to_demo: i64,
    #[serde(default)]
    pub proposal_sent: i64,
    #[serde(default)]
    pub closed: i64,
}

impl ForecastOverrideRecord {
    /// Manual value for a funnel metric key, or 0 when no entry exists.
    pub fn metric(&self, key: &str) -> i64 {
        match key {
            "total_sent" => self.total_sent,
            "unique_contacts" => self.unique_contacts,
            "real_replies" => self.real_replies,
            "interested" => self.interested,
            "meetings_booked" => self.meetings_booked,
            "showed_up_to_disco" => self.showed_up_to_disco,
            "qualified" => self.qualified,
            "demo_booked" => self.demo_booked,
            "showed_up_to_demo" => self.showed_up_to_demo,
            "proposal_sent" => self.proposal_sent,
            "closed" => self.closed,
            _ => 0,
        }
    }
}

// ============================================================================
// Derived payloads (presentation-facing)
// ============================================================================

/// Normalized campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Paused,
    Completed,
    Unknown,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }
}

/// One row per distinct (campaign_id, client) pair in the campaign table view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStat {
    pub campaign_id: String,
    pub campaign_name: String,
    pub client: String,
    pub total_sent: i64,
    pub unique_prospects: i64,
    pub bounces: i64,
    /// Unique repliers, whatever they said.
    pub total_replies: i64,
    /// Unique repliers excluding out-of-office auto-responses.
    pub real_replies: i64,
    /// Summed from the send log's `interested` column, not from reply rows.
    pub positive_replies: i64,
    pub meetings_booked: i64,
    pub status: String,
    pub performance_score: i64,
}

/// Sorted, sliced campaign stats plus the pre-slice total for pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatsPage {
    pub campaigns: Vec<CampaignStat>,
    pub total_count: usize,
}

/// One named stage in the top-of-funnel-to-close sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStage {
    pub name: String,
    pub value: i64,
    /// Percent of the previous stage, one decimal, 0 when the previous
    /// stage is 0.
    pub percentage: f64,
}

/// Dollar-valued opportunity rollup for one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityStageRollup {
    pub stage: String,
    pub count: usize,
    pub value: f64,
}

/// One category within a firmographic dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmographicCategory {
    pub label: String,
    pub leads_in: usize,
    pub engaged: usize,
    pub positive: usize,
    pub booked: usize,
    pub engagement_rate: f64,
    pub conversion_rate: f64,
}

/// Per-dimension breakdown with data-coverage measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmographicDimensionResult {
    pub dimension: String,
    /// Percent of in-window leads with a usable value for this dimension.
    pub coverage: f64,
    pub total_leads: usize,
    pub leads_with_data: usize,
    pub categories: Vec<FirmographicCategory>,
}

/// Full firmographic insights payload for one query window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmographicInsightsData {
    pub total_leads: usize,
    pub dimensions: Vec<FirmographicDimensionResult>,
}
