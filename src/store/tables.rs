//! Typed per-table fetchers.
//!
//! Each fetcher builds the filter set for one logical table and pulls the
//! full window through the paginated [`StoreClient::fetch_all_rows`] loop.
//! Tables filter on different timestamp columns; date-typed columns use an
//! inclusive gte/lte pair, timestamp-typed columns use gte midnight / lt
//! next-day midnight so the whole end day is included.

use chrono::Days;

use super::{StoreClient, StoreError};
use crate::types::{
    CampaignMetadataRecord, CampaignSendRecord, DateWindow, EngagedLeadRecord,
    ForecastOverrideRecord, LeadRecord, MeetingRecord, OpportunityRecord, ReplyRecord,
};

fn eq(column: &str, value: &str) -> (String, String) {
    (column.to_string(), format!("eq.{}", value))
}

fn date_window(column: &str, window: &DateWindow) -> [(String, String); 2] {
    [
        (column.to_string(), format!("gte.{}", window.start)),
        (column.to_string(), format!("lte.{}", window.end)),
    ]
}

fn timestamp_window(column: &str, window: &DateWindow) -> [(String, String); 2] {
    let end_exclusive = window
        .end
        .checked_add_days(Days::new(1))
        .unwrap_or(window.end);
    [
        (
            column.to_string(),
            format!("gte.{}T00:00:00Z", window.start),
        ),
        (column.to_string(), format!("lt.{}T00:00:00Z", end_exclusive)),
    ]
}

fn with_client(mut filters: Vec<(String, String)>, client: Option<&str>) -> Vec<(String, String)> {
    if let Some(client) = client {
        filters.push(eq("client", client));
    }
    filters
}

impl StoreClient {
    pub async fn fetch_campaign_sends(
        &self,
        window: &DateWindow,
        client: Option<&str>,
    ) -> Result<Vec<CampaignSendRecord>, StoreError> {
        let filters = with_client(date_window("date", window).to_vec(), client);
        self.fetch_all_rows("campaign_send_log", &filters).await
    }

    pub async fn fetch_replies(
        &self,
        window: &DateWindow,
        client: Option<&str>,
    ) -> Result<Vec<ReplyRecord>, StoreError> {
        let filters = with_client(timestamp_window("received_at", window).to_vec(), client);
        self.fetch_all_rows("replies", &filters).await
    }

    pub async fn fetch_meetings(
        &self,
        window: &DateWindow,
        client: Option<&str>,
    ) -> Result<Vec<MeetingRecord>, StoreError> {
        let filters = with_client(timestamp_window("created_at", window).to_vec(), client);
        self.fetch_all_rows("meetings_booked", &filters).await
    }

    pub async fn fetch_engaged_leads(
        &self,
        window: &DateWindow,
        client: Option<&str>,
    ) -> Result<Vec<EngagedLeadRecord>, StoreError> {
        let filters = with_client(date_window("date_created", window).to_vec(), client);
        self.fetch_all_rows("engaged_leads", &filters).await
    }

    /// Opportunities support an unfiltered mode (no window) for the all-time
    /// board view.
    pub async fn fetch_opportunities(
        &self,
        window: Option<&DateWindow>,
        client: Option<&str>,
    ) -> Result<Vec<OpportunityRecord>, StoreError> {
        let base = match window {
            Some(window) => timestamp_window("created_at", window).to_vec(),
            None => Vec::new(),
        };
        let filters = with_client(base, client);
        self.fetch_all_rows("opportunities", &filters).await
    }

    pub async fn fetch_campaign_metadata(
        &self,
        client: Option<&str>,
    ) -> Result<Vec<CampaignMetadataRecord>, StoreError> {
        let filters = with_client(Vec::new(), client);
        self.fetch_all_rows("campaign_metadata", &filters).await
    }

    pub async fn fetch_leads(
        &self,
        window: &DateWindow,
        client: Option<&str>,
    ) -> Result<Vec<LeadRecord>, StoreError> {
        let filters = with_client(date_window("date_added", window).to_vec(), client);
        self.fetch_all_rows("leads", &filters).await
    }

    /// Manual forecast/actuals override row for one display month. Missing
    /// table or no row both mean "no override".
    pub async fn fetch_forecast_override(
        &self,
        client: Option<&str>,
        month: u32,
        year: i32,
    ) -> Result<Option<ForecastOverrideRecord>, StoreError> {
        let mut filters = vec![
            eq("month", &month.to_string()),
            eq("year", &year.to_string()),
        ];
        filters = with_client(filters, client);
        let rows: Vec<ForecastOverrideRecord> =
            self.fetch_all_rows("forecast_overrides", &filters).await?;
        Ok(rows.into_iter().next())
    }
}
