//! Cache-backed aggregation operations.
//!
//! The four public operations share one stale-while-revalidate path:
//!
//! 1. Fresh cache hit: serve as-is.
//! 2. Stale hit: serve immediately, kick off a background refresh. A late
//!    refresh simply overwrites the cache entry; the write is idempotent.
//! 3. Miss: fetch the window (fan-out, concurrent), aggregate, cache, serve.
//! 4. Fetch failure: serve whatever the cache still holds, expired included,
//!    marked stale. Error out only when there is nothing at all to show.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::aggregate::campaigns::{aggregate_campaign_stats, paginate_campaign_stats};
use crate::aggregate::firmographics::aggregate_firmographics;
use crate::aggregate::funnel::aggregate_funnel;
use crate::aggregate::opportunities::{
    aggregate_opportunities_unfiltered, aggregate_opportunities_windowed,
};
use crate::cache::{cache_key, QueryCache};
use crate::error::AnalyticsError;
use crate::latency;
use crate::store::{StoreClient, StoreError};
use crate::types::{
    CampaignStat, CampaignStatsPage, DateWindow, FirmographicInsightsData, FunnelStage,
    OpportunityStageRollup,
};

/// A payload plus its cache provenance. `is_stale` tells the presentation
/// layer the numbers are being refreshed behind the scenes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cached<T> {
    pub data: T,
    pub is_stale: bool,
}

#[derive(Clone)]
pub struct AnalyticsService {
    store: StoreClient,
    cache: Arc<QueryCache>,
}

impl AnalyticsService {
    pub fn new(store: StoreClient) -> Self {
        Self {
            store,
            cache: Arc::new(QueryCache::new()),
        }
    }

    /// Shared-cache constructor, for callers that own the cache lifecycle.
    pub fn with_cache(store: StoreClient, cache: Arc<QueryCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn latency_snapshot(&self) -> latency::LatencySnapshot {
        latency::get_snapshot()
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Per-campaign stats table for one window, paginated.
    ///
    /// The cache holds the full sorted list; pagination is a pure slice on
    /// top, so page flips never refetch.
    pub async fn get_campaign_stats(
        &self,
        window: DateWindow,
        client: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Cached<CampaignStatsPage>, AnalyticsError> {
        let key = cache_key(
            "campaign_stats",
            &[
                ("start", window.start.into()),
                ("end", window.end.into()),
                ("client", client.into()),
            ],
        );
        let store = self.store.clone();
        let client_owned = client.map(str::to_string);
        let stats: Cached<Vec<CampaignStat>> = self
            .serve_cached("campaign_stats", key, move || async move {
                let (sends, replies, meetings, metadata) = tokio::try_join!(
                    store.fetch_campaign_sends(&window, client_owned.as_deref()),
                    store.fetch_replies(&window, client_owned.as_deref()),
                    store.fetch_meetings(&window, client_owned.as_deref()),
                    store.fetch_campaign_metadata(client_owned.as_deref()),
                )?;
                Ok(aggregate_campaign_stats(
                    &sends, &replies, &meetings, &metadata,
                ))
            })
            .await?;

        Ok(Cached {
            data: paginate_campaign_stats(stats.data, page, page_size),
            is_stale: stats.is_stale,
        })
    }

    /// Ordered funnel stage sequence for one window. `month`/`year` select
    /// the manual forecast/actuals row whose non-zero entries override
    /// computed values.
    pub async fn get_funnel_stages(
        &self,
        window: DateWindow,
        month: u32,
        year: i32,
        client: Option<&str>,
    ) -> Result<Cached<Vec<FunnelStage>>, AnalyticsError> {
        let key = cache_key(
            "funnel",
            &[
                ("start", window.start.into()),
                ("end", window.end.into()),
                ("month", month.into()),
                ("year", year.into()),
                ("client", client.into()),
            ],
        );
        let store = self.store.clone();
        let client_owned = client.map(str::to_string);
        self.serve_cached("funnel", key, move || async move {
            let (sends, replies, meetings, engaged, overrides) = tokio::try_join!(
                store.fetch_campaign_sends(&window, client_owned.as_deref()),
                store.fetch_replies(&window, client_owned.as_deref()),
                store.fetch_meetings(&window, client_owned.as_deref()),
                store.fetch_engaged_leads(&window, client_owned.as_deref()),
                store.fetch_forecast_override(client_owned.as_deref(), month, year),
            )?;
            Ok(aggregate_funnel(
                &sends,
                &replies,
                &meetings,
                &engaged,
                overrides.as_ref(),
            ))
        })
        .await
    }

    /// Dollar-valued stage rollups. Without a window this is the all-time
    /// board grouped by stored stage; with a window it reconciles against
    /// lead progression so each lead counts exactly once.
    pub async fn get_opportunity_stages(
        &self,
        window: Option<DateWindow>,
        client: Option<&str>,
    ) -> Result<Cached<Vec<OpportunityStageRollup>>, AnalyticsError> {
        let key = cache_key(
            "opportunity_stages",
            &[
                ("start", window.map(|w| w.start).into()),
                ("end", window.map(|w| w.end).into()),
                ("client", client.into()),
            ],
        );
        let store = self.store.clone();
        let client_owned = client.map(str::to_string);
        self.serve_cached("opportunity_stages", key, move || async move {
            match window {
                None => {
                    let opps = store
                        .fetch_opportunities(None, client_owned.as_deref())
                        .await?;
                    Ok(aggregate_opportunities_unfiltered(&opps))
                }
                Some(window) => {
                    let (opps, engaged, meetings) = tokio::try_join!(
                        store.fetch_opportunities(Some(&window), client_owned.as_deref()),
                        store.fetch_engaged_leads(&window, client_owned.as_deref()),
                        store.fetch_meetings(&window, client_owned.as_deref()),
                    )?;
                    Ok(aggregate_opportunities_windowed(&opps, &engaged, &meetings))
                }
            }
        })
        .await
    }

    /// Firmographic dimension breakdowns for the leads added in one window,
    /// optionally narrowed to a single campaign.
    pub async fn get_firmographic_insights(
        &self,
        window: DateWindow,
        client: Option<&str>,
        campaign: Option<&str>,
    ) -> Result<Cached<FirmographicInsightsData>, AnalyticsError> {
        let key = cache_key(
            "firmographics",
            &[
                ("start", window.start.into()),
                ("end", window.end.into()),
                ("client", client.into()),
                ("campaign", campaign.into()),
            ],
        );
        let store = self.store.clone();
        let client_owned = client.map(str::to_string);
        let campaign_owned = campaign.map(str::to_string);
        self.serve_cached("firmographics", key, move || async move {
            let (mut leads, replies, meetings) = tokio::try_join!(
                store.fetch_leads(&window, client_owned.as_deref()),
                store.fetch_replies(&window, client_owned.as_deref()),
                store.fetch_meetings(&window, client_owned.as_deref()),
            )?;
            // Campaign narrowing happens in memory; the store has no
            // campaign filter on the leads table.
            if let Some(campaign) = campaign_owned.as_deref() {
                leads.retain(|lead| lead.campaign_id.as_deref() == Some(campaign));
            }
            Ok(aggregate_firmographics(
                &leads,
                &replies,
                &meetings,
                Utc::now().year(),
            ))
        })
        .await
    }

    // ========================================================================
    // Stale-while-revalidate plumbing
    // ========================================================================

    async fn serve_cached<T, F, Fut>(
        &self,
        operation: &'static str,
        key: String,
        compute: F,
    ) -> Result<Cached<T>, AnalyticsError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, StoreError>> + Send,
    {
        if let Some(hit) = self.cache.get::<T>(&key) {
            if !hit.is_stale {
                return Ok(Cached {
                    data: hit.data,
                    is_stale: false,
                });
            }
            // Serve stale now, refresh behind the scenes. The refresh is a
            // plain overwrite, so a concurrent foreground miss racing it is
            // harmless.
            latency::record_stale_serve(operation);
            let cache = Arc::clone(&self.cache);
            tokio::spawn(async move {
                match compute().await {
                    Ok(data) => cache.set(&key, &data),
                    Err(e) => {
                        log::warn!("background refresh of {} failed: {}", key, e);
                    }
                }
            });
            return Ok(Cached {
                data: hit.data,
                is_stale: true,
            });
        }

        let started = Instant::now();
        match compute().await {
            Ok(data) => {
                latency::record_latency(operation, started.elapsed().as_millis());
                self.cache.set(&key, &data);
                Ok(Cached {
                    data,
                    is_stale: false,
                })
            }
            Err(e) => {
                // Degrade path: any cached copy beats an empty screen.
                if let Some(hit) = self.cache.peek::<T>(&key) {
                    log::warn!("{} fetch failed, serving last known data: {}", operation, e);
                    latency::record_stale_serve(operation);
                    return Ok(Cached {
                        data: hit.data,
                        is_stale: true,
                    });
                }
                Err(AnalyticsError::from(e))
            }
        }
    }
}
