//! Aggregation core for the outbound campaign analytics dashboard.
//!
//! Raw per-row event tables (campaign sends, replies, meetings, engaged-lead
//! stage flags, opportunities) are fetched from the hosted row store and
//! turned into funnel/pipeline stage metrics, campaign rollups, and
//! firmographic dimension breakdowns. A stale-while-revalidate query cache
//! sits in front of all four public operations.
//!
//! The presentation layer (charts, tables, chat) is an external consumer of
//! [`service::AnalyticsService`] and is not part of this crate.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
mod latency;
pub mod service;
pub mod stages;
pub mod store;
pub mod truthy;
pub mod types;

pub use cache::{cache_key, KeyParam, QueryCache};
pub use error::AnalyticsError;
pub use latency::{LatencySnapshot, OperationRollup};
pub use service::{AnalyticsService, Cached};
pub use stages::{deepest_stage, PipelineStage};
pub use types::DateWindow;
