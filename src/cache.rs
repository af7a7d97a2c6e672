//! Stale-while-revalidate query cache.
//!
//! A time-keyed store shared by all four aggregation operations. Entries are
//! classified purely by elapsed time since `set` — the backing store sends no
//! invalidation messages:
//!
//! - age ≤ 5 minutes: fresh, served as-is.
//! - 5 < age ≤ 30 minutes: stale, served immediately with `is_stale` set so
//!   the caller triggers a background refresh.
//! - age > 30 minutes: expired, deleted on read.
//!
//! One value per key; concurrent sets overwrite, last write wins. Keys come
//! from [`cache_key`], which sorts parameter names and normalizes dates so
//! semantically identical queries always collide.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Served-without-refresh horizon.
pub const FRESH_TTL_SECS: i64 = 5 * 60;
/// Hard expiry; entries past this die on read.
pub const EXPIRY_TTL_SECS: i64 = 30 * 60;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    captured_at: DateTime<Utc>,
}

/// A cache read that produced data.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub data: T,
    pub is_stale: bool,
}

/// Per-tier entry counts for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
    pub stale: usize,
    pub expired: usize,
}

/// Injectable SWR store. Values are held as JSON so one cache instance
/// serves every aggregator payload type.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: DashMap<String, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a key at the current time.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheHit<T>> {
        self.get_at(key, Utc::now())
    }

    /// Read a key at an explicit `now`. Expired entries are removed; a value
    /// that no longer deserializes to `T` is treated as a miss.
    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<CacheHit<T>> {
        let (value, age_secs) = {
            let entry = self.entries.get(key)?;
            (
                entry.value.clone(),
                (now - entry.captured_at).num_seconds(),
            )
        };

        if age_secs > EXPIRY_TTL_SECS {
            self.entries.remove(key);
            return None;
        }

        let data = match serde_json::from_value(value) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("cache entry {} no longer deserializes: {}", key, e);
                self.entries.remove(key);
                return None;
            }
        };

        Some(CacheHit {
            data,
            is_stale: age_secs > FRESH_TTL_SECS,
        })
    }

    /// Read a key ignoring the expiry tier. Used only as a degrade path when
    /// a fresh fetch fails: an expired-but-not-yet-purged entry beats an
    /// empty screen. Always reported stale.
    pub fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<CacheHit<T>> {
        let entry = self.entries.get(key)?;
        let data = serde_json::from_value(entry.value.clone()).ok()?;
        Some(CacheHit {
            data,
            is_stale: true,
        })
    }

    /// Store a value at the current time.
    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        self.set_at(key, data, Utc::now());
    }

    /// Store a value with an explicit capture timestamp.
    pub fn set_at<T: Serialize>(&self, key: &str, data: &T, now: DateTime<Utc>) {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("cache set {} skipped, value not serializable: {}", key, e);
                return;
            }
        };
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                captured_at: now,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let mut stats = CacheStats {
            entries: 0,
            fresh: 0,
            stale: 0,
            expired: 0,
        };
        for entry in self.entries.iter() {
            stats.entries += 1;
            let age_secs = (now - entry.captured_at).num_seconds();
            if age_secs <= FRESH_TTL_SECS {
                stats.fresh += 1;
            } else if age_secs <= EXPIRY_TTL_SECS {
                stats.stale += 1;
            } else {
                stats.expired += 1;
            }
        }
        stats
    }
}

// ============================================================================
// Key building
// ============================================================================

/// One cache-key parameter value. Dates collapse to day granularity so two
/// `DateTime` representations of the same query day produce the same key.
#[derive(Debug, Clone)]
pub enum KeyParam {
    Str(String),
    Int(i64),
    Date(NaiveDate),
    None,
}

impl KeyParam {
    fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::None => "none".to_string(),
        }
    }
}

impl From<&str> for KeyParam {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for KeyParam {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<usize> for KeyParam {
    fn from(i: usize) -> Self {
        Self::Int(i as i64)
    }
}

impl From<u32> for KeyParam {
    fn from(i: u32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<i32> for KeyParam {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<NaiveDate> for KeyParam {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<KeyParam>> From<Option<T>> for KeyParam {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::None,
        }
    }
}

/// Deterministic key for an (operation, parameters) pair.
///
/// Parameter names are sorted lexicographically before serialization, so the
/// same logical query builds the same key regardless of argument order at
/// the call site.
pub fn cache_key(prefix: &str, params: &[(&str, KeyParam)]) -> String {
    let mut sorted: Vec<&(&str, KeyParam)> = params.iter().collect();
    sorted.sort_by_key(|(name, _)| *name);

    let mut key = String::from(prefix);
    for (i, (name, value)) in sorted.iter().enumerate() {
        key.push(if i == 0 { ':' } else { '|' });
        key.push_str(name);
        key.push('=');
        key.push_str(&value.render());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn round_trip_is_fresh() {
        let cache = QueryCache::new();
        cache.set("k", &vec![1, 2, 3]);
        let hit = cache.get::<Vec<i32>>("k").expect("hit");
        assert_eq!(hit.data, vec![1, 2, 3]);
        assert!(!hit.is_stale);
    }

    #[test]
    fn tiers_advance_with_the_clock() {
        let cache = QueryCache::new();
        let t0 = Utc::now();
        cache.set_at("k", &"payload", t0);

        // Just inside the fresh horizon.
        let hit = cache
            .get_at::<String>("k", t0 + Duration::seconds(FRESH_TTL_SECS))
            .expect("fresh hit");
        assert!(!hit.is_stale);

        // Past fresh, inside expiry: stale.
        let hit = cache
            .get_at::<String>("k", t0 + Duration::seconds(FRESH_TTL_SECS + 1))
            .expect("stale hit");
        assert!(hit.is_stale);
        assert_eq!(hit.data, "payload");

        // Past expiry: gone, and deleted rather than merely hidden.
        assert!(cache
            .get_at::<String>("k", t0 + Duration::seconds(EXPIRY_TTL_SECS + 1))
            .is_none());
        assert!(cache.get_at::<String>("k", t0).is_none());
    }

    #[test]
    fn peek_survives_expiry_and_reports_stale() {
        let cache = QueryCache::new();
        let t0 = Utc::now() - Duration::hours(2);
        cache.set_at("k", &42, t0);
        let hit = cache.peek::<i32>("k").expect("peek hit");
        assert!(hit.is_stale);
        assert_eq!(hit.data, 42);
    }

    #[test]
    fn last_write_wins() {
        let cache = QueryCache::new();
        cache.set("k", &1);
        cache.set("k", &2);
        assert_eq!(cache.get::<i32>("k").unwrap().data, 2);
    }

    #[test]
    fn invalidate_prefix_only_touches_matching_keys() {
        let cache = QueryCache::new();
        cache.set("campaign_stats:client=acme", &1);
        cache.set("campaign_stats:client=globex", &2);
        cache.set("funnel:client=acme", &3);

        cache.invalidate_prefix("campaign_stats");
        assert!(cache.get::<i32>("campaign_stats:client=acme").is_none());
        assert!(cache.get::<i32>("campaign_stats:client=globex").is_none());
        assert_eq!(cache.get::<i32>("funnel:client=acme").unwrap().data, 3);
    }

    #[test]
    fn type_mismatch_is_a_miss_not_an_error() {
        let cache = QueryCache::new();
        cache.set("k", &"not a number");
        assert!(cache.get::<i64>("k").is_none());
    }

    #[test]
    fn cache_key_is_order_independent() {
        let a = cache_key("p", &[("a", 1i64.into()), ("b", 2i64.into())]);
        let b = cache_key("p", &[("b", 2i64.into()), ("a", 1i64.into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_normalizes_dates_to_day_granularity() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let key = cache_key("funnel", &[("start", d.into()), ("client", "acme".into())]);
        assert_eq!(key, "funnel:client=acme|start=2026-03-05");
    }

    #[test]
    fn cache_key_renders_absent_params_explicitly() {
        let none: Option<&str> = None;
        let with_none = cache_key("ops", &[("client", none.into())]);
        let with_some = cache_key("ops", &[("client", Some("acme").into())]);
        assert_ne!(with_none, with_some);
        assert_eq!(with_none, "ops:client=none");
    }

    #[test]
    fn stats_counts_tiers() {
        let cache = QueryCache::new();
        let now = Utc::now();
        cache.set_at("fresh", &1, now);
        cache.set_at("stale", &2, now - Duration::seconds(FRESH_TTL_SECS + 10));
        cache.set_at("dead", &3, now - Duration::seconds(EXPIRY_TTL_SECS + 10));

        let stats = cache.stats_at(now);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.expired, 1);
    }
}
