//! In-memory latency rollups for the aggregation operations.
//!
//! Bounded sample window per operation so slow windows and cache misses show
//! up in diagnostics without any persistent storage. Also counts how often
//! an operation was answered from stale cache, which is the main health
//! signal for the refresh path.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Utc};

const MAX_SAMPLES_PER_OPERATION: usize = 256;

/// Soft budget for a cache-miss aggregation (fan-out fetch + compute).
pub const OPERATION_BUDGET_MS: u128 = 5_000;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRollup {
    pub operation: String,
    pub sample_count: usize,
    pub p50_ms: u128,
    pub p95_ms: u128,
    pub max_ms: u128,
    pub budget_violations: u64,
    pub stale_served: u64,
    pub last_recorded_at: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySnapshot {
    pub generated_at: String,
    pub operations: Vec<OperationRollup>,
}

#[derive(Debug, Default)]
struct OperationWindow {
    samples_ms: VecDeque<u128>,
    budget_violations: u64,
    stale_served: u64,
    last_recorded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct LatencyRecorder {
    windows: Mutex<HashMap<String, OperationWindow>>,
}

impl LatencyRecorder {
    fn global() -> &'static Self {
        static RECORDER: OnceLock<LatencyRecorder> = OnceLock::new();
        RECORDER.get_or_init(Self::default)
    }

    fn record_sample(&self, operation: &str, elapsed_ms: u128) {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let window = windows.entry(operation.to_string()).or_default();
        if elapsed_ms > OPERATION_BUDGET_MS {
            window.budget_violations += 1;
        }
        if window.samples_ms.len() >= MAX_SAMPLES_PER_OPERATION {
            window.samples_ms.pop_front();
        }
        window.samples_ms.push_back(elapsed_ms);
        window.last_recorded_at = Some(Utc::now());
    }

    fn record_stale_serve(&self, operation: &str) {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let window = windows.entry(operation.to_string()).or_default();
        window.stale_served += 1;
        if window.last_recorded_at.is_none() {
            window.last_recorded_at = Some(Utc::now());
        }
    }

    fn snapshot(&self) -> LatencySnapshot {
        let windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(_) => {
                return LatencySnapshot {
                    generated_at: Utc::now().to_rfc3339(),
                    operations: Vec::new(),
                }
            }
        };

        let mut operations: Vec<OperationRollup> = windows
            .iter()
            .map(|(operation, window)| {
                let mut values: Vec<u128> = window.samples_ms.iter().copied().collect();
                values.sort_unstable();
                OperationRollup {
                    operation: operation.clone(),
                    sample_count: values.len(),
                    p50_ms: percentile(&values, 50.0).unwrap_or(0),
                    p95_ms: percentile(&values, 95.0).unwrap_or(0),
                    max_ms: values.last().copied().unwrap_or(0),
                    budget_violations: window.budget_violations,
                    stale_served: window.stale_served,
                    last_recorded_at: window.last_recorded_at.map(|dt| dt.to_rfc3339()),
                }
            })
            .collect();

        operations.sort_by(|a, b| b.p95_ms.cmp(&a.p95_ms).then(a.operation.cmp(&b.operation)));

        LatencySnapshot {
            generated_at: Utc::now().to_rfc3339(),
            operations,
        }
    }
}

fn percentile(values: &[u128], p: f64) -> Option<u128> {
    if values.is_empty() {
        return None;
    }
    let n = values.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    Some(values[rank.saturating_sub(1).min(n - 1)])
}

pub fn record_latency(operation: &str, elapsed_ms: u128) {
    LatencyRecorder::global().record_sample(operation, elapsed_ms);
}

pub fn record_stale_serve(operation: &str) {
    LatencyRecorder::global().record_stale_serve(operation);
}

pub fn get_snapshot() -> LatencySnapshot {
    LatencyRecorder::global().snapshot()
}
