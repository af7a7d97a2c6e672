//! Error types at the presentation boundary.
//!
//! Inside the crate, store failures are the typed [`crate::store::StoreError`].
//! Aggregation itself never fails: missing tables become empty inputs and
//! malformed rows are skipped. What crosses to the presentation layer is a
//! single serializable error payload classified by retryability, so the UI
//! can decide between "try again" and "check your configuration".

use serde::Serialize;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
}

/// Serializable error for the presentation layer.
///
/// The core performs no automatic retry; `can_retry` tells the caller
/// whether a manual user-triggered refetch is worth offering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
}

impl AnalyticsError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: ErrorType::Retryable,
            can_retry: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: ErrorType::NonRetryable,
            can_retry: false,
        }
    }
}

impl std::fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<StoreError> for AnalyticsError {
    fn from(err: StoreError) -> Self {
        if err.is_retryable() {
            Self::retryable(err.to_string())
        } else {
            Self::non_retryable(err.to_string())
        }
    }
}
