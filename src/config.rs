//! Configuration stored in ~/.funnelboard/config.json
//!
//! Accepts both the current field names and the legacy dashboard format
//! (`supabaseUrl`/`supabaseKey`) for backwards compatibility.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the hosted row store.
    #[serde(alias = "supabaseUrl")]
    pub store_url: String,
    /// API key sent as both `apikey` header and bearer token.
    #[serde(alias = "supabaseKey")]
    pub store_api_key: String,
    /// Single-page row ceiling the store enforces. Fetchers paginate
    /// defensively past it.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_page_size() -> usize {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

/// Path to the config file.
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".funnelboard")
        .join("config.json")
}

/// Load configuration from the default location.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &std::path::Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
