use std::path::PathBuf;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use crate::models::resolution::RepairPolicy;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub api_base_url: String,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub http_timeout_ms: u64,
    pub max_attempts: u32,
    pub repair_policy: RepairPolicy,
    pub academic_year: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_directives: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            repair_policy: RepairPolicy::default(),
            academic_year: None,
            log_dir: None,
            log_directives: None,
        }
    }
}

impl AppSettings {
    pub fn http_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.http_timeout_ms)
    }
}
