use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::resolution::RepairPolicy;
use crate::models::settings::AppSettings;

pub const CONFIG_PATH_ENV: &str = "TIMETABLE_REPAIR_CONFIG";

const ENV_API_BASE_URL: &str = "TIMETABLE_API_BASE_URL";
const ENV_API_TOKEN: &str = "TIMETABLE_API_TOKEN";
const ENV_HTTP_TIMEOUT_MS: &str = "TIMETABLE_HTTP_TIMEOUT_MS";
const ENV_MAX_ATTEMPTS: &str = "TIMETABLE_MAX_ATTEMPTS";
const ENV_REPAIR_POLICY: &str = "TIMETABLE_REPAIR_POLICY";
const ENV_ACADEMIC_YEAR: &str = "TIMETABLE_ACADEMIC_YEAR";
const ENV_LOG_DIR: &str = "TIMETABLE_LOG_DIR";
const ENV_LOG_DIRECTIVES: &str = "RUST_LOG";

/// Loads settings from an optional YAML file plus environment overrides and
/// caches the result.
pub struct SettingsService {
    config_path: Option<PathBuf>,
    cache: RwLock<Option<AppSettings>>,
}

impl SettingsService {
    /// Reads the config path from `TIMETABLE_REPAIR_CONFIG`.
    pub fn new() -> Self {
        let config_path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        Self::with_config_path(config_path)
    }

    pub fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            cache: RwLock::new(None),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn get(&self) -> AppResult<AppSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }
        self.reload()
    }

    /// Drops the cache and reads file and environment again.
    pub fn reload(&self) -> AppResult<AppSettings> {
        let settings = load_settings(self.config_path.as_deref(), |key| std::env::var(key).ok())?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

/// File (when given) → overrides from `lookup` → normalization → validation.
pub fn load_settings<F>(path: Option<&Path>, lookup: F) -> AppResult<AppSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|err| {
                AppError::config(format!("failed to read settings file {}: {err}", path.display()))
            })?;
            debug!(target: "app::settings", path = %path.display(), "loaded settings file");
            if raw.trim().is_empty() {
                AppSettings::default()
            } else {
                serde_yaml::from_str::<AppSettings>(&raw)?
            }
        }
        None => AppSettings::default(),
    };

    let settings = normalize(apply_overrides(settings, lookup)?);
    validate(&settings)?;

    info!(
        target: "app::settings",
        api_base_url = %settings.api_base_url,
        http_timeout_ms = settings.http_timeout_ms,
        max_attempts = settings.max_attempts,
        repair_policy = settings.repair_policy.as_str(),
        academic_year = ?settings.academic_year,
        "settings loaded"
    );
    Ok(settings)
}

pub fn apply_overrides<F>(mut settings: AppSettings, lookup: F) -> AppResult<AppSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(value) = read(ENV_API_BASE_URL) {
        settings.api_base_url = value;
    }
    if let Some(value) = read(ENV_API_TOKEN) {
        settings.api_token = Some(value);
    }
    if let Some(value) = read(ENV_HTTP_TIMEOUT_MS) {
        settings.http_timeout_ms = parse_number(ENV_HTTP_TIMEOUT_MS, &value)?;
    }
    if let Some(value) = read(ENV_MAX_ATTEMPTS) {
        settings.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &value)?;
    }
    if let Some(value) = read(ENV_REPAIR_POLICY) {
        settings.repair_policy = value.parse::<RepairPolicy>()?;
    }
    if let Some(value) = read(ENV_ACADEMIC_YEAR) {
        settings.academic_year = Some(value);
    }
    if let Some(value) = read(ENV_LOG_DIR) {
        settings.log_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = read(ENV_LOG_DIRECTIVES) {
        settings.log_directives = Some(value);
    }

    Ok(settings)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::config(format!("{key} must be a non-negative integer, got `{value}`")))
}

fn normalize(mut settings: AppSettings) -> AppSettings {
    settings.api_base_url = settings.api_base_url.trim().trim_end_matches('/').to_string();
    settings.api_token = blank_to_none(settings.api_token);
    settings.academic_year = blank_to_none(settings.academic_year);
    settings.log_directives = blank_to_none(settings.log_directives);
    settings.log_dir = settings
        .log_dir
        .filter(|dir| !dir.as_os_str().is_empty());
    settings
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|inner| inner.trim().to_string())
        .filter(|inner| !inner.is_empty())
}

fn validate(settings: &AppSettings) -> AppResult<()> {
    if settings.api_base_url.is_empty() {
        return Err(AppError::config("apiBaseUrl must not be empty"));
    }
    if settings.http_timeout_ms == 0 {
        return Err(AppError::config("httpTimeoutMs must be greater than zero"));
    }
    Ok(())
}
