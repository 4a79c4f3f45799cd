pub mod commands;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::commands::AppState;
use crate::error::AppResult;
use crate::services::settings_service::SettingsService;

/// Loads settings, installs logging and connects to the configured backend.
pub fn bootstrap() -> AppResult<AppState> {
    let settings_service = Arc::new(SettingsService::new());
    let settings = settings_service.get()?;

    crate::utils::logger::init_logging(&settings)?;
    tracing::info!(
        target: "app::bootstrap",
        api_base_url = %settings.api_base_url,
        config_path = ?settings_service.config_path(),
        "timetable repair ready"
    );

    AppState::new(settings_service)
}
