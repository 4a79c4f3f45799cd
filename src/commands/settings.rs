use crate::models::settings::AppSettings;

use super::{AppState, CommandError, CommandResult};

/// Effective settings. The API token is never serialized.
pub fn settings_get(state: &AppState) -> CommandResult<AppSettings> {
    state.settings().get().map_err(CommandError::from)
}
