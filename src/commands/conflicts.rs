use serde::Deserialize;
use tracing::info;

use crate::error::AppResult;
use crate::models::resolution::RepairPolicy;
use crate::services::repair_service::RepairRequest;
use crate::services::result_reporter::{summarize, ConflictReport, ResolutionReport};

use super::{AppState, CommandError, CommandResult};

/// Backs both the "Auto-Fix Conflicts" button and the fix action on the
/// conflicts report. Run outcomes, hard failures included, come back as a
/// report; only a rejected payload or a concurrent run is an `Err`.
pub async fn conflicts_auto_fix(
    state: &AppState,
    payload: AutoFixPayload,
) -> CommandResult<ResolutionReport> {
    let request = payload.into_request().map_err(CommandError::from)?;
    let guard = state.begin_run()?;

    let outcome = state.repair().auto_fix(request, guard.token()).await;
    let report = summarize(&outcome);
    info!(
        target: "app::command",
        level = ?report.level,
        attempts_used = ?report.attempts_used,
        "auto-fix finished"
    );
    Ok(report)
}

pub async fn conflicts_list(
    state: &AppState,
    academic_year: Option<String>,
) -> CommandResult<ConflictReport> {
    state
        .repair()
        .list_conflicts(academic_year.as_deref())
        .await
        .map_err(CommandError::from)
}

/// Asks the in-flight run to stop at its next iteration.
pub fn conflicts_cancel(state: &AppState) -> CommandResult<bool> {
    Ok(state.cancel_run())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixPayload {
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub policy: Option<String>,
}

impl AutoFixPayload {
    fn into_request(self) -> AppResult<RepairRequest> {
        let policy = self
            .policy
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::parse::<RepairPolicy>)
            .transpose()?;

        Ok(RepairRequest {
            academic_year: self.academic_year,
            max_attempts: self.max_attempts,
            policy,
        })
    }
}
