use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::resolution::{RepairPolicy, RunResult};
use crate::models::schedule::ScheduleConfig;
use crate::models::settings::AppSettings;
use crate::services::conflict_resolver::{ConflictResolver, RunOptions};
use crate::services::result_reporter::{conflict_report, ConflictReport};
use crate::services::schedule_utils::resolve_schedule_config;
use crate::services::slot_store::SlotStore;
use crate::services::timetable_gateway::TimetableGateway;
use crate::utils::cancellation::CancellationToken;

/// Per-run overrides; anything left empty falls back to settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRequest {
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub policy: Option<RepairPolicy>,
}

/// Wires the gateway, the resolver and the reporter together for one school.
pub struct RepairService {
    gateway: Arc<dyn TimetableGateway>,
    settings: AppSettings,
}

impl RepairService {
    pub fn new(gateway: Arc<dyn TimetableGateway>, settings: AppSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Fetches the profile and the year's slots, then builds the grid.
    pub async fn load(&self, academic_year: Option<&str>) -> AppResult<(SlotStore, ScheduleConfig)> {
        let profile = self.gateway.school_profile().await?;
        let slots = self.gateway.list_slots(academic_year).await?;
        let store = SlotStore::new(academic_year.map(str::to_string), slots);
        let config = resolve_schedule_config(profile.as_ref(), store.slots())?;

        debug!(
            target: "app::repair",
            academic_year = ?academic_year,
            slots = store.len(),
            has_profile = profile.is_some(),
            "loaded timetable"
        );
        Ok((store, config))
    }

    /// The single entry point behind both "Auto-Fix Conflicts" and the
    /// report view's fix action.
    pub async fn auto_fix(
        &self,
        request: RepairRequest,
        cancel: &CancellationToken,
    ) -> AppResult<RunResult> {
        let academic_year = self.academic_year(request.academic_year.as_deref());
        let max_attempts =
            ensure_budget(request.max_attempts.unwrap_or(self.settings.max_attempts))?;
        let options = RunOptions::from_settings(&self.settings)
            .with_policy(request.policy.unwrap_or(self.settings.repair_policy));

        let (store, config) = self.load(academic_year.as_deref()).await?;
        info!(
            target: "app::repair",
            academic_year = ?academic_year,
            working_days = config.working_days().len(),
            period_count = config.period_count(),
            max_attempts,
            "auto-fix requested"
        );

        ConflictResolver::new(Arc::clone(&self.gateway), options)
            .run(store, &config, max_attempts, cancel)
            .await
    }

    /// Current conflicts without touching anything.
    pub async fn list_conflicts(&self, academic_year: Option<&str>) -> AppResult<ConflictReport> {
        let academic_year = self.academic_year(academic_year);
        let slots = self.gateway.list_slots(academic_year.as_deref()).await?;
        let store = SlotStore::new(academic_year.clone(), slots);
        let conflicts = store.conflicts();
        Ok(conflict_report(academic_year.as_deref(), &conflicts))
    }

    fn academic_year(&self, requested: Option<&str>) -> Option<String> {
        requested
            .map(str::trim)
            .filter(|year| !year.is_empty())
            .map(str::to_string)
            .or_else(|| self.settings.academic_year.clone())
    }
}

const MAX_ATTEMPTS_LIMIT: u32 = 10_000;

fn ensure_budget(max_attempts: u32) -> AppResult<u32> {
    if max_attempts > MAX_ATTEMPTS_LIMIT {
        return Err(AppError::validation(format!(
            "maxAttempts {max_attempts} is too large (limit {MAX_ATTEMPTS_LIMIT})"
        )));
    }
    Ok(max_attempts)
}
