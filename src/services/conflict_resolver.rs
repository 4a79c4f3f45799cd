use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, StoreErrorCode};
use crate::models::conflict::{Conflict, ConflictKind};
use crate::models::resolution::{Relocation, RepairPolicy, RunResult, RunStatus};
use crate::models::schedule::ScheduleConfig;
use crate::models::settings::{AppSettings, DEFAULT_HTTP_TIMEOUT_MS};
use crate::models::slot::{LessonSlot, RecordId};
use crate::services::availability_finder::find_slot_for_conflict;
use crate::services::slot_store::SlotStore;
use crate::services::timetable_gateway::{SlotUpdate, TimetableGateway};
use crate::utils::cancellation::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Upper bound for each gateway call made during a run.
    pub call_timeout: StdDuration,
    pub policy: RepairPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            call_timeout: StdDuration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            policy: RepairPolicy::default(),
        }
    }
}

impl RunOptions {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            call_timeout: settings.http_timeout(),
            policy: settings.repair_policy,
        }
    }

    pub fn with_policy(mut self, policy: RepairPolicy) -> Self {
        self.policy = policy;
        self
    }
}

type UnfixableKey = (ConflictKind, RecordId);

/// Greedy repair loop: detect, move the later slot of one conflict to the
/// first free cell, persist, refetch, repeat.
pub struct ConflictResolver {
    gateway: Arc<dyn TimetableGateway>,
    options: RunOptions,
}

impl ConflictResolver {
    pub fn new(gateway: Arc<dyn TimetableGateway>, options: RunOptions) -> Self {
        Self { gateway, options }
    }

    /// Runs until the slot set is conflict-free, the attempt budget is spent,
    /// the caller cancels, or (under `SkipUnfixable`) nothing is left to try.
    ///
    /// A failed or timed-out gateway call aborts the run with
    /// `AppError::ResolutionAborted`; the slot set is never reused after a
    /// failed persist.
    pub async fn run(
        &self,
        mut store: SlotStore,
        config: &ScheduleConfig,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> AppResult<RunResult> {
        let run_id = Uuid::new_v4().to_string();
        let mut attempts_used = 0u32;
        let mut relocations: Vec<Relocation> = Vec::new();
        let mut unfixable: HashSet<UnfixableKey> = HashSet::new();

        info!(
            target: "app::resolver",
            %run_id,
            slots = store.len(),
            max_attempts,
            policy = self.options.policy.as_str(),
            "conflict resolution started"
        );

        let status = loop {
            let conflicts = store.conflicts();
            debug!(
                target: "app::resolver",
                %run_id,
                attempts_used,
                conflicts = conflicts.len(),
                "scanned slot set"
            );

            if conflicts.is_empty() {
                break RunStatus::Resolved;
            }
            if cancel.is_cancelled() {
                break RunStatus::Cancelled;
            }
            if attempts_used >= max_attempts {
                break RunStatus::AttemptsExhausted;
            }

            let Some(conflict) = self.select_conflict(&conflicts, &unfixable) else {
                break RunStatus::Stalled;
            };

            let moving = &conflict.slot_b;
            match find_slot_for_conflict(conflict.kind, moving, store.slots(), config) {
                Some(target) => {
                    if !config.contains(target) {
                        let err = AppError::validation_with_details(
                            "relocation target lies outside the configured grid",
                            json!({
                                "slotId": moving.id.as_str(),
                                "target": target.to_string(),
                            }),
                        );
                        return Err(AppError::resolution_aborted(attempts_used, err));
                    }

                    let relocated = moving.relocated_to(target);
                    let refreshed = match self.persist(&relocated, store.academic_year()).await {
                        Ok(slots) => slots,
                        Err(err) => return Err(AppError::resolution_aborted(attempts_used, err)),
                    };
                    store.replace_all(refreshed);

                    info!(
                        target: "app::resolver",
                        %run_id,
                        slot_id = %moving.id,
                        kind = %conflict.kind,
                        from = %conflict.placement,
                        to = %target,
                        "relocated slot"
                    );
                    relocations.push(Relocation {
                        slot_id: moving.id.clone(),
                        kind: conflict.kind,
                        from: conflict.placement,
                        to: target,
                    });
                    unfixable.clear();
                }
                None => {
                    warn!(
                        target: "app::resolver",
                        %run_id,
                        slot_id = %moving.id,
                        kind = %conflict.kind,
                        at = %conflict.placement,
                        "no free cell for conflicting slot"
                    );
                    unfixable.insert((conflict.kind, moving.id.clone()));
                }
            }

            attempts_used += 1;
        };

        let remaining_conflicts = store.conflicts();
        info!(
            target: "app::resolver",
            %run_id,
            status = status.as_str(),
            attempts_used,
            relocations = relocations.len(),
            remaining = remaining_conflicts.len(),
            "conflict resolution finished"
        );

        Ok(RunResult {
            status,
            attempts_used,
            relocations,
            remaining_conflicts,
            slots: store.into_slots(),
        })
    }

    fn select_conflict<'a>(
        &self,
        conflicts: &'a [Conflict],
        unfixable: &HashSet<UnfixableKey>,
    ) -> Option<&'a Conflict> {
        match self.options.policy {
            RepairPolicy::FirstConflict => conflicts.first(),
            RepairPolicy::SkipUnfixable => conflicts
                .iter()
                .find(|conflict| !unfixable.contains(&(conflict.kind, conflict.slot_b.id.clone()))),
        }
    }

    async fn persist(
        &self,
        relocated: &LessonSlot,
        academic_year: Option<&str>,
    ) -> AppResult<Vec<LessonSlot>> {
        let update = SlotUpdate::from_slot(relocated)?;
        self.with_timeout("update_slot", self.gateway.update_slot(&update))
            .await?;
        self.with_timeout("list_slots", self.gateway.list_slots(academic_year))
            .await
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let limit = self.options.call_timeout;
        match timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                Err(AppError::store_with_details(
                    StoreErrorCode::HttpTimeout,
                    format!("{operation} timed out after {timeout_ms} ms"),
                    None,
                    Some(json!({ "operation": operation, "timeoutMs": timeout_ms })),
                ))
            }
        }
    }
}
