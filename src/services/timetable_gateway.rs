use std::sync::{Mutex, RwLock};
use std::time::Duration as StdDuration;

use chrono::Weekday;
use serde::Serialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{AppError, AppResult, StoreErrorCode};
use crate::models::day::serde_day;
use crate::models::schedule::SchoolProfile;
use crate::models::slot::{LessonSlot, RecordId};

/// Access to the external timetable API: the slot store and the read-only
/// school profile.
#[async_trait::async_trait]
pub trait TimetableGateway: Send + Sync {
    async fn list_slots(&self, academic_year: Option<&str>) -> AppResult<Vec<LessonSlot>>;

    async fn update_slot(&self, update: &SlotUpdate) -> AppResult<LessonSlot>;

    /// `Ok(None)` when the school has no profile configured.
    async fn school_profile(&self) -> AppResult<Option<SchoolProfile>>;
}

/// Full update body for one slot. The backend validates the whole record, so
/// every field is re-sent, not just the new day and period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotUpdate {
    #[serde(skip)]
    pub id: RecordId,
    pub class: RecordId,
    pub subject: RecordId,
    pub teacher: RecordId,
    #[serde(with = "serde_day")]
    pub day: Weekday,
    pub period_number: u32,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    pub is_active: bool,
    pub academic_year: Option<String>,
}

impl SlotUpdate {
    pub fn from_slot(slot: &LessonSlot) -> AppResult<Self> {
        let placement = slot.placement().ok_or_else(|| {
            AppError::validation_with_details(
                "slot has no day or period to persist",
                json!({ "slotId": slot.id.as_str() }),
            )
        })?;

        Ok(Self {
            id: slot.id.clone(),
            class: slot.class.id.clone(),
            subject: slot.subject.id.clone(),
            teacher: slot.teacher.id.clone(),
            day: placement.day,
            period_number: placement.period_number,
            start_time: slot.start_time.clone(),
            end_time: slot.end_time.clone(),
            room_number: slot.room_number.clone(),
            is_active: slot.is_active,
            academic_year: slot.academic_year.clone(),
        })
    }

    fn apply_to(&self, slot: &mut LessonSlot) {
        slot.class.id = self.class.clone();
        slot.subject.id = self.subject.clone();
        slot.teacher.id = self.teacher.clone();
        slot.day = Some(self.day);
        slot.period_number = Some(self.period_number);
        slot.start_time = self.start_time.clone();
        slot.end_time = self.end_time.clone();
        if self.room_number.is_some() {
            slot.room_number = self.room_number.clone();
        }
        slot.is_active = self.is_active;
        slot.academic_year = self.academic_year.clone();
    }
}

/// Gateway over an in-process slot list.
///
/// Records every update it receives. A delay and an update failure can be
/// injected to exercise timeout and abort paths.
#[derive(Debug, Default)]
pub struct InMemoryTimetableGateway {
    slots: RwLock<Vec<LessonSlot>>,
    profile: RwLock<Option<SchoolProfile>>,
    updates: Mutex<Vec<SlotUpdate>>,
    list_calls: Mutex<usize>,
    update_failure: Mutex<Option<(StoreErrorCode, String)>>,
    delay: Mutex<Option<StdDuration>>,
}

impl InMemoryTimetableGateway {
    pub fn new(slots: Vec<LessonSlot>) -> Self {
        Self {
            slots: RwLock::new(slots),
            ..Self::default()
        }
    }

    pub fn with_profile(self, profile: SchoolProfile) -> Self {
        if let Ok(mut guard) = self.profile.write() {
            *guard = Some(profile);
        }
        self
    }

    pub fn with_delay(self, delay: StdDuration) -> Self {
        if let Ok(mut guard) = self.delay.lock() {
            *guard = Some(delay);
        }
        self
    }

    /// Every following `update_slot` call fails with this error.
    pub fn fail_updates(&self, code: StoreErrorCode, message: impl Into<String>) {
        if let Ok(mut guard) = self.update_failure.lock() {
            *guard = Some((code, message.into()));
        }
    }

    pub fn snapshot(&self) -> AppResult<Vec<LessonSlot>> {
        let guard = self
            .slots
            .read()
            .map_err(|_| AppError::other("in-memory slot lock poisoned"))?;
        Ok(guard.clone())
    }

    pub fn recorded_updates(&self) -> AppResult<Vec<SlotUpdate>> {
        let guard = self
            .updates
            .lock()
            .map_err(|_| AppError::other("in-memory update log lock poisoned"))?;
        Ok(guard.clone())
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.lock().map(|guard| *guard).unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        let delay = self.delay.lock().ok().and_then(|guard| *guard);
        if let Some(delay) = delay {
            sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl TimetableGateway for InMemoryTimetableGateway {
    async fn list_slots(&self, academic_year: Option<&str>) -> AppResult<Vec<LessonSlot>> {
        self.simulate_latency().await;

        if let Ok(mut calls) = self.list_calls.lock() {
            *calls += 1;
        }

        let guard = self
            .slots
            .read()
            .map_err(|_| AppError::other("in-memory slot lock poisoned"))?;
        let slots = guard
            .iter()
            .filter(|slot| match academic_year {
                Some(year) => slot
                    .academic_year
                    .as_deref()
                    .map_or(true, |slot_year| slot_year == year),
                None => true,
            })
            .cloned()
            .collect::<Vec<_>>();

        debug!(target: "app::store::memory", count = slots.len(), "listed slots");
        Ok(slots)
    }

    async fn update_slot(&self, update: &SlotUpdate) -> AppResult<LessonSlot> {
        self.simulate_latency().await;

        let failure = self
            .update_failure
            .lock()
            .map_err(|_| AppError::other("in-memory failure lock poisoned"))?
            .clone();
        if let Some((code, message)) = failure {
            return Err(AppError::store_with_details(
                code,
                message,
                None,
                Some(json!({ "slotId": update.id.as_str() })),
            ));
        }

        let updated = {
            let mut guard = self
                .slots
                .write()
                .map_err(|_| AppError::other("in-memory slot lock poisoned"))?;
            let slot = guard
                .iter_mut()
                .find(|slot| slot.id == update.id)
                .ok_or_else(|| {
                    AppError::store_with_details(
                        StoreErrorCode::NotFound,
                        "lesson slot not found",
                        None,
                        Some(json!({ "slotId": update.id.as_str() })),
                    )
                })?;
            update.apply_to(slot);
            slot.clone()
        };

        self.updates
            .lock()
            .map_err(|_| AppError::other("in-memory update log lock poisoned"))?
            .push(update.clone());

        debug!(
            target: "app::store::memory",
            slot_id = %update.id,
            period_number = update.period_number,
            "updated slot"
        );
        Ok(updated)
    }

    async fn school_profile(&self) -> AppResult<Option<SchoolProfile>> {
        let guard = self
            .profile
            .read()
            .map_err(|_| AppError::other("in-memory profile lock poisoned"))?;
        Ok(guard.clone())
    }
}
