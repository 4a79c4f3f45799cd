use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::models::day::serde_days;
use crate::models::slot::SlotPlacement;

/// School profile as served by the profile endpoint. Both fields may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolProfile {
    #[serde(default)]
    pub working_days: Vec<String>,
    #[serde(default)]
    pub total_periods_per_day: Option<u32>,
}

/// The grid the resolver searches: ordered working days × periods `1..=period_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    #[serde(with = "serde_days")]
    working_days: Vec<Weekday>,
    period_count: u32,
}

impl ScheduleConfig {
    /// Callers go through `schedule_utils::resolve_schedule_config` or
    /// `schedule_utils::schedule_config`, which validate the inputs.
    pub(crate) fn from_parts(working_days: Vec<Weekday>, period_count: u32) -> Self {
        Self {
            working_days,
            period_count,
        }
    }

    pub fn working_days(&self) -> &[Weekday] {
        &self.working_days
    }

    pub fn period_count(&self) -> u32 {
        self.period_count
    }

    pub fn contains(&self, placement: SlotPlacement) -> bool {
        self.working_days.contains(&placement.day)
            && (1..=self.period_count).contains(&placement.period_number)
    }
}
