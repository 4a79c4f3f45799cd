use chrono::Weekday;
use serde_json::json;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::day::parse_day;
use crate::models::schedule::{SchoolProfile, ScheduleConfig};
use crate::models::slot::{LessonSlot, SlotPlacement};

pub const DEFAULT_WORKING_DAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

pub const DEFAULT_PERIOD_COUNT: u32 = 8;

pub fn schedule_config(working_days: Vec<Weekday>, period_count: u32) -> AppResult<ScheduleConfig> {
    if working_days.is_empty() {
        return Err(AppError::validation("at least one working day is required"));
    }
    if period_count == 0 {
        return Err(AppError::validation("periods per day must be positive"));
    }

    let mut ordered = Vec::with_capacity(working_days.len());
    for day in working_days {
        if !ordered.contains(&day) {
            ordered.push(day);
        }
    }

    Ok(ScheduleConfig::from_parts(ordered, period_count))
}

/// Builds the grid once from the school profile, applying the fallbacks:
/// Monday–Friday when no working days are configured, and the highest
/// observed period number (or 8) when the period count is missing.
pub fn resolve_schedule_config(
    profile: Option<&SchoolProfile>,
    slots: &[LessonSlot],
) -> AppResult<ScheduleConfig> {
    let configured_days = profile
        .map(|profile| parse_working_days(&profile.working_days))
        .transpose()?
        .unwrap_or_default();

    let working_days = if configured_days.is_empty() {
        DEFAULT_WORKING_DAYS.to_vec()
    } else {
        configured_days
    };

    let period_count = profile
        .and_then(|profile| profile.total_periods_per_day)
        .filter(|count| *count > 0)
        .or_else(|| max_period_number(slots))
        .unwrap_or(DEFAULT_PERIOD_COUNT);

    debug!(
        target: "app::schedule",
        working_days = working_days.len(),
        period_count,
        "resolved schedule grid"
    );

    schedule_config(working_days, period_count)
}

pub fn parse_working_days(names: &[String]) -> AppResult<Vec<Weekday>> {
    let mut days = Vec::with_capacity(names.len());
    for name in names {
        if name.trim().is_empty() {
            continue;
        }
        let day = parse_day(name).ok_or_else(|| {
            AppError::validation_with_details("unknown working day", json!({ "value": name }))
        })?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(days)
}

pub fn max_period_number(slots: &[LessonSlot]) -> Option<u32> {
    slots
        .iter()
        .filter_map(|slot| slot.period_number)
        .filter(|period| *period > 0)
        .max()
}

/// Grid cells in search order: working days as configured, periods ascending,
/// skipping `exclude_day` entirely.
pub fn grid_cells(
    config: &ScheduleConfig,
    exclude_day: Weekday,
) -> impl Iterator<Item = SlotPlacement> + '_ {
    let period_count = config.period_count();
    config
        .working_days()
        .iter()
        .copied()
        .filter(move |day| *day != exclude_day)
        .flat_map(move |day| {
            (1..=period_count).map(move |period_number| SlotPlacement::new(day, period_number))
        })
}
