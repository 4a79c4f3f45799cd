use std::collections::HashSet;

use chrono::Weekday;

use crate::models::conflict::ConflictKind;
use crate::models::schedule::ScheduleConfig;
use crate::models::slot::{LessonSlot, RecordId, SlotPlacement};
use crate::services::schedule_utils::grid_cells;

/// First cell (days in configured order, then periods ascending) where the
/// teacher has no lesson in `academic_year`. `exclude_day` is never searched.
///
/// Untagged lessons count as busy in every year, and a `None` year counts
/// every lesson.
pub fn find_slot_for_teacher(
    teacher_id: &RecordId,
    academic_year: Option<&str>,
    exclude_day: Weekday,
    slots: &[LessonSlot],
    config: &ScheduleConfig,
) -> Option<SlotPlacement> {
    let busy = occupied_cells(slots, academic_year, |slot| &slot.teacher.id == teacher_id);
    first_free_cell(&busy, exclude_day, config)
}

/// Same search keyed on the class-section.
pub fn find_slot_for_class(
    class_id: &RecordId,
    academic_year: Option<&str>,
    exclude_day: Weekday,
    slots: &[LessonSlot],
    config: &ScheduleConfig,
) -> Option<SlotPlacement> {
    let busy = occupied_cells(slots, academic_year, |slot| &slot.class.id == class_id);
    first_free_cell(&busy, exclude_day, config)
}

/// Dispatches to the search matching the conflict rule that flagged `slot`.
/// Returns `None` when the slot has no day to exclude.
pub fn find_slot_for_conflict(
    kind: ConflictKind,
    slot: &LessonSlot,
    slots: &[LessonSlot],
    config: &ScheduleConfig,
) -> Option<SlotPlacement> {
    let exclude_day = slot.day?;
    let year = slot.academic_year.as_deref();
    match kind {
        ConflictKind::TeacherDoubleBooking => {
            find_slot_for_teacher(&slot.teacher.id, year, exclude_day, slots, config)
        }
        ConflictKind::ClassDoubleBooking => {
            find_slot_for_class(&slot.class.id, year, exclude_day, slots, config)
        }
    }
}

fn occupied_cells<F>(
    slots: &[LessonSlot],
    academic_year: Option<&str>,
    belongs: F,
) -> HashSet<SlotPlacement>
where
    F: Fn(&LessonSlot) -> bool,
{
    slots
        .iter()
        .filter(|slot| shares_year(slot, academic_year))
        .filter(|slot| belongs(slot))
        .filter_map(LessonSlot::placement)
        .collect()
}

fn shares_year(slot: &LessonSlot, academic_year: Option<&str>) -> bool {
    match (academic_year, slot.academic_year.as_deref()) {
        (Some(year), Some(slot_year)) => year == slot_year,
        _ => true,
    }
}

fn first_free_cell(
    busy: &HashSet<SlotPlacement>,
    exclude_day: Weekday,
    config: &ScheduleConfig,
) -> Option<SlotPlacement> {
    grid_cells(config, exclude_day).find(|cell| !busy.contains(cell))
}
