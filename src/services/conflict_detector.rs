use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::Weekday;

use crate::models::conflict::{Conflict, ConflictKind};
use crate::models::slot::{LessonSlot, RecordId};

/// Scans the slot set for double-bookings.
///
/// Teacher collisions are reported first, then class collisions, each in
/// slot order. Within a rule the first slot seen at a key is `slot_a` for
/// every later slot sharing that key. Slots without a day, a positive
/// period, or the relevant id are skipped.
///
/// Keys include the academic year, so lessons from different years never
/// collide. Untagged slots only collide with other untagged slots; use
/// [`detect_conflicts_in`] when the set was loaded for a known year.
pub fn detect_conflicts(slots: &[LessonSlot]) -> Vec<Conflict> {
    detect_conflicts_in(slots, None)
}

/// Like [`detect_conflicts`], with untagged slots counted in `scope_year`.
pub fn detect_conflicts_in(slots: &[LessonSlot], scope_year: Option<&str>) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    scan_rule(
        slots,
        scope_year,
        ConflictKind::TeacherDoubleBooking,
        teacher_key,
        &mut conflicts,
    );
    scan_rule(
        slots,
        scope_year,
        ConflictKind::ClassDoubleBooking,
        class_key,
        &mut conflicts,
    );
    conflicts
}

pub fn has_conflicts(slots: &[LessonSlot]) -> bool {
    !detect_conflicts(slots).is_empty()
}

fn teacher_key(slot: &LessonSlot) -> &RecordId {
    &slot.teacher.id
}

fn class_key(slot: &LessonSlot) -> &RecordId {
    &slot.class.id
}

type CellKey<'a> = (Option<&'a str>, &'a RecordId, Weekday, u32);

fn scan_rule<'a>(
    slots: &'a [LessonSlot],
    scope_year: Option<&'a str>,
    kind: ConflictKind,
    key_of: fn(&LessonSlot) -> &RecordId,
    conflicts: &mut Vec<Conflict>,
) {
    let mut first_seen: HashMap<CellKey<'a>, &'a LessonSlot> = HashMap::new();

    for slot in slots {
        let Some(placement) = slot.placement() else {
            continue;
        };
        let owner = key_of(slot);
        if owner.is_blank() {
            continue;
        }

        let key = (
            slot.year_in(scope_year),
            owner,
            placement.day,
            placement.period_number,
        );
        match first_seen.entry(key) {
            Entry::Occupied(entry) => conflicts.push(Conflict {
                kind,
                slot_a: (*entry.get()).clone(),
                slot_b: slot.clone(),
                placement,
            }),
            Entry::Vacant(entry) => {
                entry.insert(slot);
            }
        }
    }
}
