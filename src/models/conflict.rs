use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::day::day_name;
use crate::models::slot::{LessonSlot, RecordId, SlotPlacement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    TeacherDoubleBooking,
    ClassDoubleBooking,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::TeacherDoubleBooking => "teacher-double-booking",
            ConflictKind::ClassDoubleBooking => "class-double-booking",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two slots colliding on the same teacher or class at one grid cell.
///
/// `slot_a` is the slot seen first in scan order, `slot_b` the later one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub kind: ConflictKind,
    pub slot_a: LessonSlot,
    pub slot_b: LessonSlot,
    pub placement: SlotPlacement,
}

impl Conflict {
    pub fn slot_ids(&self) -> (&RecordId, &RecordId) {
        (&self.slot_a.id, &self.slot_b.id)
    }

    pub fn describe(&self) -> String {
        let day = day_name(self.placement.day);
        let period = self.placement.period_number;
        match self.kind {
            ConflictKind::TeacherDoubleBooking => format!(
                "Teacher {} is double-booked on {day} period {period} ({} {} and {} {})",
                display_or_id(&self.slot_a.teacher.name, &self.slot_a.teacher.id),
                self.slot_a.class.label(),
                self.slot_a.subject.name,
                self.slot_b.class.label(),
                self.slot_b.subject.name,
            ),
            ConflictKind::ClassDoubleBooking => format!(
                "Class {} has two lessons on {day} period {period} ({} with {} and {} with {})",
                self.slot_a.class.label(),
                self.slot_a.subject.name,
                display_or_id(&self.slot_a.teacher.name, &self.slot_a.teacher.id),
                self.slot_b.subject.name,
                display_or_id(&self.slot_b.teacher.name, &self.slot_b.teacher.id),
            ),
        }
    }
}

fn display_or_id(name: &str, id: &RecordId) -> String {
    if name.trim().is_empty() {
        format!("#{id}")
    } else {
        name.to_string()
    }
}

/// Flattened conflict row for report views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictView {
    pub kind: ConflictKind,
    pub slot_a_id: RecordId,
    pub slot_b_id: RecordId,
    pub day: &'static str,
    pub period_number: u32,
    pub message: String,
}

impl From<&Conflict> for ConflictView {
    fn from(conflict: &Conflict) -> Self {
        Self {
            kind: conflict.kind,
            slot_a_id: conflict.slot_a.id.clone(),
            slot_b_id: conflict.slot_b.id.clone(),
            day: day_name(conflict.placement.day),
            period_number: conflict.placement.period_number,
            message: conflict.describe(),
        }
    }
}
