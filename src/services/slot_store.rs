use tracing::debug;

use crate::models::conflict::Conflict;
use crate::models::slot::{LessonSlot, RecordId};
use crate::services::conflict_detector::detect_conflicts_in;
use crate::services::schedule_utils;

/// Working copy of one academic year's lesson slots.
///
/// Slots tagged with a different academic year are dropped on the way in;
/// slots without a year tag are kept.
#[derive(Debug, Clone, Default)]
pub struct SlotStore {
    academic_year: Option<String>,
    slots: Vec<LessonSlot>,
}

impl SlotStore {
    pub fn new(academic_year: Option<String>, slots: Vec<LessonSlot>) -> Self {
        let mut store = Self {
            academic_year,
            slots: Vec::new(),
        };
        store.replace_all(slots);
        store
    }

    pub fn academic_year(&self) -> Option<&str> {
        self.academic_year.as_deref()
    }

    pub fn slots(&self) -> &[LessonSlot] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<LessonSlot> {
        self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&LessonSlot> {
        self.slots.iter().find(|slot| &slot.id == id)
    }

    /// Double-bookings in the working set, with untagged slots counted in
    /// the store's year.
    pub fn conflicts(&self) -> Vec<Conflict> {
        detect_conflicts_in(&self.slots, self.academic_year.as_deref())
    }

    pub fn max_period_number(&self) -> Option<u32> {
        schedule_utils::max_period_number(&self.slots)
    }

    /// Swaps in a freshly fetched slot set, keeping the year scope.
    pub fn replace_all(&mut self, slots: Vec<LessonSlot>) {
        let total = slots.len();
        self.slots = match self.academic_year.as_deref() {
            Some(year) => slots
                .into_iter()
                .filter(|slot| {
                    slot.academic_year
                        .as_deref()
                        .map_or(true, |slot_year| slot_year == year)
                })
                .collect(),
            None => slots,
        };

        if self.slots.len() != total {
            debug!(
                target: "app::slot_store",
                academic_year = ?self.academic_year,
                kept = self.slots.len(),
                dropped = total - self.slots.len(),
                "filtered slots from other academic years"
            );
        }
    }
}
