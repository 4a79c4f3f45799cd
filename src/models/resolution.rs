use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::conflict::{Conflict, ConflictKind};
use crate::models::slot::{LessonSlot, RecordId, SlotPlacement};

/// Which conflict the resolver works on next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepairPolicy {
    /// Always the first detected conflict, even if it could not be moved last time.
    #[default]
    FirstConflict,
    /// Skip conflicts whose search came back empty until another relocation succeeds.
    SkipUnfixable,
}

impl RepairPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairPolicy::FirstConflict => "firstConflict",
            RepairPolicy::SkipUnfixable => "skipUnfixable",
        }
    }
}

impl FromStr for RepairPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "firstconflict" => Ok(RepairPolicy::FirstConflict),
            "skipunfixable" => Ok(RepairPolicy::SkipUnfixable),
            _ => Err(AppError::validation(format!(
                "unknown repair policy `{value}` (expected firstConflict or skipUnfixable)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Resolved,
    AttemptsExhausted,
    /// Every remaining conflict was found unfixable since the last relocation.
    Stalled,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Resolved => "resolved",
            RunStatus::AttemptsExhausted => "attemptsExhausted",
            RunStatus::Stalled => "stalled",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relocation {
    pub slot_id: RecordId,
    pub kind: ConflictKind,
    pub from: SlotPlacement,
    pub to: SlotPlacement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub status: RunStatus,
    pub attempts_used: u32,
    pub relocations: Vec<Relocation>,
    /// Recomputed from the final slot set.
    pub remaining_conflicts: Vec<Conflict>,
    pub slots: Vec<LessonSlot>,
}
