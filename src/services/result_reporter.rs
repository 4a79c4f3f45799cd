use chrono::Utc;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::conflict::{Conflict, ConflictKind, ConflictView};
use crate::models::resolution::{Relocation, RunResult, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportLevel {
    Success,
    Warning,
    Error,
}

/// The single message shown after an auto-fix run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub level: ReportLevel,
    pub status: Option<RunStatus>,
    pub headline: String,
    pub message: String,
    pub attempts_used: Option<u32>,
    pub relocations: Vec<Relocation>,
    pub remaining_conflicts: Vec<ConflictView>,
    pub error_code: Option<String>,
}

pub fn summarize(outcome: &AppResult<RunResult>) -> ResolutionReport {
    match outcome {
        Ok(result) => summarize_run(result),
        Err(err) => summarize_failure(err),
    }
}

pub fn summarize_run(result: &RunResult) -> ResolutionReport {
    let attempts = result.attempts_used;
    let remaining = result.remaining_conflicts.len();
    let (level, headline, message) = match result.status {
        RunStatus::Resolved => (
            ReportLevel::Success,
            "All conflicts resolved".to_string(),
            format!(
                "Resolved every conflict in {attempts} {} ({} {} moved).",
                plural(attempts as usize, "attempt", "attempts"),
                result.relocations.len(),
                plural(result.relocations.len(), "lesson", "lessons"),
            ),
        ),
        RunStatus::AttemptsExhausted => (
            ReportLevel::Warning,
            "Some conflicts could not be resolved".to_string(),
            format!(
                "Stopped after {attempts} {} with {remaining} {} left. \
                 Please resolve the remaining conflicts manually.",
                plural(attempts as usize, "attempt", "attempts"),
                plural(remaining, "conflict", "conflicts"),
            ),
        ),
        RunStatus::Stalled => (
            ReportLevel::Warning,
            "No free periods for the remaining conflicts".to_string(),
            format!(
                "{remaining} {} have no free period on another working day. \
                 Please resolve them manually.",
                plural(remaining, "conflict", "conflicts"),
            ),
        ),
        RunStatus::Cancelled => (
            ReportLevel::Warning,
            "Auto-fix cancelled".to_string(),
            format!(
                "Cancelled after {attempts} {}; {remaining} {} remain.",
                plural(attempts as usize, "attempt", "attempts"),
                plural(remaining, "conflict", "conflicts"),
            ),
        ),
    };

    ResolutionReport {
        level,
        status: Some(result.status),
        headline,
        message,
        attempts_used: Some(attempts),
        relocations: result.relocations.clone(),
        remaining_conflicts: result.remaining_conflicts.iter().map(ConflictView::from).collect(),
        error_code: None,
    }
}

/// Hard error: the underlying message is surfaced verbatim.
pub fn summarize_failure(err: &AppError) -> ResolutionReport {
    let message = match err {
        AppError::ResolutionAborted { source, .. } => source.to_string(),
        other => other.to_string(),
    };

    ResolutionReport {
        level: ReportLevel::Error,
        status: None,
        headline: "Auto-fix failed".to_string(),
        message,
        attempts_used: err.attempts_used(),
        relocations: Vec::new(),
        remaining_conflicts: Vec::new(),
        error_code: err.store_code().map(|code| code.as_str().to_string()),
    }
}

/// Read-only listing for the conflicts report view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub generated_at: String,
    pub academic_year: Option<String>,
    pub total: usize,
    pub teacher_conflicts: usize,
    pub class_conflicts: usize,
    pub conflicts: Vec<ConflictView>,
}

pub fn conflict_report(academic_year: Option<&str>, conflicts: &[Conflict]) -> ConflictReport {
    let teacher_conflicts = conflicts
        .iter()
        .filter(|conflict| conflict.kind == ConflictKind::TeacherDoubleBooking)
        .count();

    ConflictReport {
        generated_at: Utc::now().to_rfc3339(),
        academic_year: academic_year.map(str::to_string),
        total: conflicts.len(),
        teacher_conflicts,
        class_conflicts: conflicts.len() - teacher_conflicts,
        conflicts: conflicts.iter().map(ConflictView::from).collect(),
    }
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 {
        one
    } else {
        many
    }
}
