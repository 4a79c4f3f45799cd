// Error handling and edge case tests

use std::io::Write;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Weekday;
use httpmock::prelude::*;
use serde_json::json;
use timetable_repair_lib::commands::conflicts::{conflicts_auto_fix, conflicts_list, AutoFixPayload};
use timetable_repair_lib::commands::{AppState, CommandError};
use timetable_repair_lib::error::{AppError, StoreErrorCode};
use timetable_repair_lib::models::schedule::SchoolProfile;
use timetable_repair_lib::models::slot::{ClassRef, LessonSlot, RecordId, SubjectRef, TeacherRef};
use timetable_repair_lib::services::http_gateway::HttpTimetableGateway;
use timetable_repair_lib::services::result_reporter::ReportLevel;
use timetable_repair_lib::services::schedule_utils::{resolve_schedule_config, schedule_config};
use timetable_repair_lib::services::settings_service::{load_settings, SettingsService};
use timetable_repair_lib::services::timetable_gateway::{
    InMemoryTimetableGateway, TimetableGateway,
};

fn slot(id: i64, teacher: i64, class: i64, day: Weekday, period: u32) -> LessonSlot {
    LessonSlot {
        id: RecordId::from(id),
        class: ClassRef {
            id: RecordId::from(class),
            name: "11".into(),
            section: "C".into(),
        },
        teacher: TeacherRef {
            id: RecordId::from(teacher),
            name: String::new(),
        },
        subject: SubjectRef::default(),
        day: Some(day),
        period_number: Some(period),
        start_time: None,
        end_time: None,
        room_number: None,
        is_active: true,
        academic_year: None,
    }
}

fn state_with(gateway: Arc<dyn TimetableGateway>) -> AppState {
    AppState::with_gateway(Arc::new(SettingsService::with_config_path(None)), gateway)
        .expect("state builds")
}

#[tokio::test]
async fn rejected_update_becomes_error_report_with_attempt_count() {
    let gateway = Arc::new(InMemoryTimetableGateway::new(vec![
        slot(1, 1, 1, Weekday::Mon, 1),
        slot(2, 1, 2, Weekday::Mon, 1),
    ]));
    gateway.fail_updates(StoreErrorCode::Forbidden, "read-only school year");
    let state = state_with(gateway.clone());

    let report = conflicts_auto_fix(&state, AutoFixPayload::default())
        .await
        .expect("command accepted");

    assert_eq!(report.level, ReportLevel::Error);
    assert_eq!(report.status, None);
    assert_eq!(report.message, "read-only school year");
    assert_eq!(report.attempts_used, Some(0));
    assert_eq!(report.error_code.as_deref(), Some("FORBIDDEN"));

    // The slot set was never touched, and the run slot is free again.
    let stored = gateway.snapshot().expect("snapshot");
    assert_eq!(stored[1].day, Some(Weekday::Mon));
    assert!(state.begin_run().is_ok());
}

#[tokio::test]
async fn timed_out_update_aborts_the_run() {
    let gateway = Arc::new(
        InMemoryTimetableGateway::new(vec![
            slot(1, 1, 1, Weekday::Mon, 1),
            slot(2, 1, 2, Weekday::Mon, 1),
        ])
        .with_delay(StdDuration::from_millis(300)),
    );
    let settings = Arc::new(SettingsService::with_config_path(None));
    let mut state_settings = settings.get().expect("settings");
    state_settings.http_timeout_ms = 50;

    let repair = timetable_repair_lib::services::repair_service::RepairService::new(
        gateway.clone(),
        state_settings,
    );
    let outcome = repair
        .auto_fix(
            Default::default(),
            &timetable_repair_lib::utils::cancellation::CancellationToken::new(),
        )
        .await;

    let err = outcome.expect_err("update should time out");
    assert!(matches!(err, AppError::ResolutionAborted { .. }));
    assert_eq!(err.store_code(), Some(StoreErrorCode::HttpTimeout));
    assert_eq!(err.attempts_used(), Some(0));
    assert!(gateway.recorded_updates().expect("updates").is_empty());
}

#[tokio::test]
async fn unauthorized_listing_surfaces_as_command_error() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/timetable/");
            then.status(401).json_body(json!({ "detail": "Invalid token." }));
        })
        .await;

    let gateway: Arc<dyn TimetableGateway> = Arc::new(
        HttpTimetableGateway::try_new(&server.base_url(), Some("stale".into()), StdDuration::from_secs(2))
            .expect("gateway builds"),
    );
    let state = state_with(gateway);

    let err: CommandError = conflicts_list(&state, None)
        .await
        .expect_err("listing is unauthorized");
    assert_eq!(err.code, "UNAUTHORIZED");
    let details = err.details.expect("details present");
    assert!(details.get("correlationId").and_then(|id| id.as_str()).is_some());
    assert_eq!(details.get("status"), Some(&json!(401)));
}

#[tokio::test]
async fn server_error_during_run_is_reported_not_retried() {
    let server = MockServer::start_async().await;
    let row = |id: i64| {
        json!({
            "id": id,
            "class": id,
            "subject": 1,
            "teacher": 9,
            "day": "Monday",
            "period_number": 1
        })
    };
    let _profile = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/school-profile/");
            then.status(404);
        })
        .await;
    let _listing = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/timetable/");
            then.status(200).json_body(json!([row(1), row(2)]));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/timetable/2/");
            then.status(503);
        })
        .await;

    let gateway: Arc<dyn TimetableGateway> = Arc::new(
        HttpTimetableGateway::try_new(&server.base_url(), None, StdDuration::from_secs(2))
            .expect("gateway builds"),
    );
    let report = conflicts_auto_fix(&state_with(gateway), AutoFixPayload::default())
        .await
        .expect("command accepted");

    update.assert_hits_async(1).await;
    assert_eq!(report.level, ReportLevel::Error);
    assert_eq!(report.error_code.as_deref(), Some("STORE_UNAVAILABLE"));
    assert!(report.message.contains("503"));
}

#[tokio::test]
async fn malformed_payload_and_budget_are_rejected_up_front() {
    let gateway: Arc<dyn TimetableGateway> = Arc::new(InMemoryTimetableGateway::new(Vec::new()));
    let state = state_with(gateway);

    let err = conflicts_auto_fix(
        &state,
        AutoFixPayload {
            policy: Some("global-optimum".into()),
            ..AutoFixPayload::default()
        },
    )
    .await
    .expect_err("unknown policy");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let report = conflicts_auto_fix(
        &state,
        AutoFixPayload {
            max_attempts: Some(1_000_000),
            ..AutoFixPayload::default()
        },
    )
    .await
    .expect("command accepted");
    assert_eq!(report.level, ReportLevel::Error);
    assert!(report.message.contains("too large"));
}

#[test]
fn unknown_working_day_in_profile_is_a_validation_error() {
    let profile = SchoolProfile {
        working_days: vec!["Monday".into(), "Moonday".into()],
        total_periods_per_day: Some(6),
    };
    let err = resolve_schedule_config(Some(&profile), &[]).expect_err("bad day name");
    assert!(matches!(err, AppError::Validation { .. }));
}

#[test]
fn empty_profile_falls_back_to_weekdays_and_observed_periods() {
    let profile = SchoolProfile {
        working_days: Vec::new(),
        total_periods_per_day: Some(0),
    };
    let slots = vec![slot(1, 1, 1, Weekday::Tue, 6)];
    let config = resolve_schedule_config(Some(&profile), &slots).expect("fallbacks apply");

    assert_eq!(config.working_days().len(), 5);
    assert_eq!(config.period_count(), 6);

    let config = resolve_schedule_config(None, &[]).expect("fallbacks apply");
    assert_eq!(config.period_count(), 8);
}

#[test]
fn zero_period_grid_is_rejected() {
    assert!(schedule_config(vec![Weekday::Mon], 0).is_err());
    assert!(schedule_config(Vec::new(), 4).is_err());
}

#[test]
fn settings_file_with_zero_timeout_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "httpTimeoutMs: 0").expect("write settings");

    let err = load_settings(Some(file.path()), |_| None).expect_err("zero timeout");
    assert!(matches!(err, AppError::Config(_)));
}
