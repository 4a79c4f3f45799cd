// End-to-end auto-fix flows through the command layer

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Weekday;
use httpmock::prelude::*;
use serde_json::json;
use timetable_repair_lib::commands::conflicts::{
    conflicts_auto_fix, conflicts_cancel, conflicts_list, AutoFixPayload,
};
use timetable_repair_lib::commands::AppState;
use timetable_repair_lib::models::resolution::RunStatus;
use timetable_repair_lib::models::schedule::SchoolProfile;
use timetable_repair_lib::models::slot::{
    ClassRef, LessonSlot, RecordId, SlotPlacement, SubjectRef, TeacherRef,
};
use timetable_repair_lib::services::http_gateway::HttpTimetableGateway;
use timetable_repair_lib::services::result_reporter::ReportLevel;
use timetable_repair_lib::services::settings_service::SettingsService;
use timetable_repair_lib::services::timetable_gateway::{
    InMemoryTimetableGateway, TimetableGateway,
};

fn slot(id: i64, teacher: i64, class: i64, day: Weekday, period: u32) -> LessonSlot {
    LessonSlot {
        id: RecordId::from(id),
        class: ClassRef {
            id: RecordId::from(class),
            name: "8".into(),
            section: format!("{class}"),
        },
        teacher: TeacherRef {
            id: RecordId::from(teacher),
            name: format!("Teacher {teacher}"),
        },
        subject: SubjectRef {
            id: RecordId::from(2),
            name: "Geography".into(),
        },
        day: Some(day),
        period_number: Some(period),
        start_time: None,
        end_time: None,
        room_number: None,
        is_active: true,
        academic_year: Some("2025-2026".into()),
    }
}

fn state_with(gateway: Arc<dyn TimetableGateway>) -> AppState {
    let settings = Arc::new(SettingsService::with_config_path(None));
    AppState::with_gateway(settings, gateway).expect("state builds")
}

#[tokio::test]
async fn report_then_fix_then_report_again() {
    let gateway = Arc::new(
        InMemoryTimetableGateway::new(vec![
            slot(1, 1, 1, Weekday::Mon, 1),
            slot(2, 1, 2, Weekday::Mon, 1),
            slot(3, 2, 2, Weekday::Tue, 2),
            slot(4, 3, 2, Weekday::Tue, 2),
        ])
        .with_profile(SchoolProfile {
            working_days: vec!["Monday".into(), "Tuesday".into(), "Wednesday".into()],
            total_periods_per_day: Some(3),
        }),
    );
    let state = state_with(gateway.clone());

    let before = conflicts_list(&state, Some("2025-2026".into()))
        .await
        .expect("report loads");
    assert_eq!(before.total, 2);
    assert_eq!(before.teacher_conflicts, 1);
    assert_eq!(before.class_conflicts, 1);
    assert!(before.conflicts[0].message.contains("Teacher 1"));

    let report = conflicts_auto_fix(
        &state,
        AutoFixPayload {
            academic_year: Some("2025-2026".into()),
            max_attempts: Some(10),
            policy: None,
        },
    )
    .await
    .expect("command accepted");

    assert_eq!(report.level, ReportLevel::Success);
    assert_eq!(report.status, Some(RunStatus::Resolved));
    assert_eq!(report.attempts_used, Some(2));
    assert_eq!(report.relocations.len(), 2);
    assert!(report.remaining_conflicts.is_empty());

    let after = conflicts_list(&state, Some("2025-2026".into()))
        .await
        .expect("report loads");
    assert_eq!(after.total, 0);
    assert_eq!(gateway.recorded_updates().expect("updates").len(), 2);
}

#[tokio::test]
async fn second_run_is_rejected_while_first_is_active() {
    let gateway = Arc::new(
        InMemoryTimetableGateway::new(vec![
            slot(1, 1, 1, Weekday::Mon, 1),
            slot(2, 1, 2, Weekday::Mon, 1),
        ])
        .with_delay(StdDuration::from_millis(150)),
    );
    let state = state_with(gateway);

    let first_state = state.clone();
    let first = tokio::spawn(async move {
        conflicts_auto_fix(&first_state, AutoFixPayload::default()).await
    });

    tokio::time::sleep(StdDuration::from_millis(30)).await;
    let second = conflicts_auto_fix(&state, AutoFixPayload::default()).await;
    assert_eq!(
        second.err().map(|err| err.code),
        Some("RUN_IN_PROGRESS".to_string())
    );

    let first = first.await.expect("task joins").expect("first run accepted");
    assert_eq!(first.status, Some(RunStatus::Resolved));
}

#[tokio::test]
async fn cancel_stops_an_active_run() {
    // Two teacher clashes, each needing a slow persist. The cancel lands
    // while the first one is being written.
    let gateway = Arc::new(
        InMemoryTimetableGateway::new(vec![
            slot(1, 1, 1, Weekday::Mon, 1),
            slot(2, 1, 2, Weekday::Mon, 1),
            slot(3, 2, 3, Weekday::Mon, 1),
            slot(4, 2, 4, Weekday::Mon, 1),
        ])
        .with_delay(StdDuration::from_millis(100)),
    );
    let state = state_with(gateway.clone());

    assert!(!conflicts_cancel(&state).expect("cancel command"));

    let run_state = state.clone();
    let run = tokio::spawn(async move {
        conflicts_auto_fix(&run_state, AutoFixPayload::default()).await
    });

    tokio::time::sleep(StdDuration::from_millis(150)).await;
    assert!(conflicts_cancel(&state).expect("cancel command"));

    let report = run.await.expect("task joins").expect("run accepted");
    assert_eq!(report.status, Some(RunStatus::Cancelled));
    assert_eq!(report.level, ReportLevel::Warning);
    assert_eq!(report.attempts_used, Some(1));
    assert_eq!(report.remaining_conflicts.len(), 1);
    assert_eq!(gateway.recorded_updates().expect("updates").len(), 1);
}

#[tokio::test]
async fn http_backend_listing_is_authoritative_after_each_update() {
    // The backend acknowledges the PUT but keeps serving the old listing, so
    // every attempt re-detects the same clash.
    let server = MockServer::start_async().await;

    let row = |id: i64, day: &str| {
        json!({
            "id": id,
            "class": 20 + id,
            "subject": 2,
            "teacher": 5,
            "teacher_name": "Moreau",
            "day": day,
            "period_number": 1,
            "start_time": "08:00",
            "end_time": "08:45",
            "is_active": true,
            "academic_year": "2025-2026"
        })
    };

    let _profile = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/school-profile/");
            then.status(200).json_body(json!([{
                "working_days": ["Monday", "Tuesday"],
                "total_periods_per_day": 2
            }]));
        })
        .await;

    let listing = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/timetable/")
                .query_param("academic_year", "2025-2026");
            then.status(200)
                .json_body(json!([row(1, "Monday"), row(2, "Monday")]));
        })
        .await;

    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/timetable/2/")
                .json_body(json!({
                    "class": 22,
                    "subject": 2,
                    "teacher": 5,
                    "day": "Tuesday",
                    "period_number": 1,
                    "start_time": "08:00",
                    "end_time": "08:45",
                    "is_active": true,
                    "academic_year": "2025-2026"
                }));
            then.status(200).json_body(row(2, "Tuesday"));
        })
        .await;

    let gateway: Arc<dyn TimetableGateway> = Arc::new(
        HttpTimetableGateway::try_new(&server.base_url(), None, StdDuration::from_secs(2))
            .expect("gateway builds"),
    );
    let state = state_with(gateway);

    let report = conflicts_auto_fix(
        &state,
        AutoFixPayload {
            academic_year: Some("2025-2026".into()),
            max_attempts: Some(3),
            policy: None,
        },
    )
    .await
    .expect("run accepted");

    update.assert_hits_async(3).await;
    listing.assert_hits_async(4).await;
    assert_eq!(report.status, Some(RunStatus::AttemptsExhausted));
    assert_eq!(report.level, ReportLevel::Warning);
    assert_eq!(report.relocations.len(), 3);
    assert!(report
        .relocations
        .iter()
        .all(|relocation| relocation.slot_id == RecordId::from(2)
            && relocation.to == SlotPlacement::new(Weekday::Tue, 1)));
    assert_eq!(report.remaining_conflicts.len(), 1);
}
