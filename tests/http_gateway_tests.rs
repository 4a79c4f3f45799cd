use chrono::Weekday;
use httpmock::prelude::*;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration as StdDuration;
use timetable_repair_lib::error::StoreErrorCode;
use timetable_repair_lib::models::slot::{LessonSlot, RecordId, SlotPlacement};
use timetable_repair_lib::services::http_gateway::testing::map_http_error;
use timetable_repair_lib::services::http_gateway::HttpTimetableGateway;
use timetable_repair_lib::services::timetable_gateway::{SlotUpdate, TimetableGateway};

fn gateway(server: &MockServer) -> HttpTimetableGateway {
    HttpTimetableGateway::try_new(&server.base_url(), None, StdDuration::from_secs(2))
        .expect("gateway should build")
}

fn slot_json(id: i64, teacher: i64, day: &str, period: i64) -> serde_json::Value {
    json!({
        "id": id,
        "class_assigned": 3,
        "class_name": "10",
        "class_section": "A",
        "subject": 8,
        "subject_name": "Chemistry",
        "teacher": teacher,
        "teacher_name": "Haddad",
        "day": day,
        "period_number": period,
        "start_time": "09:00",
        "end_time": "09:45",
        "room_number": "Lab 2",
        "is_active": true,
        "academic_year": "2025-2026"
    })
}

#[test]
fn http_error_mapping_covers_backend_statuses() {
    let error = map_http_error(StatusCode::UNAUTHORIZED);
    assert_eq!(error.store_code(), Some(StoreErrorCode::Unauthorized));
    assert_eq!(error.store_correlation_id(), Some("test-correlation-id"));

    let error = map_http_error(StatusCode::FORBIDDEN);
    assert_eq!(error.store_code(), Some(StoreErrorCode::Forbidden));

    let error = map_http_error(StatusCode::NOT_FOUND);
    assert_eq!(error.store_code(), Some(StoreErrorCode::NotFound));

    let error = map_http_error(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error.store_code(), Some(StoreErrorCode::InvalidRequest));
    assert_eq!(error.to_string(), "timetable API rejected the request");

    let error = map_http_error(StatusCode::BAD_GATEWAY);
    assert_eq!(error.store_code(), Some(StoreErrorCode::Unavailable));
    assert!(error.to_string().contains("status 502"));

    let error = map_http_error(StatusCode::IM_A_TEAPOT);
    assert_eq!(error.store_code(), Some(StoreErrorCode::Unknown));
}

#[tokio::test]
async fn list_slots_reads_plain_array_with_year_filter() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/timetable/")
                .query_param("academic_year", "2025-2026");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([
                    slot_json(1, 4, "Monday", 1),
                    slot_json(2, 4, "monday", 1),
                    slot_json(3, 5, "Funday", 2),
                ]));
        })
        .await;

    let slots = gateway(&server)
        .list_slots(Some("2025-2026"))
        .await
        .expect("listing succeeds");

    mock.assert_async().await;
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0].id, RecordId::from(1));
    assert_eq!(slots[0].class.id, RecordId::from(3));
    assert_eq!(slots[0].class.label(), "10-A");
    assert_eq!(slots[0].teacher.name, "Haddad");
    assert_eq!(slots[1].placement(), Some(SlotPlacement::new(Weekday::Mon, 1)));
    assert_eq!(slots[2].day, None);
    assert_eq!(slots[2].placement(), None);
}

#[tokio::test]
async fn list_slots_follows_pagination() {
    let server = MockServer::start_async().await;
    let next = format!("{}/api/timetable/?cursor=p2", server.base_url());

    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/timetable/")
                .query_param("academic_year", "2025-2026");
            then.status(200).json_body(json!({
                "count": 2,
                "next": next,
                "results": [slot_json(1, 4, "Tuesday", 2)]
            }));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/timetable/")
                .query_param("cursor", "p2");
            then.status(200).json_body(json!({
                "count": 2,
                "next": null,
                "results": [slot_json(2, 5, "Wednesday", 3)]
            }));
        })
        .await;

    let slots = gateway(&server)
        .list_slots(Some("2025-2026"))
        .await
        .expect("paginated listing succeeds");

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[1].day, Some(Weekday::Wed));
}

#[tokio::test]
async fn update_slot_puts_full_record() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/timetable/2/")
                .header("Authorization", "Bearer secret-token")
                .json_body(json!({
                    "class": 3,
                    "subject": 8,
                    "teacher": 4,
                    "day": "Tuesday",
                    "period_number": 1,
                    "start_time": "09:00",
                    "end_time": "09:45",
                    "room_number": "Lab 2",
                    "is_active": true,
                    "academic_year": "2025-2026"
                }));
            then.status(200).json_body(slot_json(2, 4, "Tuesday", 1));
        })
        .await;

    let listed = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/timetable/");
            then.status(200).json_body(json!([slot_json(2, 4, "Monday", 1)]));
        })
        .await;

    let gateway = HttpTimetableGateway::try_new(
        &format!("{}/", server.base_url()),
        Some("secret-token".into()),
        StdDuration::from_secs(2),
    )
    .expect("gateway should build");

    let slots = gateway.list_slots(None).await.expect("listing succeeds");
    listed.assert_async().await;

    let moved = slots[0].relocated_to(SlotPlacement::new(Weekday::Tue, 1));
    let update = SlotUpdate::from_slot(&moved).expect("update body");
    let saved = gateway.update_slot(&update).await.expect("update succeeds");

    mock.assert_async().await;
    assert_eq!(saved.day, Some(Weekday::Tue));
    assert_eq!(saved.room_number.as_deref(), Some("Lab 2"));
}

#[tokio::test]
async fn rejected_update_carries_server_body_and_correlation_id() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/timetable/9/");
            then.status(400)
                .json_body(json!({ "period_number": ["Ensure this value is less than or equal to 8."] }));
        })
        .await;

    let slot = LessonSlot {
        id: RecordId::from(9),
        class: Default::default(),
        teacher: Default::default(),
        subject: Default::default(),
        day: None,
        period_number: None,
        start_time: None,
        end_time: None,
        room_number: None,
        is_active: true,
        academic_year: None,
    }
    .relocated_to(SlotPlacement::new(Weekday::Fri, 9));
    let update = SlotUpdate::from_slot(&slot).expect("update body");

    let error = gateway(&server)
        .update_slot(&update)
        .await
        .expect_err("backend rejects the period");

    assert_eq!(error.store_code(), Some(StoreErrorCode::InvalidRequest));
    assert!(error.store_correlation_id().is_some());
    let details = error.store_details().expect("details present");
    assert_eq!(details.get("status"), Some(&json!(400)));
    assert!(details
        .get("body")
        .and_then(|body| body.get("period_number"))
        .is_some());
}

#[tokio::test]
async fn school_profile_handles_missing_and_joined_days() {
    let server = MockServer::start_async().await;
    let mut missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/school-profile/");
            then.status(404);
        })
        .await;

    let profile = gateway(&server)
        .school_profile()
        .await
        .expect("404 is not an error");
    assert_eq!(profile, None);
    missing.delete_async().await;

    let _configured = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/school-profile/");
            then.status(200).json_body(json!({
                "working_days": "Monday, Tuesday, Saturday",
                "total_periods_per_day": 6
            }));
        })
        .await;

    let profile = gateway(&server)
        .school_profile()
        .await
        .expect("profile loads")
        .expect("profile present");
    assert_eq!(profile.working_days, vec!["Monday", "Tuesday", "Saturday"]);
    assert_eq!(profile.total_periods_per_day, Some(6));
}

#[tokio::test]
async fn undecodable_listing_is_invalid_response() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/timetable/");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html>maintenance</html>");
        })
        .await;

    let error = gateway(&server)
        .list_slots(None)
        .await
        .expect_err("html is not a slot listing");
    assert_eq!(error.store_code(), Some(StoreErrorCode::InvalidResponse));
}

#[tokio::test]
async fn slow_backend_maps_to_http_timeout() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/timetable/");
            then.status(200)
                .json_body(json!([]))
                .delay(StdDuration::from_millis(800));
        })
        .await;

    let gateway =
        HttpTimetableGateway::try_new(&server.base_url(), None, StdDuration::from_millis(100))
            .expect("gateway should build");

    let error = gateway
        .list_slots(None)
        .await
        .expect_err("request should time out");
    assert_eq!(error.store_code(), Some(StoreErrorCode::HttpTimeout));
}

#[tokio::test]
async fn unreachable_backend_maps_to_unavailable() {
    let gateway =
        HttpTimetableGateway::try_new("http://127.0.0.1:1", None, StdDuration::from_secs(2))
            .expect("gateway should build");

    let error = gateway
        .school_profile()
        .await
        .expect_err("nothing listens on port 1");
    assert_eq!(error.store_code(), Some(StoreErrorCode::Unavailable));
}
