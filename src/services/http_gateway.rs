use std::time::{Duration as StdDuration, Instant};

use chrono::Weekday;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, StoreErrorCode};
use crate::models::day::parse_day;
use crate::models::schedule::SchoolProfile;
use crate::models::settings::AppSettings;
use crate::models::slot::{ClassRef, LessonSlot, RecordId, SubjectRef, TeacherRef};
use crate::services::timetable_gateway::{SlotUpdate, TimetableGateway};

const SLOTS_PATH: &str = "/api/timetable/";
const PROFILE_PATH: &str = "/api/school-profile/";
const MAX_PAGES: usize = 200;

/// REST client for the timetable backend.
pub struct HttpTimetableGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpTimetableGateway {
    pub fn try_new(
        base_url: &str,
        api_token: Option<String>,
        timeout: StdDuration,
    ) -> AppResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AppError::config("timetable API base URL is empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(StdDuration::from_secs(90)))
            .build()
            .map_err(|err| AppError::other(format!("failed to build timetable HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    pub fn from_settings(settings: &AppSettings) -> AppResult<Self> {
        Self::try_new(
            &settings.api_base_url,
            settings.api_token.clone(),
            settings.http_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        correlation_id: &str,
        missing_is_none: bool,
    ) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let start = Instant::now();
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| error_from_reqwest(err, correlation_id))?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis();

        if status == StatusCode::NOT_FOUND && missing_is_none {
            debug!(
                target: "app::store::http",
                operation,
                correlation_id = %correlation_id,
                latency_ms,
                "resource not configured"
            );
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.json::<JsonValue>().await.ok();
            warn!(
                target: "app::store::http",
                operation,
                correlation_id = %correlation_id,
                status = status.as_u16(),
                latency_ms,
                "timetable API returned non-success status"
            );
            return Err(map_http_error(status, correlation_id, body));
        }

        debug!(
            target: "app::store::http",
            operation,
            correlation_id = %correlation_id,
            status = status.as_u16(),
            latency_ms,
            "timetable API responded"
        );

        let value = response.json::<T>().await.map_err(|err| {
            AppError::store_with_details(
                StoreErrorCode::InvalidResponse,
                format!("could not decode timetable API response for {operation}"),
                Some(correlation_id),
                Some(json!({ "reason": err.to_string() })),
            )
        })?;

        Ok(Some(value))
    }

    async fn fetch_page(&self, url: &str, query: &[(&str, &str)]) -> AppResult<SlotPage> {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            target: "app::store::http",
            correlation_id = %correlation_id,
            %url,
            "listing lesson slots"
        );

        let request = self.client.get(url).query(query);
        let page = self
            .send_json::<SlotListResponse>("list_slots", request, &correlation_id, false)
            .await?
            .ok_or_else(|| {
                AppError::store_with_details(
                    StoreErrorCode::InvalidResponse,
                    "empty slot listing",
                    Some(correlation_id.as_str()),
                    None,
                )
            })?;

        Ok(page.into_page())
    }
}

#[async_trait::async_trait]
impl TimetableGateway for HttpTimetableGateway {
    async fn list_slots(&self, academic_year: Option<&str>) -> AppResult<Vec<LessonSlot>> {
        let mut query = Vec::new();
        if let Some(year) = academic_year {
            query.push(("academic_year", year));
        }

        let mut page = self.fetch_page(&self.url(SLOTS_PATH), &query).await?;
        let mut records = std::mem::take(&mut page.results);
        let mut pages = 1;

        while let Some(next) = page.next.take() {
            if pages >= MAX_PAGES {
                return Err(AppError::store_with_details(
                    StoreErrorCode::InvalidResponse,
                    "slot listing did not terminate",
                    None,
                    Some(json!({ "pages": pages })),
                ));
            }
            // `next` already carries the query string.
            page = self.fetch_page(&next, &[]).await?;
            records.append(&mut page.results);
            pages += 1;
        }

        Ok(records.into_iter().map(SlotRecord::into_slot).collect())
    }

    async fn update_slot(&self, update: &SlotUpdate) -> AppResult<LessonSlot> {
        let correlation_id = Uuid::new_v4().to_string();
        let url = self.url(&format!("{SLOTS_PATH}{}/", update.id));
        debug!(
            target: "app::store::http",
            correlation_id = %correlation_id,
            slot_id = %update.id,
            period_number = update.period_number,
            "updating lesson slot"
        );

        let request = self.client.put(&url).json(update);
        let record = self
            .send_json::<SlotRecord>("update_slot", request, &correlation_id, false)
            .await?
            .ok_or_else(|| {
                AppError::store_with_details(
                    StoreErrorCode::InvalidResponse,
                    "empty slot update response",
                    Some(correlation_id.as_str()),
                    None,
                )
            })?;

        Ok(record.into_slot())
    }

    async fn school_profile(&self) -> AppResult<Option<SchoolProfile>> {
        let correlation_id = Uuid::new_v4().to_string();
        let request = self.client.get(self.url(PROFILE_PATH));
        let response = self
            .send_json::<ProfileResponse>("school_profile", request, &correlation_id, true)
            .await?;

        Ok(response.and_then(ProfileResponse::into_profile))
    }
}

fn map_http_error(status: StatusCode, correlation_id: &str, body: Option<JsonValue>) -> AppError {
    let details = body.map(|body| json!({ "status": status.as_u16(), "body": body }));
    match status {
        StatusCode::UNAUTHORIZED => AppError::store_with_details(
            StoreErrorCode::Unauthorized,
            "timetable API rejected the credentials",
            Some(correlation_id),
            details,
        ),
        StatusCode::FORBIDDEN => AppError::store_with_details(
            StoreErrorCode::Forbidden,
            "timetable API denied access",
            Some(correlation_id),
            details,
        ),
        StatusCode::NOT_FOUND => AppError::store_with_details(
            StoreErrorCode::NotFound,
            "timetable record not found",
            Some(correlation_id),
            details,
        ),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::store_with_details(
            StoreErrorCode::InvalidRequest,
            "timetable API rejected the request",
            Some(correlation_id),
            details,
        ),
        status if status.is_server_error() => AppError::store_with_details(
            StoreErrorCode::Unavailable,
            format!("timetable API unavailable (status {})", status.as_u16()),
            Some(correlation_id),
            details,
        ),
        status => AppError::store_with_details(
            StoreErrorCode::Unknown,
            format!("timetable API returned status {}", status.as_u16()),
            Some(correlation_id),
            details,
        ),
    }
}

fn error_from_reqwest(err: reqwest::Error, correlation_id: &str) -> AppError {
    if err.is_timeout() {
        AppError::store_with_details(
            StoreErrorCode::HttpTimeout,
            "timetable API request timed out",
            Some(correlation_id),
            None,
        )
    } else if err.is_connect() {
        AppError::store_with_details(
            StoreErrorCode::Unavailable,
            "could not connect to the timetable API",
            Some(correlation_id),
            None,
        )
    } else if let Some(status) = err.status() {
        map_http_error(status, correlation_id, None)
    } else {
        AppError::store_with_details(
            StoreErrorCode::Unknown,
            format!("timetable API request failed: {err}"),
            Some(correlation_id),
            None,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SlotListResponse {
    Paginated {
        results: Vec<SlotRecord>,
        #[serde(default)]
        next: Option<String>,
    },
    Plain(Vec<SlotRecord>),
}

struct SlotPage {
    results: Vec<SlotRecord>,
    next: Option<String>,
}

impl SlotListResponse {
    fn into_page(self) -> SlotPage {
        match self {
            SlotListResponse::Paginated { results, next } => SlotPage {
                results,
                next: next.filter(|url| !url.trim().is_empty()),
            },
            SlotListResponse::Plain(results) => SlotPage {
                results,
                next: None,
            },
        }
    }
}

/// Slot row as the backend serializes it (snake_case, flat foreign keys).
#[derive(Debug, Deserialize)]
struct SlotRecord {
    id: RecordId,
    #[serde(default, alias = "class_assigned", deserialize_with = "lenient_id")]
    class: RecordId,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default, alias = "section")]
    class_section: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    subject: RecordId,
    #[serde(default)]
    subject_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    teacher: RecordId,
    #[serde(default)]
    teacher_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_day")]
    day: Option<Weekday>,
    #[serde(default, deserialize_with = "lenient_period")]
    period_number: Option<u32>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    room_number: Option<String>,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    academic_year: Option<String>,
}

impl SlotRecord {
    fn into_slot(self) -> LessonSlot {
        LessonSlot {
            id: self.id,
            class: ClassRef {
                id: self.class,
                name: self.class_name.unwrap_or_default(),
                section: self.class_section.unwrap_or_default(),
            },
            teacher: TeacherRef {
                id: self.teacher,
                name: self.teacher_name.unwrap_or_default(),
            },
            subject: SubjectRef {
                id: self.subject,
                name: self.subject_name.unwrap_or_default(),
            },
            day: self.day,
            period_number: self.period_number,
            start_time: self.start_time,
            end_time: self.end_time,
            room_number: self.room_number.filter(|room| !room.trim().is_empty()),
            is_active: self.is_active,
            academic_year: self.academic_year,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfileResponse {
    Paginated { results: Vec<ProfileRecord> },
    List(Vec<ProfileRecord>),
    Single(ProfileRecord),
}

impl ProfileResponse {
    fn into_profile(self) -> Option<SchoolProfile> {
        let record = match self {
            ProfileResponse::Paginated { results } | ProfileResponse::List(results) => {
                results.into_iter().next()?
            }
            ProfileResponse::Single(record) => record,
        };
        Some(SchoolProfile {
            working_days: record.working_days.into_names(),
            total_periods_per_day: record.total_periods_per_day,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRecord {
    #[serde(default)]
    working_days: WorkingDays,
    #[serde(default, deserialize_with = "lenient_period")]
    total_periods_per_day: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum WorkingDays {
    #[default]
    Missing,
    List(Vec<String>),
    Joined(String),
}

impl WorkingDays {
    fn into_names(self) -> Vec<String> {
        match self {
            WorkingDays::Missing => Vec::new(),
            WorkingDays::List(names) => names,
            WorkingDays::Joined(joined) => joined
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }
}

fn default_active() -> bool {
    true
}

fn lenient_id<'de, D>(deserializer: D) -> Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.map(RecordId::from).unwrap_or_default())
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<JsonValue>::deserialize(deserializer)? {
        Some(JsonValue::String(value)) => Some(value),
        Some(JsonValue::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_day<'de, D>(deserializer: D) -> Result<Option<Weekday>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.as_deref().and_then(parse_day))
}

fn lenient_period<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let period = match Option::<JsonValue>::deserialize(deserializer)? {
        Some(JsonValue::Number(number)) => {
            number.as_u64().and_then(|value| u32::try_from(value).ok())
        }
        Some(JsonValue::String(value)) => value.trim().parse::<u32>().ok(),
        _ => None,
    };
    Ok(period.filter(|value| *value > 0))
}

pub mod testing {
    use super::*;

    /// Exposes status mapping to integration tests.
    pub fn map_http_error(status: StatusCode) -> AppError {
        super::map_http_error(status, "test-correlation-id", None)
    }
}
