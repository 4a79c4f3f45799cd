use std::fmt;

use chrono::Weekday;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::models::day::{day_name, serde_day, serde_opt_day};

/// Opaque identifier assigned by the timetable store.
///
/// The API hands out numeric primary keys, but nothing here depends on that:
/// ids are compared as strings and written back as numbers only when the
/// string is the canonical form of that number, so `"007"` stays a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0.parse::<i64>() {
            Ok(number) if number.to_string() == self.0 => serializer.serialize_i64(number),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match JsonValue::deserialize(deserializer)? {
            JsonValue::String(value) => Ok(RecordId(value)),
            JsonValue::Number(number) => Ok(RecordId(number.to_string())),
            other => Err(de::Error::custom(format!(
                "expected string or number id, found {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRef {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
}

/// A class-section record; `id` identifies the class and section together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub section: String,
}

impl ClassRef {
    pub fn label(&self) -> String {
        match (self.name.trim(), self.section.trim()) {
            ("", "") => self.id.to_string(),
            (name, "") => name.to_string(),
            (name, section) => format!("{name}-{section}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
}

/// A `(day, period)` cell of the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotPlacement {
    #[serde(with = "serde_day")]
    pub day: Weekday,
    pub period_number: u32,
}

impl SlotPlacement {
    pub fn new(day: Weekday, period_number: u32) -> Self {
        Self { day, period_number }
    }
}

impl fmt::Display for SlotPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} period {}", day_name(self.day), self.period_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSlot {
    pub id: RecordId,
    pub class: ClassRef,
    pub teacher: TeacherRef,
    pub subject: SubjectRef,
    #[serde(default, with = "serde_opt_day")]
    pub day: Option<Weekday>,
    #[serde(default)]
    pub period_number: Option<u32>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub academic_year: Option<String>,
}

impl LessonSlot {
    /// The grid cell this slot occupies, or `None` when day or period is missing.
    pub fn placement(&self) -> Option<SlotPlacement> {
        let day = self.day?;
        let period_number = self.period_number.filter(|period| *period > 0)?;
        Some(SlotPlacement { day, period_number })
    }

    /// Academic year this slot is judged in. Untagged slots fall back to
    /// `scope`, the year the working set was loaded for.
    pub fn year_in<'a>(&'a self, scope: Option<&'a str>) -> Option<&'a str> {
        self.academic_year.as_deref().or(scope)
    }

    /// Copy of this slot moved to `placement`; every other field is kept.
    pub fn relocated_to(&self, placement: SlotPlacement) -> LessonSlot {
        LessonSlot {
            day: Some(placement.day),
            period_number: Some(placement.period_number),
            ..self.clone()
        }
    }
}

fn default_active() -> bool {
    true
}
