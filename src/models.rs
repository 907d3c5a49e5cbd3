use crate::error::{AppError, FieldError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use url::Url;

pub const MESSAGE_MIN_CHARS: usize = 5;
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Boundary checks that serde alone cannot express.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

fn finish(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// A public event hosted at the center. `end` is not checked against `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub category: Option<String>,
}

impl Validate for Event {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.title.is_empty() {
            errors.push(FieldError::new("title", "title must not be empty"));
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub url: Url,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub credit: Option<String>,
}

impl Validate for GalleryImage {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if !matches!(self.url.scheme(), "http" | "https") {
            errors.push(FieldError::new("url", "url scheme should be 'http' or 'https'"));
        } else if self.url.host_str().is_none_or(str::is_empty) {
            errors.push(FieldError::new("url", "url must include a host"));
        }
        finish(errors)
    }
}

/// A contact form submission. Stored, never read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Validate for ContactMessage {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        let len = self.message.chars().count();
        if len < MESSAGE_MIN_CHARS {
            errors.push(FieldError::new(
                "message",
                format!("message should have at least {MESSAGE_MIN_CHARS} characters"),
            ));
        } else if len > MESSAGE_MAX_CHARS {
            errors.push(FieldError::new(
                "message",
                format!("message should have at most {MESSAGE_MAX_CHARS} characters"),
            ));
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyHour {
    pub day: String,
    pub open: String,
    pub close: String,
    pub note: Option<String>,
}

impl WeeklyHour {
    fn new(day: &str, open: &str, close: &str, note: Option<&str>) -> Self {
        WeeklyHour {
            day: day.to_string(),
            open: open.to_string(),
            close: close.to_string(),
            note: note.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenterInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub email: String,
    pub phone: String,
    pub website: Option<String>,
    pub schedule: Vec<WeeklyHour>,
}

impl CenterInfo {
    pub fn jesenca_pozeg() -> Self {
        let weekday = |day| WeeklyHour::new(day, "09:00", "17:00", None);
        CenterInfo {
            name: "Ješenca-Požeg Community Center".to_string(),
            address: "Ješenca 1".to_string(),
            city: "Požeg".to_string(),
            country: "Slovenia".to_string(),
            latitude: 46.2711,
            longitude: 15.3793,
            email: "info@jesenca-pozeg.si".to_string(),
            phone: "+386 41 123 456".to_string(),
            website: None,
            schedule: vec![
                weekday("Monday"),
                weekday("Tuesday"),
                weekday("Wednesday"),
                weekday("Thursday"),
                weekday("Friday"),
                WeeklyHour::new("Saturday", "10:00", "14:00", Some("Events only")),
                WeeklyHour::new("Sunday", "Closed", "Closed", Some("Closed")),
            ],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

pub mod timestamp {
    use super::*;
    use std::fmt;

    /// Larger magnitudes are read as milliseconds.
    const MAX_EPOCH_SECONDS: i64 = 20_000_000_000;

    /// Accepts RFC 3339, naive ISO date-times (taken as UTC) and bare dates.
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|pattern| NaiveDateTime::parse_from_str(raw, pattern).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .map(|naive| naive.and_utc())
    }

    /// Unix time in seconds, or milliseconds past `MAX_EPOCH_SECONDS`.
    pub fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
        if value.abs() > MAX_EPOCH_SECONDS {
            DateTime::from_timestamp_millis(value)
        } else {
            DateTime::from_timestamp(value, 0)
        }
    }

    fn from_epoch_f64(value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        if value.abs() > MAX_EPOCH_SECONDS as f64 {
            return DateTime::from_timestamp_millis(value.round() as i64);
        }
        let secs = value.floor();
        let nanos = (((value - secs) * 1e9).round() as u32).min(999_999_999);
        DateTime::from_timestamp(secs as i64, nanos)
    }

    struct TimestampVisitor;

    impl de::Visitor<'_> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an ISO 8601 datetime or a unix timestamp")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse(v).ok_or_else(|| E::custom(format!("invalid datetime {v:?}")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            from_epoch(v).ok_or_else(|| E::custom(format!("timestamp {v} out of range")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            i64::try_from(v)
                .ok()
                .and_then(from_epoch)
                .ok_or_else(|| E::custom(format!("timestamp {v} out of range")))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            from_epoch_f64(v).ok_or_else(|| E::custom(format!("timestamp {v} out of range")))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimestampVisitor)
    }
}
