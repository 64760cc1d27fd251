use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::models::{
    AttendanceStatus, NewAttendanceRecord, NewCodingLog, NewResource, NewSubject, NewTask,
    NewTimetableEntry, TaskPriority, DEFAULT_TARGET_ATTENDANCE,
};
use crate::web::error::{AppError, AppResult};

/// Browsers submit untouched inputs as empty strings.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("{field} must be a YYYY-MM-DD date")))
}

fn parse_time(value: &str, field: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AppError::bad_request(format!("{field} must be HH:MM")))
}

fn web_link(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with("http://") || value.starts_with("https://") {
        return Ok(value.to_string());
    }
    Err(AppError::bad_request(format!("{field} must be an http(s) link")))
}

/// Accepts a bare date or an HTML `datetime-local` value.
pub fn parse_due_at(value: &str) -> AppResult<Option<String>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return Ok(Some(value.to_string()));
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Some(parsed.format("%Y-%m-%dT%H:%M").to_string()));
        }
    }
    Err(AppError::bad_request("due date must be YYYY-MM-DD or YYYY-MM-DDTHH:MM"))
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SubjectForm {
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub credits: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub target_attendance: Option<f64>,
}

impl SubjectForm {
    pub fn validate(self) -> AppResult<NewSubject> {
        let credits = self.credits.unwrap_or(0);
        if credits < 0 {
            return Err(AppError::bad_request("credits cannot be negative"));
        }

        let target = self.target_attendance.unwrap_or(DEFAULT_TARGET_ATTENDANCE);
        if !(0.0..=100.0).contains(&target) {
            return Err(AppError::bad_request(
                "target attendance must be between 0 and 100",
            ));
        }

        Ok(NewSubject {
            code: self.code.trim().to_string(),
            name: required(&self.name, "name")?,
            credits,
            target_attendance: target,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SubjectIdForm {
    pub subject_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TimetableForm {
    pub subject_id: i64,
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub location: String,
}

impl TimetableForm {
    pub fn validate(self) -> AppResult<NewTimetableEntry> {
        if self.day_of_week > 6 {
            return Err(AppError::bad_request("day must be between 0 (Mon) and 6 (Sun)"));
        }
        let start = parse_time(&self.start_time, "start time")?;
        let end = parse_time(&self.end_time, "end time")?;
        if start >= end {
            return Err(AppError::bad_request("class must end after it starts"));
        }

        Ok(NewTimetableEntry {
            subject_id: self.subject_id,
            day_of_week: self.day_of_week,
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
            location: self.location.trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TimetableDeleteForm {
    pub entry_id: i64,
    pub day: u8,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceForm {
    pub subject_id: i64,
    pub class_date: String,
    pub status: String,
    #[serde(default)]
    pub note: String,
}

impl AttendanceForm {
    pub fn validate(self) -> AppResult<NewAttendanceRecord> {
        let status: AttendanceStatus = self
            .status
            .parse()
            .map_err(|_| AppError::bad_request("Invalid status"))?;

        Ok(NewAttendanceRecord {
            subject_id: self.subject_id,
            class_date: parse_date(&self.class_date, "class date")?,
            status,
            note: self.note.trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordIdForm {
    pub record_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TaskForm {
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub due_at: String,
    #[serde(default)]
    pub priority: String,
}

impl TaskForm {
    pub fn validate(self) -> AppResult<NewTask> {
        Ok(NewTask {
            subject_id: self.subject_id,
            title: required(&self.title, "title")?,
            due_at: parse_due_at(&self.due_at)?,
            priority: self.priority.parse().unwrap_or(TaskPriority::Medium),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskToggleForm {
    pub task_id: i64,
    pub next_status: String,
    #[serde(default)]
    pub show: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskDeleteForm {
    pub task_id: i64,
    #[serde(default)]
    pub show: String,
}

#[derive(Debug, Deserialize)]
pub struct ResourceForm {
    pub title: String,
    pub url: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub tags: String,
}

impl ResourceForm {
    pub fn validate(self) -> AppResult<NewResource> {
        let url = required(&self.url, "url")?;
        Ok(NewResource {
            subject_id: self.subject_id,
            title: required(&self.title, "title")?,
            url: web_link(&url, "url")?,
            tags: self.tags.trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ResourceIdForm {
    pub resource_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CodingForm {
    pub log_date: String,
    pub platform: String,
    pub problem: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub link: String,
}

impl CodingForm {
    pub fn validate(self) -> AppResult<NewCodingLog> {
        Ok(NewCodingLog {
            log_date: parse_date(&self.log_date, "date")?,
            platform: required(&self.platform, "platform")?,
            problem: required(&self.problem, "problem")?,
            difficulty: self.difficulty.trim().to_lowercase(),
            topic: self.topic.trim().to_string(),
            link: web_link(&self.link, "link")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CodingIdForm {
    pub log_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimetableQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub day: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShowQuery {
    pub show: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_defaults_fill_blank_fields() {
        let form: SubjectForm =
            serde_urlencoded::from_str("name=+Networks+&code=CS302&credits=&target_attendance=")
                .unwrap();
        let subject = form.validate().unwrap();
        assert_eq!(subject.name, "Networks");
        assert_eq!(subject.credits, 0);
        assert_eq!(subject.target_attendance, 75.0);
    }

    #[test]
    fn subject_target_must_be_a_percentage() {
        let form: SubjectForm =
            serde_urlencoded::from_str("name=OS&target_attendance=140").unwrap();
        assert!(matches!(form.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn timetable_rejects_inverted_slot() {
        let form = TimetableForm {
            subject_id: 1,
            day_of_week: 2,
            start_time: "11:00".to_string(),
            end_time: "10:00".to_string(),
            location: String::new(),
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn attendance_status_is_case_insensitive() {
        let form = AttendanceForm {
            subject_id: 1,
            class_date: "2026-09-01".to_string(),
            status: " PRESENT ".to_string(),
            note: String::new(),
        };
        assert_eq!(form.validate().unwrap().status, AttendanceStatus::Present);
    }

    #[test]
    fn unknown_priority_becomes_medium() {
        let form: TaskForm =
            serde_urlencoded::from_str("title=Lab&subject_id=&priority=urgent").unwrap();
        let task = form.validate().unwrap();
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.subject_id, None);
        assert_eq!(task.due_at, None);
    }

    #[test]
    fn due_dates_accept_dates_and_datetimes() {
        assert_eq!(parse_due_at("2026-09-01").unwrap().as_deref(), Some("2026-09-01"));
        assert_eq!(
            parse_due_at("2026-09-01T18:30:00").unwrap().as_deref(),
            Some("2026-09-01T18:30")
        );
        assert!(parse_due_at("tomorrow").is_err());
    }

    #[test]
    fn links_must_be_web_urls() {
        let form: ResourceForm =
            serde_urlencoded::from_str("title=x&url=javascript%3Aalert(1)").unwrap();
        assert!(form.validate().is_err());
    }
}
