use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::attendance::AttendanceProjection;

pub const DEFAULT_TARGET_ATTENDANCE: f64 = 75.0;

pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub target_attendance: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub target_attendance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimetableEntry {
    pub id: i64,
    pub subject_id: i64,
    pub subject_name: String,
    pub subject_code: String,
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct NewTimetableEntry {
    pub subject_id: i64,
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Done => "done",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            TaskStatus::Todo => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }
}

/// Which tasks a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    Todo,
    Done,
    All,
}

impl TaskFilter {
    /// Unknown values fall back to the open-task view.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::Todo => "todo",
            TaskFilter::Done => "done",
            TaskFilter::All => "all",
        }
    }

    pub fn status(&self) -> Option<TaskStatus> {
        match self {
            TaskFilter::Todo => Some(TaskStatus::Todo),
            TaskFilter::Done => Some(TaskStatus::Done),
            TaskFilter::All => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

macro_rules! lowercase_from_str {
    ($ty:ty, $kind:literal, { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: value.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lowercase_from_str!(AttendanceStatus, "attendance status", {
    "present" => AttendanceStatus::Present,
    "absent" => AttendanceStatus::Absent,
});

lowercase_from_str!(TaskPriority, "task priority", {
    "low" => TaskPriority::Low,
    "medium" => TaskPriority::Medium,
    "high" => TaskPriority::High,
});

lowercase_from_str!(TaskStatus, "task status", {
    "todo" => TaskStatus::Todo,
    "done" => TaskStatus::Done,
});

lowercase_from_str!(TaskFilter, "task filter", {
    "todo" => TaskFilter::Todo,
    "done" => TaskFilter::Done,
    "all" => TaskFilter::All,
});

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub subject_id: i64,
    pub subject_name: String,
    pub subject_code: String,
    pub class_date: NaiveDate,
    pub status: AttendanceStatus,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub subject_id: i64,
    pub class_date: NaiveDate,
    pub status: AttendanceStatus,
    pub note: String,
}

/// One row of the per-subject attendance summary, with its projection.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectAttendance {
    pub subject_id: i64,
    pub subject_code: String,
    pub subject_name: String,
    pub total_classes: u32,
    pub present_classes: u32,
    pub target_attendance: f64,
    #[serde(flatten)]
    pub projection: AttendanceProjection,
}

impl SubjectAttendance {
    pub fn below_target(&self) -> bool {
        self.total_classes > 0 && self.projection.percentage < self.target_attendance
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub subject_name: Option<String>,
    pub subject_code: Option<String>,
    pub title: String,
    pub due_at: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub subject_id: Option<i64>,
    pub title: String,
    pub due_at: Option<String>,
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub subject_name: Option<String>,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub subject_id: Option<i64>,
    pub title: String,
    pub url: String,
    pub tags: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodingLog {
    pub id: i64,
    pub log_date: NaiveDate,
    pub platform: String,
    pub problem: String,
    pub difficulty: String,
    pub topic: String,
    pub link: String,
}

#[derive(Debug, Clone)]
pub struct NewCodingLog {
    pub log_date: NaiveDate,
    pub platform: String,
    pub problem: String,
    pub difficulty: String,
    pub topic: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountSummary {
    pub key: String,
    pub count: usize,
}

pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
