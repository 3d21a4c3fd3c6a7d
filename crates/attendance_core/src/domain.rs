//! crates/attendance_core/src/domain.rs
//!
//! Defines the core data structures of the tracker: the persisted entities
//! (events, attendance records), the snapshot/export documents built from them,
//! and the transient results produced by document analysis.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Category assigned to events when none is given.
pub const DEFAULT_EVENT_KIND: &str = "lecture";

fn default_event_kind() -> String {
    DEFAULT_EVENT_KIND.to_string()
}

//=========================================================================================
// Persisted Entities
//=========================================================================================

/// An academic occurrence (lecture, lab, exam, holiday...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Open-ended category tag, serialized as `type`.
    #[serde(rename = "type", default = "default_event_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub imported: bool,
}

/// Outcome recorded for a single day. Only `Present` counts toward attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    /// Any user-defined status, kept verbatim.
    #[serde(untagged)]
    Other(String),
}

impl AttendanceStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, AttendanceStatus::Present)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Present => f.write_str("present"),
            AttendanceStatus::Absent => f.write_str("absent"),
            AttendanceStatus::Late => f.write_str("late"),
            AttendanceStatus::Other(s) => f.write_str(s),
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "present" => AttendanceStatus::Present,
            "absent" => AttendanceStatus::Absent,
            "late" => AttendanceStatus::Late,
            _ => AttendanceStatus::Other(s.trim().to_string()),
        })
    }
}

/// One attendance outcome per calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// Store Inputs
//=========================================================================================

/// Input for a manually added event. `date` is kept as text so that missing and
/// malformed dates can be reported as validation failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for marking attendance on a date.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkAttendance {
    #[serde(default)]
    pub date: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

//=========================================================================================
// Snapshot / Export Documents
//=========================================================================================

/// Read-only view of everything the store owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub events: Vec<Event>,
    pub attendance: Vec<AttendanceRecord>,
    pub target_percentage: f64,
}

/// The data export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub events: Vec<Event>,
    pub attendance: Vec<AttendanceRecord>,
    pub target_percentage: f64,
    pub export_date: DateTime<Utc>,
}

/// A document accepted by `RecordStore::restore`. Every field is optional on the
/// wire so that incomplete documents can be rejected with a validation error
/// rather than a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreDocument {
    #[serde(default)]
    pub events: Option<Vec<Event>>,
    #[serde(default)]
    pub attendance: Option<Vec<AttendanceRecord>>,
    #[serde(default)]
    pub target_percentage: Option<f64>,
}

impl From<Snapshot> for RestoreDocument {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            events: Some(snapshot.events),
            attendance: Some(snapshot.attendance),
            target_percentage: Some(snapshot.target_percentage),
        }
    }
}

impl From<ExportDocument> for RestoreDocument {
    fn from(doc: ExportDocument) -> Self {
        Self {
            events: Some(doc.events),
            attendance: Some(doc.attendance),
            target_percentage: Some(doc.target_percentage),
        }
    }
}

//=========================================================================================
// Weekdays
//=========================================================================================

/// A day of the week as it appears in timetables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl ClassDay {
    pub fn name(self) -> &'static str {
        match self {
            ClassDay::Monday => "Monday",
            ClassDay::Tuesday => "Tuesday",
            ClassDay::Wednesday => "Wednesday",
            ClassDay::Thursday => "Thursday",
            ClassDay::Friday => "Friday",
            ClassDay::Saturday => "Saturday",
            ClassDay::Sunday => "Sunday",
        }
    }

    /// Index counted from Sunday = 0, matching `Weekday::num_days_from_sunday`.
    pub fn index_from_sunday(self) -> i64 {
        self.to_weekday().num_days_from_sunday() as i64
    }

    pub fn to_weekday(self) -> Weekday {
        match self {
            ClassDay::Monday => Weekday::Mon,
            ClassDay::Tuesday => Weekday::Tue,
            ClassDay::Wednesday => Weekday::Wed,
            ClassDay::Thursday => Weekday::Thu,
            ClassDay::Friday => Weekday::Fri,
            ClassDay::Saturday => Weekday::Sat,
            ClassDay::Sunday => Weekday::Sun,
        }
    }
}

impl fmt::Display for ClassDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a weekday name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown weekday: {0}")]
pub struct UnknownDay(pub String);

impl FromStr for ClassDay {
    type Err = UnknownDay;

    /// Accepts full names and three-letter abbreviations, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let day = match lowered.as_str() {
            "monday" | "mon" => ClassDay::Monday,
            "tuesday" | "tue" => ClassDay::Tuesday,
            "wednesday" | "wed" => ClassDay::Wednesday,
            "thursday" | "thu" => ClassDay::Thursday,
            "friday" | "fri" => ClassDay::Friday,
            "saturday" | "sat" => ClassDay::Saturday,
            "sunday" | "sun" => ClassDay::Sunday,
            _ => return Err(UnknownDay(s.to_string())),
        };
        Ok(day)
    }
}

//=========================================================================================
// Extraction Results (transient, never persisted)
//=========================================================================================

/// A calendar event proposed by document analysis, not yet imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub name: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A weekly class slot found in a timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub subject: String,
    pub day: ClassDay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
}

pub type WeeklySchedule = BTreeMap<ClassDay, Vec<TimetableEntry>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCalendarResult {
    #[serde(default)]
    pub events: Vec<CandidateEvent>,
    #[serde(default)]
    pub total_working_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester_end: Option<String>,
    #[serde(default)]
    pub confidence_score: f64,
    /// The first characters of the analysed text.
    #[serde(rename = "extracted_text", default)]
    pub extracted_text_excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTimetableResult {
    #[serde(default)]
    pub timetable_events: Vec<TimetableEntry>,
    #[serde(default)]
    pub total_working_days: u32,
    #[serde(default)]
    pub weekly_schedule: WeeklySchedule,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(rename = "extracted_text", default)]
    pub extracted_text_excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCombinedResult {
    pub calendar_events: Vec<CandidateEvent>,
    pub timetable_events: Vec<TimetableEntry>,
    pub total_working_days: u32,
    pub calendar_working_days: u32,
    pub timetable_working_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester_end: Option<String>,
    pub confidence_score: f64,
    pub total_classes: u32,
    pub classes_per_working_day: u32,
    pub weekly_schedule: WeeklySchedule,
}

//=========================================================================================
// Accounts
//=========================================================================================

/// Public profile of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Only used internally for login/register. Contains the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// A bearer token issued at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}
