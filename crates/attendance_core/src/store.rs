//! crates/attendance_core/src/store.rs
//!
//! The record store: owns the event and attendance collections plus the
//! attendance goal, and writes them back to a `KeyValueStore` after every
//! mutation.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    AttendanceRecord, CandidateEvent, ClassDay, Event, ExportDocument, MarkAttendance, NewEvent,
    RestoreDocument, Snapshot, TimetableEntry, DEFAULT_EVENT_KIND,
};
use crate::error::{TrackerError, TrackerResult};
use crate::ports::KeyValueStore;

/// Goal used when nothing has been persisted yet.
pub const DEFAULT_TARGET_PERCENTAGE: f64 = 75.0;

const EVENTS_KEY: &str = "academicEvents";
const ATTENDANCE_KEY: &str = "attendanceRecords";
const GOAL_KEY: &str = "targetPercentage";

/// The persistence keys a store reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub events: String,
    pub attendance: String,
    pub goal: String,
}

impl StoreKeys {
    /// The unscoped keys of a single-user tracker.
    pub fn shared() -> Self {
        Self {
            events: EVENTS_KEY.to_string(),
            attendance: ATTENDANCE_KEY.to_string(),
            goal: GOAL_KEY.to_string(),
        }
    }

    /// Keys scoped to one account, e.g. `academicEvents_alice`.
    pub fn for_user(username: &str) -> Self {
        Self {
            events: format!("{EVENTS_KEY}_{username}"),
            attendance: format!("{ATTENDANCE_KEY}_{username}"),
            goal: format!("{GOAL_KEY}_{username}"),
        }
    }
}

/// Projects a weekday onto the next matching date strictly after `today`.
///
/// A match on today's weekday lands a full week ahead, never on today.
pub fn next_date_for_day(day: ClassDay, today: NaiveDate) -> NaiveDate {
    let current = today.weekday().num_days_from_sunday() as i64;
    let mut days_to_add = day.index_from_sunday() - current;
    if days_to_add <= 0 {
        days_to_add += 7;
    }
    today + Duration::days(days_to_add)
}

pub struct RecordStore {
    kv: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
    events: Vec<Event>,
    attendance: Vec<AttendanceRecord>,
    target_percentage: f64,
}

impl RecordStore {
    /// Loads the three persisted values. Missing keys start empty (goal: 75%).
    pub async fn load(kv: Arc<dyn KeyValueStore>, keys: StoreKeys) -> TrackerResult<Self> {
        let events: Vec<Event> = read_blob(kv.as_ref(), &keys.events).await?.unwrap_or_default();
        let attendance: Vec<AttendanceRecord> = read_blob(kv.as_ref(), &keys.attendance)
            .await?
            .unwrap_or_default();
        let target_percentage: f64 = read_blob(kv.as_ref(), &keys.goal)
            .await?
            .unwrap_or(DEFAULT_TARGET_PERCENTAGE);

        debug!(
            events = events.len(),
            attendance = attendance.len(),
            target_percentage,
            "Loaded record store from {}",
            keys.events
        );

        Ok(Self {
            kv,
            keys,
            events,
            attendance,
            target_percentage,
        })
    }

    pub fn target_percentage(&self) -> f64 {
        self.target_percentage
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn attendance_count(&self) -> usize {
        self.attendance.len()
    }

    /// Events ordered by date (ties keep insertion order).
    pub fn events_by_date(&self) -> Vec<Event> {
        let mut events = self.events.clone();
        events.sort_by_key(|e| e.date);
        events
    }

    /// Attendance records, most recent first.
    pub fn attendance_by_date(&self) -> Vec<AttendanceRecord> {
        let mut records = self.attendance.clone();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            events: self.events.clone(),
            attendance: self.attendance.clone(),
            target_percentage: self.target_percentage,
        }
    }

    pub fn export(&self, export_date: DateTime<Utc>) -> ExportDocument {
        ExportDocument {
            events: self.events.clone(),
            attendance: self.attendance.clone(),
            target_percentage: self.target_percentage,
            export_date,
        }
    }

    //=====================================================================================
    // Events
    //=====================================================================================

    pub async fn add_event(&mut self, input: NewEvent) -> TrackerResult<Event> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(TrackerError::Validation("Event name is required".to_string()));
        }
        let date = parse_required_date(&input.date)?;

        let event = Event {
            id: Uuid::new_v4(),
            name: name.to_string(),
            date,
            time: non_empty(input.time),
            kind: non_empty(input.kind).unwrap_or_else(|| DEFAULT_EVENT_KIND.to_string()),
            description: non_empty(input.description),
            created_at: Utc::now(),
            imported: false,
        };
        let mut events = self.events.clone();
        events.push(event.clone());
        self.commit_events(events).await?;

        debug!(id = %event.id, date = %event.date, "Added event");
        Ok(event)
    }

    /// Imports analysed calendar events, skipping any whose `(date, name)` pair
    /// already exists. Returns the number actually imported.
    pub async fn import_events(&mut self, candidates: &[CandidateEvent]) -> TrackerResult<usize> {
        let mut events = self.events.clone();
        let mut imported = 0;
        for candidate in candidates {
            let Some(event) = imported_event(candidate) else {
                continue;
            };
            let duplicate = events
                .iter()
                .any(|existing| existing.date == event.date && existing.name == event.name);
            if duplicate {
                continue;
            }
            events.push(event);
            imported += 1;
        }

        self.commit_events(events).await?;
        info!(imported, offered = candidates.len(), "Imported calendar events");
        Ok(imported)
    }

    /// Imports timetable slots as lectures on the next date of their weekday.
    /// Every call creates new events; there is no duplicate check on this path.
    pub async fn import_timetable_events(
        &mut self,
        entries: &[TimetableEntry],
        today: NaiveDate,
    ) -> TrackerResult<usize> {
        let mut events = self.events.clone();
        let before = events.len();
        events.extend(entries.iter().filter_map(|entry| timetable_event(entry, today)));
        let imported = events.len() - before;

        self.commit_events(events).await?;
        info!(imported, offered = entries.len(), "Imported timetable events");
        Ok(imported)
    }

    /// Imports both halves of a combined analysis. Neither half is deduplicated.
    pub async fn import_combined(
        &mut self,
        calendar: &[CandidateEvent],
        timetable: &[TimetableEntry],
        today: NaiveDate,
    ) -> TrackerResult<usize> {
        let mut events = self.events.clone();
        let before = events.len();
        events.extend(calendar.iter().filter_map(imported_event));
        events.extend(timetable.iter().filter_map(|entry| timetable_event(entry, today)));
        let imported = events.len() - before;

        self.commit_events(events).await?;
        info!(imported, "Imported combined calendar and timetable events");
        Ok(imported)
    }

    /// Removes an event. Returns `false` when no event has that id.
    pub async fn delete_event(&mut self, id: Uuid) -> TrackerResult<bool> {
        if !self.events.iter().any(|e| e.id == id) {
            return Ok(false);
        }
        let events = self.events.iter().filter(|e| e.id != id).cloned().collect();
        self.commit_events(events).await?;
        debug!(%id, "Deleted event");
        Ok(true)
    }

    //=====================================================================================
    // Attendance
    //=====================================================================================

    /// Records attendance for a date, updating the existing record for that date
    /// in place if there is one.
    pub async fn mark_attendance(&mut self, input: MarkAttendance) -> TrackerResult<AttendanceRecord> {
        let date = parse_required_date(&input.date)?;
        let notes = non_empty(input.notes);

        let mut attendance = self.attendance.clone();
        let record = match attendance.iter_mut().find(|r| r.date == date) {
            Some(existing) => {
                existing.status = input.status;
                existing.notes = notes;
                existing.updated_at = Some(Utc::now());
                debug!(%date, "Updated attendance record");
                existing.clone()
            }
            None => {
                let record = AttendanceRecord {
                    id: Uuid::new_v4(),
                    date,
                    status: input.status,
                    notes,
                    created_at: Utc::now(),
                    updated_at: None,
                };
                attendance.push(record.clone());
                debug!(%date, "Created attendance record");
                record
            }
        };

        self.commit_attendance(attendance).await?;
        Ok(record)
    }

    /// Removes an attendance record. Returns `false` when no record has that id.
    pub async fn delete_attendance(&mut self, id: Uuid) -> TrackerResult<bool> {
        if !self.attendance.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        let attendance = self.attendance.iter().filter(|r| r.id != id).cloned().collect();
        self.commit_attendance(attendance).await?;
        debug!(%id, "Deleted attendance record");
        Ok(true)
    }

    //=====================================================================================
    // Goal
    //=====================================================================================

    pub async fn set_goal(&mut self, percent: f64) -> TrackerResult<()> {
        validate_percentage(percent)?;
        self.commit_goal(percent).await?;
        debug!(percent, "Updated attendance goal");
        Ok(())
    }

    //=====================================================================================
    // Restore
    //=====================================================================================

    /// Replaces every collection with the contents of `doc`.
    ///
    /// Both `events` and `attendance` must be present. The goal is only replaced
    /// when the document carries one.
    pub async fn restore(&mut self, doc: RestoreDocument) -> TrackerResult<()> {
        let (Some(events), Some(attendance)) = (doc.events, doc.attendance) else {
            return Err(TrackerError::Validation(
                "Import document must contain both events and attendance".to_string(),
            ));
        };
        if let Some(percent) = doc.target_percentage {
            validate_percentage(percent)?;
        }

        let mut ids = HashSet::new();
        if !events.iter().all(|e| ids.insert(e.id)) {
            return Err(TrackerError::Validation(
                "Import document contains duplicate event ids".to_string(),
            ));
        }
        let mut dates = HashSet::new();
        if !attendance.iter().all(|r| dates.insert(r.date)) {
            return Err(TrackerError::Validation(
                "Import document contains more than one attendance record per date".to_string(),
            ));
        }

        let events_blob = serde_json::to_string(&events)?;
        let attendance_blob = serde_json::to_string(&attendance)?;
        let goal_blob = doc
            .target_percentage
            .map(|percent| serde_json::to_string(&percent))
            .transpose()?;

        let mut written = Vec::new();
        let mut writes = vec![
            (self.keys.events.clone(), events_blob),
            (self.keys.attendance.clone(), attendance_blob),
        ];
        if let Some(goal_blob) = goal_blob {
            writes.push((self.keys.goal.clone(), goal_blob));
        }
        for (key, blob) in writes {
            if let Err(e) = self.kv.set(&key, &blob).await {
                self.undo_writes(&written).await;
                return Err(e.into());
            }
            written.push(key);
        }

        self.events = events;
        self.attendance = attendance;
        if let Some(percent) = doc.target_percentage {
            self.target_percentage = percent;
        }

        info!(
            events = self.events.len(),
            attendance = self.attendance.len(),
            "Restored record store"
        );
        Ok(())
    }

    //=====================================================================================
    // Persistence
    //=====================================================================================

    // Each commit writes first and only then replaces the in-memory value, so a
    // failed write leaves the store as it was before the call.

    async fn commit_events(&mut self, events: Vec<Event>) -> TrackerResult<()> {
        let blob = serde_json::to_string(&events)?;
        self.kv.set(&self.keys.events, &blob).await?;
        self.events = events;
        Ok(())
    }

    async fn commit_attendance(&mut self, attendance: Vec<AttendanceRecord>) -> TrackerResult<()> {
        let blob = serde_json::to_string(&attendance)?;
        self.kv.set(&self.keys.attendance, &blob).await?;
        self.attendance = attendance;
        Ok(())
    }

    async fn commit_goal(&mut self, percent: f64) -> TrackerResult<()> {
        let blob = serde_json::to_string(&percent)?;
        self.kv.set(&self.keys.goal, &blob).await?;
        self.target_percentage = percent;
        Ok(())
    }

    /// Rewrites the current in-memory value of each key after a partial restore.
    async fn undo_writes(&self, keys: &[String]) {
        for key in keys {
            let blob = if *key == self.keys.events {
                serde_json::to_string(&self.events)
            } else if *key == self.keys.attendance {
                serde_json::to_string(&self.attendance)
            } else {
                serde_json::to_string(&self.target_percentage)
            };
            let restored = match blob {
                Ok(blob) => self.kv.set(key, &blob).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = restored {
                warn!(key = %key, "Could not roll back a partial restore: {}", e);
            }
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

async fn read_blob<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> TrackerResult<Option<T>> {
    match kv.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| TrackerError::Format(format!("Stored value for {key} is corrupt: {e}"))),
        None => Ok(None),
    }
}

fn parse_required_date(raw: &str) -> TrackerResult<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TrackerError::Validation("Date is required".to_string()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| TrackerError::Validation(format!("'{raw}' is not a valid date (expected YYYY-MM-DD)")))
}

fn validate_percentage(percent: f64) -> TrackerResult<()> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(TrackerError::Validation(format!(
            "Target percentage must be between 0 and 100, got {percent}"
        )));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn imported_event(candidate: &CandidateEvent) -> Option<Event> {
    let name = candidate.name.trim();
    let date = match NaiveDate::parse_from_str(candidate.date.trim(), "%Y-%m-%d") {
        Ok(date) if !name.is_empty() => date,
        _ => {
            warn!(name = %candidate.name, date = %candidate.date, "Skipping unusable candidate event");
            return None;
        }
    };
    Some(Event {
        id: Uuid::new_v4(),
        name: name.to_string(),
        date,
        time: non_empty(candidate.time.clone()),
        kind: non_empty(candidate.kind.clone()).unwrap_or_else(|| DEFAULT_EVENT_KIND.to_string()),
        description: non_empty(candidate.description.clone()),
        created_at: Utc::now(),
        imported: true,
    })
}

fn timetable_event(entry: &TimetableEntry, today: NaiveDate) -> Option<Event> {
    let subject = entry.subject.trim();
    if subject.is_empty() {
        warn!(day = %entry.day, "Skipping timetable slot without a subject");
        return None;
    }
    let time = non_empty(entry.time.clone());
    let mut description = format!(
        "{} - {} {}",
        subject,
        entry.day,
        time.as_deref().unwrap_or_default()
    )
    .trim_end()
    .to_string();
    let extras: Vec<&str> = [entry.room.as_deref(), entry.instructor.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if !extras.is_empty() {
        description.push_str(&format!(" ({})", extras.join(", ")));
    }

    Some(Event {
        id: Uuid::new_v4(),
        name: subject.to_string(),
        date: next_date_for_day(entry.day, today),
        time,
        kind: DEFAULT_EVENT_KIND.to_string(),
        description: Some(description),
        created_at: Utc::now(),
        imported: true,
    })
}
