//! crates/attendance_core/src/engine.rs
//!
//! Pure attendance arithmetic over a store snapshot: totals, percentages,
//! classes needed to reach a goal, and attendance streaks.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::Snapshot;
use crate::error::{TrackerError, TrackerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_classes: usize,
    pub attended_classes: usize,
    /// Rounded to the nearest whole percent.
    pub percentage: u32,
    pub remaining_classes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Streaks {
    pub current_streak: usize,
    pub best_streak: usize,
}

/// Everything the dashboard shows for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub stats: AttendanceStats,
    pub classes_needed: usize,
    pub streaks: Streaks,
    pub target_percentage: f64,
    pub goal_met: bool,
}

/// Attendance figures computed from externally supplied class counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceReport {
    pub total_classes: i64,
    pub attended_classes: i64,
    /// Rounded to two decimals.
    pub attendance_percentage: f64,
    pub remaining_classes: i64,
    pub classes_to_attend_for_target: i64,
    pub target_percentage: f64,
}

fn attended(snapshot: &Snapshot) -> usize {
    snapshot
        .attendance
        .iter()
        .filter(|r| r.status.is_present())
        .count()
}

fn ratio_percent(attended: f64, total: f64) -> f64 {
    if total > 0.0 {
        attended / total * 100.0
    } else {
        0.0
    }
}

/// Number of classes that must be attended for `target` percent of `total`.
fn required_classes(target: f64, total: f64) -> f64 {
    (target * total / 100.0).ceil()
}

/// Unrounded attendance percentage of the snapshot. Zero when there are no events.
pub fn current_percentage(snapshot: &Snapshot) -> f64 {
    ratio_percent(attended(snapshot) as f64, snapshot.events.len() as f64)
}

pub fn stats(snapshot: &Snapshot) -> AttendanceStats {
    let total_classes = snapshot.events.len();
    let attended_classes = attended(snapshot);
    AttendanceStats {
        total_classes,
        attended_classes,
        percentage: current_percentage(snapshot).round() as u32,
        remaining_classes: total_classes.saturating_sub(attended_classes),
    }
}

/// Classes still to attend for the snapshot to reach `target_percentage`.
///
/// Uses the current event count as a fixed denominator: classes added later are
/// not anticipated.
pub fn classes_needed(snapshot: &Snapshot, target_percentage: f64) -> usize {
    if current_percentage(snapshot) >= target_percentage {
        return 0;
    }
    let needed = required_classes(target_percentage, snapshot.events.len() as f64);
    let attended = attended(snapshot) as f64;
    (needed - attended).max(0.0) as usize
}

/// Current and best runs of consecutive `present` days.
///
/// The current streak only counts when the latest present day is `today` or the
/// day before.
pub fn streaks(snapshot: &Snapshot, today: NaiveDate) -> Streaks {
    let mut dates: Vec<NaiveDate> = snapshot
        .attendance
        .iter()
        .filter(|r| r.status.is_present())
        .map(|r| r.date)
        .collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));

    let Some(&most_recent) = dates.first() else {
        return Streaks::default();
    };

    let consecutive = |pair: &[NaiveDate]| (pair[0] - pair[1]).num_days() == 1;

    let current_streak = if (today - most_recent).num_days() <= 1 {
        1 + dates.windows(2).take_while(|pair| consecutive(pair)).count()
    } else {
        0
    };

    let mut best_streak = 1;
    let mut run = 1;
    for pair in dates.windows(2) {
        if consecutive(pair) {
            run += 1;
            best_streak = best_streak.max(run);
        } else {
            run = 1;
        }
    }

    Streaks {
        current_streak,
        best_streak,
    }
}

pub fn summary(snapshot: &Snapshot, today: NaiveDate) -> AttendanceSummary {
    let target_percentage = snapshot.target_percentage;
    AttendanceSummary {
        stats: stats(snapshot),
        classes_needed: classes_needed(snapshot, target_percentage),
        streaks: streaks(snapshot, today),
        target_percentage,
        goal_met: current_percentage(snapshot) >= target_percentage,
    }
}

fn validate_target(target_percentage: f64) -> TrackerResult<()> {
    if !(0.0..=100.0).contains(&target_percentage) {
        return Err(TrackerError::Validation(
            "Target percentage must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

fn report(attended_classes: i64, target_percentage: f64, total_classes: i64) -> AttendanceReport {
    let percentage = ratio_percent(attended_classes as f64, total_classes as f64);
    let classes_to_attend_for_target = if percentage >= target_percentage {
        0
    } else {
        let needed = required_classes(target_percentage, total_classes as f64) as i64;
        (needed - attended_classes).max(0)
    };

    AttendanceReport {
        total_classes,
        attended_classes,
        attendance_percentage: (percentage * 100.0).round() / 100.0,
        remaining_classes: (total_classes - attended_classes).max(0),
        classes_to_attend_for_target,
        target_percentage,
    }
}

/// Attendance against a class total derived elsewhere (e.g. working days times
/// classes per day) rather than the event count.
pub fn combined_attendance(
    attended_classes: i64,
    target_percentage: f64,
    total_classes: i64,
) -> TrackerResult<AttendanceReport> {
    if total_classes <= 0 {
        return Err(TrackerError::Validation("No classes found in the data".to_string()));
    }
    if attended_classes < 0 {
        return Err(TrackerError::Validation(
            "Attended classes cannot be negative".to_string(),
        ));
    }
    validate_target(target_percentage)?;
    Ok(report(attended_classes, target_percentage, total_classes))
}

/// Like [`combined_attendance`] but tolerates a zero total, reporting 0%.
pub fn attendance_for_counts(
    total_classes: i64,
    attended_classes: i64,
    target_percentage: f64,
) -> TrackerResult<AttendanceReport> {
    if total_classes < 0 || attended_classes < 0 {
        return Err(TrackerError::Validation("Invalid class counts".to_string()));
    }
    validate_target(target_percentage)?;
    Ok(report(attended_classes, target_percentage, total_classes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttendanceRecord, AttendanceStatus, Event};
    use chrono::Utc;
    use uuid::Uuid;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn event(day: u32) -> Event {
        Event {
            id: Uuid::new_v4(),
            name: format!("Lecture {day}"),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            time: None,
            kind: "lecture".to_string(),
            description: None,
            created_at: Utc::now(),
            imported: false,
        }
    }

    fn record(on: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            date: date(on),
            status,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn snapshot(events: usize, attendance: Vec<AttendanceRecord>, target: f64) -> Snapshot {
        Snapshot {
            events: (1..=events as u32).map(event).collect(),
            attendance,
            target_percentage: target,
        }
    }

    fn present_on(days: &[&str]) -> Vec<AttendanceRecord> {
        days.iter()
            .map(|d| record(d, AttendanceStatus::Present))
            .collect()
    }

    #[test]
    fn empty_snapshot_has_zero_percentage() {
        let s = snapshot(0, present_on(&["2024-01-01"]), 75.0);
        let stats = stats(&s);
        assert_eq!(stats.total_classes, 0);
        assert_eq!(stats.attended_classes, 1);
        assert_eq!(stats.percentage, 0);
        assert_eq!(stats.remaining_classes, 0);
    }

    #[test]
    fn ten_events_six_present_one_absent() {
        let mut attendance = present_on(&[
            "2024-01-01",
            "2024-01-02",
            "2024-01-03",
            "2024-01-04",
            "2024-01-05",
            "2024-01-06",
        ]);
        attendance.push(record("2024-01-07", AttendanceStatus::Absent));
        let s = snapshot(10, attendance, 75.0);

        assert_eq!(
            stats(&s),
            AttendanceStats {
                total_classes: 10,
                attended_classes: 6,
                percentage: 60,
                remaining_classes: 4,
            }
        );
        assert_eq!(classes_needed(&s, 75.0), 2);
    }

    #[test]
    fn classes_needed_is_zero_once_goal_is_met() {
        let s = snapshot(4, present_on(&["2024-01-01", "2024-01-02", "2024-01-03"]), 75.0);
        for target in [0.0, 50.0, 74.9, 75.0] {
            assert_eq!(classes_needed(&s, target), 0, "target {target}");
        }
        assert_eq!(classes_needed(&s, 100.0), 1);
    }

    #[test]
    fn classes_needed_avoids_float_overshoot() {
        // 70% of 10 is exactly 7; a naive 0.7 * 10 would round up to 8.
        let s = snapshot(10, present_on(&["2024-01-01"]), 70.0);
        assert_eq!(classes_needed(&s, 70.0), 6);
    }

    #[test]
    fn late_and_custom_statuses_do_not_count() {
        let s = snapshot(
            3,
            vec![
                record("2024-01-01", AttendanceStatus::Late),
                record("2024-01-02", AttendanceStatus::Other("excused".to_string())),
                record("2024-01-03", AttendanceStatus::Present),
            ],
            75.0,
        );
        assert_eq!(stats(&s).attended_classes, 1);
        assert_eq!(stats(&s).percentage, 33);
    }

    #[test]
    fn streaks_follow_consecutive_present_days() {
        let s = snapshot(
            0,
            present_on(&["2024-01-05", "2024-01-04", "2024-01-03", "2024-01-01"]),
            75.0,
        );

        let on_last_day = streaks(&s, date("2024-01-05"));
        assert_eq!(on_last_day, Streaks { current_streak: 3, best_streak: 3 });

        assert_eq!(streaks(&s, date("2024-01-06")).current_streak, 3);
        assert_eq!(streaks(&s, date("2024-01-07")).current_streak, 0);
        assert_eq!(streaks(&s, date("2024-01-07")).best_streak, 3);
    }

    #[test]
    fn streaks_ignore_absences_and_input_order() {
        let mut attendance = present_on(&["2024-01-01", "2024-01-03", "2024-01-02"]);
        attendance.push(record("2024-01-04", AttendanceStatus::Absent));
        let s = snapshot(0, attendance, 75.0);

        let result = streaks(&s, date("2024-01-04"));
        assert_eq!(result.best_streak, 3);
        assert_eq!(result.current_streak, 3);
    }

    #[test]
    fn streaks_without_present_records() {
        let s = snapshot(0, vec![record("2024-01-01", AttendanceStatus::Absent)], 75.0);
        assert_eq!(streaks(&s, date("2024-01-01")), Streaks::default());
    }

    #[test]
    fn best_streak_can_be_older_than_current() {
        let s = snapshot(
            0,
            present_on(&["2024-01-10", "2024-01-04", "2024-01-03", "2024-01-02", "2024-01-01"]),
            75.0,
        );
        let result = streaks(&s, date("2024-01-10"));
        assert_eq!(result.current_streak, 1);
        assert_eq!(result.best_streak, 4);
    }

    #[test]
    fn summary_reports_goal_status() {
        let s = snapshot(4, present_on(&["2024-01-01", "2024-01-02", "2024-01-03"]), 75.0);
        let summary = summary(&s, date("2024-01-03"));
        assert!(summary.goal_met);
        assert_eq!(summary.classes_needed, 0);
        assert_eq!(summary.streaks.current_streak, 3);
    }

    #[test]
    fn combined_attendance_uses_supplied_total() {
        let report = combined_attendance(40, 75.0, 60).unwrap();
        assert_eq!(report.total_classes, 60);
        assert_eq!(report.attendance_percentage, 66.67);
        assert_eq!(report.remaining_classes, 20);
        assert_eq!(report.classes_to_attend_for_target, 5);

        let met = combined_attendance(50, 75.0, 60).unwrap();
        assert_eq!(met.classes_to_attend_for_target, 0);
    }

    #[test]
    fn combined_attendance_rejects_bad_input() {
        assert!(matches!(combined_attendance(1, 75.0, 0), Err(TrackerError::Validation(_))));
        assert!(matches!(combined_attendance(-1, 75.0, 10), Err(TrackerError::Validation(_))));
        assert!(matches!(combined_attendance(1, 100.5, 10), Err(TrackerError::Validation(_))));
    }

    #[test]
    fn counts_tolerate_zero_total() {
        let report = attendance_for_counts(0, 0, 75.0).unwrap();
        assert_eq!(report.attendance_percentage, 0.0);
        assert_eq!(report.classes_to_attend_for_target, 0);
        assert!(attendance_for_counts(-1, 0, 75.0).is_err());
    }
}
