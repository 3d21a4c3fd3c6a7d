//! crates/attendance_core/src/heuristics.rs
//!
//! Text-pattern analysis of extracted calendar and timetable documents.
//!
//! These heuristics are deliberately simple. The calendar working-day estimate
//! in particular must keep producing the same numbers as earlier releases,
//! because stored results and user expectations depend on it.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use crate::domain::{
    CandidateEvent, ClassDay, ExtractedCalendarResult, ExtractedCombinedResult,
    ExtractedTimetableResult, TimetableEntry, WeeklySchedule, DEFAULT_EVENT_KIND,
};
use crate::ports::{DocumentAnalysisService, PortResult};

/// Characters of source text echoed back in analysis results.
pub const EXCERPT_CHARS: usize = 1000;

const PLAUSIBLE_WORKING_DAYS: RangeInclusive<u32> = 30..=200;
const ESTIMATED_WORKING_DAYS: RangeInclusive<usize> = 60..=120;
const DERIVED_CONFIDENCE: f64 = 0.7;
const FALLBACK_CONFIDENCE: f64 = 0.3;
const TIMETABLE_CONFIDENCE: f64 = 0.3;
const DEFAULT_SLOT: &str = "09:00-10:00";

const ACADEMIC_KEYWORDS: &[&str] = &[
    "academic",
    "semester",
    "calendar",
    "instruction",
    "classes",
    "lecture",
    "term",
];

const SUBJECT_KEYWORDS: &[&str] = &[
    "math",
    "physics",
    "chemistry",
    "biology",
    "computer",
    "english",
    "history",
    "geography",
    "economics",
    "science",
    "literature",
    "programming",
    "calculus",
    "algebra",
    "statistics",
];

const PERSON_TITLES: &[&str] = &["dr.", "prof.", "mr.", "ms.", "mrs.", "miss"];

/// Ordered: the first pattern yielding a plausible count wins.
static WORKING_DAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)academic\s+instruction\s+duration.*?(\d+)\s*days",
        r"(?i)(\d+)\s*(?:total\s+)?working\s+days",
        r"(?i)working\s+days\s*[:\-]?\s*(\d+)",
        r"(?i)(\d+)\s*(?:instructional|teaching)\s+days",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("working day pattern is valid"))
    .collect()
});

static INSTRUCTION_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)Academic Instruction Duration.*?(\d{1,2} [A-Za-z]+ \d{4}) \([A-Za-z]+\) (\d{1,2} [A-Za-z]+ \d{4}) \([A-Za-z]+\) (\d+) Days",
    )
    .expect("instruction block pattern is valid")
});

static DAY_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(monday|mon|tuesday|tue|wednesday|wed|thursday|thu|friday|fri|saturday|sat)\b")
        .expect("day pattern is valid")
});

static TIME_SLOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}:\d{2}(?:\s*-\s*\d{1,2}:\d{2})?").expect("time pattern is valid")
});

static ROOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(room|lab|hall)\s+([a-z0-9-]+)").expect("room pattern is valid")
});

//=========================================================================================
// Calendar
//=========================================================================================

/// Estimates the number of working days in an academic calendar.
///
/// Returns the first count in 30..=200 found by the ordered patterns. Without a
/// match, text that looks academic gets `len / 100` clamped to 60..=120 days;
/// anything else gets 0.
pub fn estimate_working_days(text: &str) -> u32 {
    for pattern in WORKING_DAY_PATTERNS.iter() {
        let found = pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .find(|days| PLAUSIBLE_WORKING_DAYS.contains(days));
        if let Some(days) = found {
            return days;
        }
    }

    let lowered = text.to_lowercase();
    if ACADEMIC_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        let estimate = (text.chars().count() / 100)
            .clamp(*ESTIMATED_WORKING_DAYS.start(), *ESTIMATED_WORKING_DAYS.end());
        return estimate as u32;
    }
    0
}

/// Generates one candidate per non-Sunday date of every instruction block whose
/// date range agrees (within two days) with its stated day count.
pub fn class_days_from_instruction_blocks(text: &str) -> Vec<CandidateEvent> {
    let mut events = Vec::new();
    for caps in INSTRUCTION_BLOCK.captures_iter(text) {
        let parsed = (
            NaiveDate::parse_from_str(&caps[1], "%d %B %Y"),
            NaiveDate::parse_from_str(&caps[2], "%d %B %Y"),
            caps[3].parse::<i64>(),
        );
        let (Ok(start), Ok(end), Ok(stated)) = parsed else {
            continue;
        };
        let span = (end - start).num_days();
        if !(0..=731).contains(&span) {
            continue;
        }

        let class_days: Vec<NaiveDate> = (0..=span)
            .map(|offset| start + Duration::days(offset))
            .filter(|d| d.weekday() != Weekday::Sun)
            .collect();
        if (class_days.len() as i64 - stated).abs() > 2 {
            continue;
        }

        let numbered_from = events.len();
        events.extend(class_days.iter().enumerate().map(|(i, d)| CandidateEvent {
            name: format!("Class Day {}", numbered_from + i + 1),
            date: d.format("%Y-%m-%d").to_string(),
            time: None,
            kind: Some(DEFAULT_EVENT_KIND.to_string()),
            description: Some("Regular class (auto-generated)".to_string()),
        }));
    }
    events
}

pub fn analyze_calendar_text(text: &str) -> ExtractedCalendarResult {
    let total_working_days = estimate_working_days(text);
    ExtractedCalendarResult {
        events: class_days_from_instruction_blocks(text),
        total_working_days,
        semester_start: None,
        semester_end: None,
        confidence_score: if total_working_days > 0 {
            DERIVED_CONFIDENCE
        } else {
            FALLBACK_CONFIDENCE
        },
        extracted_text_excerpt: excerpt(text, EXCERPT_CHARS),
    }
}

//=========================================================================================
// Timetable
//=========================================================================================

pub fn analyze_timetable_text(text: &str) -> ExtractedTimetableResult {
    let mut timetable_events = Vec::new();

    for line in text.lines() {
        let days: BTreeSet<ClassDay> = DAY_WORD
            .find_iter(line)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        if days.is_empty() || line.split_whitespace().count() < 2 {
            continue;
        }
        let slot = parse_slot_line(line);
        for day in days {
            timetable_events.push(TimetableEntry {
                day,
                ..slot.clone()
            });
        }
    }

    let weekly_schedule = weekly_schedule(&timetable_events);
    ExtractedTimetableResult {
        total_working_days: weekly_schedule.len() as u32,
        timetable_events,
        weekly_schedule,
        confidence_score: TIMETABLE_CONFIDENCE,
        extracted_text_excerpt: excerpt(text, EXCERPT_CHARS),
    }
}

/// Reads subject, time, room, and instructor from one timetable line. The
/// returned entry's `day` is a placeholder the caller overwrites.
fn parse_slot_line(line: &str) -> TimetableEntry {
    let lowered = line.to_lowercase();

    let time = TIME_SLOT
        .find(line)
        .map(|m| m.as_str().split_whitespace().collect::<String>())
        .unwrap_or_else(|| DEFAULT_SLOT.to_string());

    let room = ROOM
        .captures(line)
        .map(|caps| format!("{} {}", title_case(&caps[1]), &caps[2]));

    let tokens: Vec<&str> = line
        .split_whitespace()
        .filter(|t| !DAY_WORD.is_match(t) && !TIME_SLOT.is_match(t) && *t != "-")
        .collect();

    let instructor = tokens
        .iter()
        .position(|t| PERSON_TITLES.contains(&t.to_lowercase().as_str()))
        .map(|i| {
            let name: Vec<String> = tokens[i..tokens.len().min(i + 2)]
                .iter()
                .map(|t| title_case(t))
                .collect();
            name.join(" ")
        });

    let keyword = SUBJECT_KEYWORDS
        .iter()
        .find(|k| lowered.contains(*k))
        .map(|k| title_case(k));
    let subject = keyword
        .or_else(|| {
            tokens
                .first()
                .filter(|t| !PERSON_TITLES.contains(&t.to_lowercase().as_str()))
                .map(|t| title_case(t))
        })
        .unwrap_or_else(|| "Subject".to_string());

    TimetableEntry {
        subject,
        day: ClassDay::Monday,
        time: Some(time),
        duration: Some("1 hour".to_string()),
        room,
        instructor,
    }
}

pub fn weekly_schedule(entries: &[TimetableEntry]) -> WeeklySchedule {
    let mut schedule = WeeklySchedule::new();
    for entry in entries {
        schedule.entry(entry.day).or_default().push(entry.clone());
    }
    schedule
}

//=========================================================================================
// Combination
//=========================================================================================

/// Merges a calendar and a timetable analysis into class totals.
///
/// Classes per working day is the integer average over days that have classes;
/// total classes is working days times that average, or just the working days
/// when the timetable is empty.
pub fn combine(
    calendar: ExtractedCalendarResult,
    timetable: ExtractedTimetableResult,
) -> ExtractedCombinedResult {
    let days_with_classes = timetable
        .weekly_schedule
        .values()
        .filter(|classes| !classes.is_empty())
        .count() as u32;
    let classes_in_week: u32 = timetable
        .weekly_schedule
        .values()
        .map(|classes| classes.len() as u32)
        .sum();
    let classes_per_working_day = classes_in_week.checked_div(days_with_classes).unwrap_or(0);

    let calendar_working_days = calendar.total_working_days;
    let total_classes = if classes_per_working_day > 0 {
        calendar_working_days * classes_per_working_day
    } else {
        calendar_working_days
    };

    ExtractedCombinedResult {
        calendar_events: calendar.events,
        timetable_events: timetable.timetable_events,
        total_working_days: calendar_working_days,
        calendar_working_days,
        timetable_working_days: days_with_classes,
        semester_start: calendar.semester_start,
        semester_end: calendar.semester_end,
        confidence_score: (calendar.confidence_score + timetable.confidence_score) / 2.0,
        total_classes,
        classes_per_working_day,
        weekly_schedule: timetable.weekly_schedule,
    }
}

//=========================================================================================
// Port Implementation
//=========================================================================================

/// `DocumentAnalysisService` backed only by the text heuristics above.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

#[async_trait]
impl DocumentAnalysisService for HeuristicAnalyzer {
    async fn analyze_calendar(&self, text: &str) -> PortResult<ExtractedCalendarResult> {
        Ok(analyze_calendar_text(text))
    }

    async fn analyze_timetable(&self, text: &str) -> PortResult<ExtractedTimetableResult> {
        Ok(analyze_timetable_text(text))
    }
}

pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn title_case(word: &str) -> String {
    word.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_duration_wins() {
        let text = "Academic Instruction Duration (Regular Classes) VII 2 June 2025 (Monday) \
                    23 August 2025 (Saturday) 70 Days\nReserve 12 working days";
        assert_eq!(estimate_working_days(text), 70);
    }

    #[test]
    fn counts_outside_plausible_range_are_skipped() {
        assert_eq!(estimate_working_days("Only 12 working days, then 95 working days"), 95);
        assert_eq!(estimate_working_days("Working days: 140"), 140);
        assert_eq!(estimate_working_days("450 working days"), 0);
    }

    #[test]
    fn keyword_estimate_is_clamped() {
        let short = "Academic calendar for the spring semester";
        assert_eq!(estimate_working_days(short), 60);

        let long = format!("Academic calendar {}", "x".repeat(20_000));
        assert_eq!(estimate_working_days(&long), 120);

        let middle = format!("semester {}", "y".repeat(8_991));
        assert_eq!(estimate_working_days(&middle), 90);
    }

    #[test]
    fn unrelated_text_has_no_working_days() {
        let result = analyze_calendar_text("grocery list: eggs, milk");
        assert_eq!(result.total_working_days, 0);
        assert_eq!(result.confidence_score, 0.3);
        assert!(result.events.is_empty());
    }

    #[test]
    fn derived_values_report_higher_confidence() {
        let result = analyze_calendar_text("The term has 100 working days.");
        assert_eq!(result.total_working_days, 100);
        assert_eq!(result.confidence_score, 0.7);
    }

    #[test]
    fn excerpt_is_limited() {
        let text = "é".repeat(EXCERPT_CHARS + 10);
        let result = analyze_calendar_text(&text);
        assert_eq!(result.extracted_text_excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn instruction_block_generates_class_days() {
        // 2 June 2025 is a Monday; two weeks minus Sundays is 12 days.
        let text = "Academic Instruction Duration (Regular Classes) 2 June 2025 (Monday) \
                    14 June 2025 (Saturday) 12 Days";
        let events = class_days_from_instruction_blocks(text);
        assert_eq!(events.len(), 12);
        assert_eq!(events[0].name, "Class Day 1");
        assert_eq!(events[0].date, "2025-06-02");
        assert!(events.iter().all(|e| e.date != "2025-06-08"));
    }

    #[test]
    fn mismatched_instruction_block_is_ignored() {
        let text = "Academic Instruction Duration 2 June 2025 (Monday) 14 June 2025 (Saturday) 40 Days";
        assert!(class_days_from_instruction_blocks(text).is_empty());
    }

    #[test]
    fn timetable_lines_become_entries() {
        let text = "Monday 9:00-10:00 Dr. Smith Mathematics Room 101\n\
                    Tuesday 10:00-11:00 Prof. Johnson Physics Lab 2\n\
                    Friday Chemistry\n\
                    Lunch break";
        let result = analyze_timetable_text(text);

        assert_eq!(result.timetable_events.len(), 3);
        assert_eq!(result.total_working_days, 3);
        assert_eq!(result.confidence_score, 0.3);

        let monday = &result.weekly_schedule[&ClassDay::Monday][0];
        assert_eq!(monday.subject, "Math");
        assert_eq!(monday.time.as_deref(), Some("9:00-10:00"));
        assert_eq!(monday.room.as_deref(), Some("Room 101"));
        assert_eq!(monday.instructor.as_deref(), Some("Dr. Smith"));

        let friday = &result.weekly_schedule[&ClassDay::Friday][0];
        assert_eq!(friday.subject, "Chemistry");
        assert_eq!(friday.time.as_deref(), Some("09:00-10:00"));
        assert!(friday.instructor.is_none());
    }

    #[test]
    fn unknown_subject_falls_back_to_first_word() {
        let result = analyze_timetable_text("Wed 11:00 Pottery studio");
        assert_eq!(result.timetable_events[0].subject, "Pottery");
        assert_eq!(result.timetable_events[0].day, ClassDay::Wednesday);
    }

    #[test]
    fn combine_multiplies_working_days_by_daily_classes() {
        let calendar = ExtractedCalendarResult {
            events: Vec::new(),
            total_working_days: 90,
            semester_start: None,
            semester_end: None,
            confidence_score: 0.7,
            extracted_text_excerpt: String::new(),
        };
        let timetable = analyze_timetable_text(
            "Monday Math\nMonday Physics\nMonday Biology\nTuesday History\nTuesday English\nTuesday Algebra",
        );

        let combined = combine(calendar.clone(), timetable);
        assert_eq!(combined.classes_per_working_day, 3);
        assert_eq!(combined.total_classes, 270);
        assert_eq!(combined.timetable_working_days, 2);
        assert_eq!(combined.total_working_days, 90);
        assert!((combined.confidence_score - 0.5).abs() < 1e-9);

        let empty = combine(calendar, analyze_timetable_text(""));
        assert_eq!(empty.classes_per_working_day, 0);
        assert_eq!(empty.total_classes, 90);
    }

    #[tokio::test]
    async fn heuristic_analyzer_implements_the_port() {
        let analyzer = HeuristicAnalyzer;
        let calendar = analyzer.analyze_calendar("65 working days").await.unwrap();
        assert_eq!(calendar.total_working_days, 65);
        let timetable = analyzer.analyze_timetable("Sat 8:00 Statistics").await.unwrap();
        assert_eq!(timetable.timetable_events[0].day, ClassDay::Saturday);
    }
}
