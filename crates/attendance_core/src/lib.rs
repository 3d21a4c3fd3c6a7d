pub mod domain;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod memory;
pub mod ports;
pub mod store;

pub use domain::{
    AttendanceRecord, AttendanceStatus, AuthToken, CandidateEvent, ClassDay, Event,
    ExportDocument, ExtractedCalendarResult, ExtractedCombinedResult, ExtractedTimetableResult,
    MarkAttendance, NewEvent, RestoreDocument, Snapshot, TimetableEntry, User, UserCredentials,
};
pub use engine::{AttendanceReport, AttendanceStats, AttendanceSummary, Streaks};
pub use error::{TrackerError, TrackerResult};
pub use heuristics::HeuristicAnalyzer;
pub use memory::MemoryKeyValueStore;
pub use ports::{
    AccountService, DocumentAnalysisService, KeyValueStore, PortError, PortResult,
    TextExtractionService,
};
pub use store::{next_date_for_day, RecordStore, StoreKeys, DEFAULT_TARGET_PERCENTAGE};
