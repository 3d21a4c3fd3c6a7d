//! services/api/src/adapters/analysis_llm.rs
//!
//! `DocumentAnalysisService` backed by an OpenAI chat model. Any failure of
//! the model call or its JSON reply falls back to the text heuristics.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use attendance_core::domain::{ExtractedCalendarResult, ExtractedTimetableResult, TimetableEntry};
use attendance_core::heuristics::{self, HeuristicAnalyzer, EXCERPT_CHARS};
use attendance_core::ports::{DocumentAnalysisService, PortResult};
use attendance_core::{TrackerError, TrackerResult};
use serde::Deserialize;
use tracing::{info, warn};

/// Only this many characters of a document are sent to the model.
const PROMPT_CHARS: usize = 4000;

const SYSTEM_PROMPT: &str = "You read academic documents and answer with a single JSON object. \
No prose, no markdown fences.";

const CALENDAR_INSTRUCTIONS: &str = r#"Extract the academic events from this calendar.
Answer with JSON shaped like:
{"events": [{"name": "...", "date": "YYYY-MM-DD", "time": "HH:MM", "type": "lecture|tutorial|lab|exam|holiday|other", "description": "..."}],
 "semester_start": "YYYY-MM-DD", "semester_end": "YYYY-MM-DD", "total_working_days": 0, "confidence_score": 0.0}
Only list real academic events. Skip weekends unless they are stated class days.
Working days exclude weekends and holidays. The confidence score is between 0 and 1."#;

const TIMETABLE_INSTRUCTIONS: &str = r#"Extract the weekly class schedule from this timetable.
Answer with JSON shaped like:
{"timetable_events": [{"subject": "...", "day": "Monday", "time": "HH:MM-HH:MM", "duration": "1 hour", "room": "...", "instructor": "..."}],
 "total_working_days": 0, "confidence_score": 0.0}
The subject is the course name, never a person. Names with titles such as Dr., Prof., Mr. or Ms. are instructors.
Days run Monday to Saturday. Working days are the days that have classes. The confidence score is between 0 and 1."#;

/// The part of a timetable reply we trust; the weekly grouping is rebuilt locally.
#[derive(Deserialize)]
struct TimetableReply {
    #[serde(default)]
    timetable_events: Vec<TimetableEntry>,
    #[serde(default)]
    total_working_days: u32,
    #[serde(default)]
    confidence_score: f64,
}

pub struct OpenAiAnalysisAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    fallback: HeuristicAnalyzer,
}

impl OpenAiAnalysisAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self {
            client,
            model,
            fallback: HeuristicAnalyzer,
        }
    }

    async fn complete(&self, instructions: &str, text: &str) -> TrackerResult<String> {
        let document = heuristics::excerpt(text, PROMPT_CHARS);
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| TrackerError::Format(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(format!("{instructions}\n\nDocument text:\n{document}"))
                    .build()
                    .map_err(|e| TrackerError::Format(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.1)
            .build()
            .map_err(|e| TrackerError::Format(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| TrackerError::Network(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| TrackerError::Format("Model returned no content".to_string()))
    }

    async fn calendar_from_model(&self, text: &str) -> TrackerResult<ExtractedCalendarResult> {
        let reply = self.complete(CALENDAR_INSTRUCTIONS, text).await?;
        let mut result: ExtractedCalendarResult = serde_json::from_str(strip_code_fence(&reply))?;
        result.confidence_score = result.confidence_score.clamp(0.0, 1.0);
        result.extracted_text_excerpt = heuristics::excerpt(text, EXCERPT_CHARS);
        Ok(result)
    }

    async fn timetable_from_model(&self, text: &str) -> TrackerResult<ExtractedTimetableResult> {
        let reply = self.complete(TIMETABLE_INSTRUCTIONS, text).await?;
        let reply: TimetableReply = serde_json::from_str(strip_code_fence(&reply))?;
        Ok(ExtractedTimetableResult {
            weekly_schedule: heuristics::weekly_schedule(&reply.timetable_events),
            timetable_events: reply.timetable_events,
            total_working_days: reply.total_working_days,
            confidence_score: reply.confidence_score.clamp(0.0, 1.0),
            extracted_text_excerpt: heuristics::excerpt(text, EXCERPT_CHARS),
        })
    }
}

/// Models sometimes wrap JSON in a ```json fence despite being told not to.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

#[async_trait]
impl DocumentAnalysisService for OpenAiAnalysisAdapter {
    async fn analyze_calendar(&self, text: &str) -> PortResult<ExtractedCalendarResult> {
        match self.calendar_from_model(text).await {
            Ok(result) => {
                info!("Model found {} calendar events", result.events.len());
                Ok(result)
            }
            Err(e) => {
                warn!("Calendar analysis fell back to heuristics: {}", e);
                self.fallback.analyze_calendar(text).await
            }
        }
    }

    async fn analyze_timetable(&self, text: &str) -> PortResult<ExtractedTimetableResult> {
        match self.timetable_from_model(text).await {
            Ok(result) => {
                info!("Model found {} timetable slots", result.timetable_events.len());
                Ok(result)
            }
            Err(e) => {
                warn!("Timetable analysis fell back to heuristics: {}", e);
                self.fallback.analyze_timetable(text).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_removed() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"b\": 2} "), "{\"b\": 2}");
    }

    #[test]
    fn timetable_reply_ignores_model_grouping() {
        let raw = r#"{"timetable_events": [{"subject": "Physics", "day": "Tuesday"}],
                      "weekly_schedule": {"Tuesday": ["whatever"]},
                      "confidence_score": 0.9}"#;
        let reply: TimetableReply = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.timetable_events.len(), 1);
        assert_eq!(reply.total_working_days, 0);
    }
}
