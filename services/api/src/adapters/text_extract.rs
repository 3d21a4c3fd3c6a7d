//! services/api/src/adapters/text_extract.rs
//!
//! `TextExtractionService` for uploaded calendars and timetables.
//! PDFs go through `pdf_extract`, plain text is decoded as UTF-8. Images are
//! accepted but yield no text since no OCR engine is wired in.

use async_trait::async_trait;
use attendance_core::ports::{PortError, PortResult, TextExtractionService};
use tracing::{debug, warn};

/// The upload kinds this extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Image,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::PlainText),
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentTextExtractor;

#[async_trait]
impl TextExtractionService for DocumentTextExtractor {
    async fn extract_text(&self, file_name: &str, data: &[u8]) -> PortResult<String> {
        let kind = DocumentKind::from_file_name(file_name).ok_or_else(|| {
            PortError::Unexpected(format!("Unsupported file type: {file_name}"))
        })?;

        match kind {
            DocumentKind::Pdf => {
                let bytes = data.to_vec();
                // pdf_extract can panic on malformed input.
                let outcome = tokio::task::spawn_blocking(move || {
                    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
                })
                .await
                .map_err(|e| PortError::Unexpected(format!("PDF worker failed: {e}")))?;

                let text = outcome
                    .map_err(|_| PortError::Unexpected("PDF parser crashed".to_string()))?
                    .map_err(|e| PortError::Unexpected(format!("Could not read PDF: {e}")))?;
                debug!("Extracted {} chars from PDF '{}'", text.len(), file_name);
                Ok(text)
            }
            DocumentKind::PlainText => Ok(String::from_utf8_lossy(data).into_owned()),
            DocumentKind::Image => {
                warn!("No OCR available, '{}' yields no text", file_name);
                Ok(String::new())
            }
        }
    }
}
