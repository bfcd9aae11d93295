//! Values returned by the submit handler in place of UI widgets.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};

/// Heading shown above a successful answer.
pub const ANSWER_HEADING: &str = "Here’s what I found:";

/// Shown alongside a PDF preview.
pub const PDF_PREVIEW_NOTICE: &str = "Displaying the first page of the uploaded PDF.";

pub const PDF_PREVIEW_CAPTION: &str = "PDF First Page Preview.";
pub const IMAGE_PREVIEW_CAPTION: &str = "Uploaded Image.";

/// Shown when submit is triggered without an upload.
pub const MISSING_UPLOAD_MESSAGE: &str = "Please upload a file first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}

/// The image displayed for an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub caption: String,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Result of one submit action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub preview: Option<Preview>,
    pub messages: Vec<StatusMessage>,
    /// Model output, unchanged. `None` when the submission failed.
    pub output: Option<String>,
    /// Terminal generation failure, when the model call was made and failed.
    pub failure: Option<GenerationError>,
}

impl SubmitResponse {
    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &StatusMessage> {
        self.messages.iter().filter(|m| m.level == MessageLevel::Error)
    }

    pub(crate) fn push(&mut self, message: StatusMessage) {
        self.messages.push(message);
    }
}
