//! The submit handler: one call per user submission.
//!
//! [`InvoiceExtractor::submit`] takes the upload and the query and returns a
//! [`SubmitResponse`] carrying everything a front end needs to display:
//! the preview image, status messages, and the model's answer. Every failure
//! path ends in an error message on the response; nothing panics and nothing
//! is dropped silently.
//!
//! ## Flow
//!
//! ```text
//! upload + query
//!  ├─ 1. Validate   missing / empty upload → error message
//!  ├─ 2. Normalise  image passthrough, or PDF → one JPEG per page
//!  ├─ 3. Preview    original image, or first rendered PDF page
//!  ├─ 4. Generate   paced, quota-aware retries (warnings per retry)
//!  └─ 5. Respond    answer text, or the terminal error message
//! ```

use crate::backend::resolve_backend;
use crate::config::ExtractorConfig;
use crate::error::{GenerationError, InvoiceError};
use crate::output::{
    Preview, StatusMessage, SubmitResponse, IMAGE_PREVIEW_CAPTION, MISSING_UPLOAD_MESSAGE,
    PDF_PREVIEW_CAPTION, PDF_PREVIEW_NOTICE,
};
use crate::payload::{GenerationRequest, ImagePayload, UploadedFile};
use crate::pipeline::generate::GenerationClient;
use crate::pipeline::normalize::Normalizer;
use crate::progress::{GenerationObserver, NoopObserver, Tee};
use crate::prompts;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One user submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub upload: Option<UploadedFile>,
    pub query: String,
}

impl SubmitRequest {
    pub fn new(upload: UploadedFile, query: impl Into<String>) -> Self {
        Self {
            upload: Some(upload),
            query: query.into(),
        }
    }
}

/// Answers questions about uploaded invoices.
pub struct InvoiceExtractor {
    config: ExtractorConfig,
    normalizer: Normalizer,
    client: GenerationClient,
}

impl InvoiceExtractor {
    /// Build an extractor, resolving the generation backend from `config`.
    ///
    /// # Errors
    /// [`InvoiceError::ProviderNotConfigured`] when no backend can be resolved.
    pub fn new(config: ExtractorConfig) -> Result<Self, InvoiceError> {
        let backend = resolve_backend(&config)?;
        let normalizer = Normalizer::new(&config);
        let client = GenerationClient::new(backend, &config);
        Ok(Self {
            config,
            normalizer,
            client,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Preview image for an upload: the image itself, or the first PDF page.
    pub async fn preview(&self, upload: &UploadedFile) -> Result<Preview, InvoiceError> {
        if upload.is_empty() {
            return Err(InvoiceError::EmptyInput);
        }
        if upload.is_pdf() {
            let first = self.normalizer.first_page(&upload.data).await?;
            Ok(pdf_preview(first))
        } else {
            Ok(image_preview(upload))
        }
    }

    /// Handle one submit action.
    pub async fn submit(&self, request: SubmitRequest) -> SubmitResponse {
        let start = Instant::now();
        let mut response = SubmitResponse::default();

        // ── Step 1: Validate ─────────────────────────────────────────────
        let Some(upload) = request.upload else {
            response.push(StatusMessage::error(MISSING_UPLOAD_MESSAGE));
            return response;
        };

        // ── Step 2: Normalise ────────────────────────────────────────────
        let images = match self
            .normalizer
            .normalize(&upload.data, &upload.mime_type)
            .await
        {
            Ok(images) => images,
            Err(e) => {
                warn!("Upload rejected: {}", e);
                response.push(StatusMessage::error(e.to_string()));
                return response;
            }
        };

        // ── Step 3: Preview ──────────────────────────────────────────────
        // The first normalised page doubles as the PDF preview.
        response.preview = Some(if upload.is_pdf() {
            response.push(StatusMessage::info(PDF_PREVIEW_NOTICE));
            pdf_preview(images[0].clone())
        } else {
            image_preview(&upload)
        });

        // ── Step 4: Generate ─────────────────────────────────────────────
        info!(
            "Submitting {} image(s) with a {}-char query",
            images.len(),
            request.query.len()
        );
        let generation_request = GenerationRequest::new(
            prompts::system_prompt(self.config.system_prompt.as_deref()),
            request.query,
            images,
        );

        let collector = MessageCollector::default();
        let noop = NoopObserver;
        let configured: &dyn GenerationObserver = match self.config.observer {
            Some(ref obs) => obs.as_ref(),
            None => &noop,
        };
        let observer = Tee {
            first: &collector,
            second: configured,
        };
        let result = self
            .client
            .generate_observed(&generation_request, &observer)
            .await;

        // ── Step 5: Respond ──────────────────────────────────────────────
        response.messages.extend(collector.into_messages());
        match result {
            Ok(text) => response.output = Some(text),
            Err(e) => response.failure = Some(e),
        }

        info!(
            "Submission finished in {}ms (success: {})",
            start.elapsed().as_millis(),
            response.is_success()
        );
        response
    }
}

fn pdf_preview(first_page: ImagePayload) -> Preview {
    Preview {
        caption: PDF_PREVIEW_CAPTION.to_string(),
        mime_type: first_page.mime_type,
        data: first_page.data,
    }
}

fn image_preview(upload: &UploadedFile) -> Preview {
    Preview {
        caption: IMAGE_PREVIEW_CAPTION.to_string(),
        mime_type: upload.mime_type.clone(),
        data: upload.data.clone(),
    }
}

/// Turns generation events into status messages for the response.
#[derive(Default)]
struct MessageCollector {
    messages: Mutex<Vec<StatusMessage>>,
}

impl MessageCollector {
    fn record(&self, message: StatusMessage) {
        match self.messages.lock() {
            Ok(mut messages) => messages.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }

    fn into_messages(self) -> Vec<StatusMessage> {
        self.messages
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// User-visible text of a quota retry notification.
pub fn quota_retry_message(wait: Duration, attempt: u32, max_retries: u32) -> String {
    format!(
        "Quota exceeded. Retrying in {} seconds... (attempt {}/{})",
        wait.as_secs(),
        attempt,
        max_retries
    )
}

impl GenerationObserver for MessageCollector {
    fn on_quota_retry(&self, wait: Duration, attempt: u32, max_retries: u32) {
        self.record(StatusMessage::warning(quota_retry_message(
            wait,
            attempt,
            max_retries,
        )));
    }

    fn on_failure(&self, error: &GenerationError) {
        self.record(StatusMessage::error(error.to_string()));
    }
}
