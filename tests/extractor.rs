//! Integration tests for the submit handler.
//!
//! The remote model is replaced by a scripted [`GenerationBackend`] and
//! pdfium by a fake [`PageRasterizer`], so these run everywhere without
//! network access or a pdfium library. Timing uses tokio's paused clock.

use async_trait::async_trait;
use edgequake_invoice::output::{
    IMAGE_PREVIEW_CAPTION, MISSING_UPLOAD_MESSAGE, PDF_PREVIEW_CAPTION, PDF_PREVIEW_NOTICE,
};
use edgequake_invoice::prompts::DEFAULT_SYSTEM_PROMPT;
use edgequake_invoice::{
    ExtractorConfig, GenerationBackend, GenerationError, GenerationRequest, InvoiceError,
    InvoiceExtractor, MessageLevel, PageRasterizer, RemoteError, SubmitRequest, UploadedFile,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Replays scripted outcomes and records every request it receives.
struct StubBackend {
    script: Mutex<VecDeque<Result<String, RemoteError>>>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl StubBackend {
    fn new(script: Vec<Result<String, RemoteError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn answering(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, RemoteError> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::other("no scripted response")))
    }
}

/// Pretends every PDF has `pages` pages.
struct FakePdf {
    pages: usize,
}

impl PageRasterizer for FakePdf {
    fn rasterize(
        &self,
        _pdf: &[u8],
        limit: Option<usize>,
    ) -> Result<Vec<DynamicImage>, InvoiceError> {
        let n = limit.map_or(self.pages, |l| l.min(self.pages));
        Ok((0..n)
            .map(|i| {
                DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([i as u8 * 40, 0, 0])))
            })
            .collect())
    }
}

fn extractor(backend: Arc<StubBackend>, pages: usize) -> InvoiceExtractor {
    let config = ExtractorConfig::builder()
        .backend(backend)
        .rasterizer(Arc::new(FakePdf { pages }))
        .build()
        .expect("valid config");
    InvoiceExtractor::new(config).expect("pre-built backend always resolves")
}

fn pdf_upload() -> UploadedFile {
    UploadedFile::new(b"%PDF-1.7 two page invoice".to_vec(), "application/pdf")
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn two_page_pdf_answer_is_surfaced_unchanged() {
    let answer = "The total is **€1,234.56** (incl. 19% VAT).\n";
    let backend = StubBackend::answering(answer);
    let extractor = extractor(backend.clone(), 2);

    let response = extractor
        .submit(SubmitRequest::new(pdf_upload(), "What is the total?"))
        .await;

    assert_eq!(response.output.as_deref(), Some(answer));
    assert!(response.failure.is_none());
    assert_eq!(response.errors().count(), 0);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.system_prompt, DEFAULT_SYSTEM_PROMPT);
    assert_eq!(sent.query, "What is the total?");
    assert_eq!(sent.images.len(), 2);
    assert!(sent.images.iter().all(|p| p.mime_type == "image/jpeg"));
    assert!(sent.images.iter().all(|p| p.data.starts_with(&[0xFF, 0xD8])));

    let preview = response.preview.expect("PDF submissions carry a preview");
    assert_eq!(preview.caption, PDF_PREVIEW_CAPTION);
    assert_eq!(preview.data, sent.images[0].data);
    assert!(response
        .messages
        .iter()
        .any(|m| m.level == MessageLevel::Info && m.text == PDF_PREVIEW_NOTICE));
}

#[tokio::test(start_paused = true)]
async fn image_upload_is_sent_as_is() {
    let backend = StubBackend::answering("ACME GmbH");
    let extractor = extractor(backend.clone(), 0);
    let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];

    let response = extractor
        .submit(SubmitRequest::new(
            UploadedFile::new(bytes.clone(), "image/jpeg"),
            "Who is the supplier?",
        ))
        .await;

    assert_eq!(response.output.as_deref(), Some("ACME GmbH"));
    let sent = &backend.requests()[0];
    assert_eq!(sent.images.len(), 1);
    assert_eq!(sent.images[0].data, bytes);
    assert_eq!(sent.images[0].mime_type, "image/jpeg");

    let preview = response.preview.expect("image preview");
    assert_eq!(preview.caption, IMAGE_PREVIEW_CAPTION);
    assert_eq!(preview.data, bytes);
}

#[tokio::test]
async fn missing_upload_is_reported() {
    let backend = StubBackend::answering("unused");
    let response = extractor(backend.clone(), 1)
        .submit(SubmitRequest {
            upload: None,
            query: "What is the total?".into(),
        })
        .await;

    assert!(!response.is_success());
    assert_eq!(response.errors().next().unwrap().text, MISSING_UPLOAD_MESSAGE);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn empty_upload_is_reported_without_calling_the_model() {
    let backend = StubBackend::answering("unused");
    let response = extractor(backend.clone(), 1)
        .submit(SubmitRequest::new(UploadedFile::new(Vec::new(), "application/pdf"), "q"))
        .await;

    assert!(!response.is_success());
    assert!(response.preview.is_none());
    assert_eq!(response.errors().next().unwrap().text, "Uploaded file is empty.");
    assert!(backend.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn quota_retries_become_warnings() {
    let backend = StubBackend::new(vec![
        Err(RemoteError::from_message("429 RESOURCE_EXHAUSTED")),
        Err(RemoteError::from_message("429 RESOURCE_EXHAUSTED")),
        Ok("Due 2024-05-31".into()),
    ]);
    let response = extractor(backend.clone(), 1)
        .submit(SubmitRequest::new(pdf_upload(), "When is payment due?"))
        .await;

    assert_eq!(response.output.as_deref(), Some("Due 2024-05-31"));
    let warnings: Vec<&str> = response
        .messages
        .iter()
        .filter(|m| m.level == MessageLevel::Warning)
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(
        warnings,
        vec![
            "Quota exceeded. Retrying in 10 seconds... (attempt 1/3)",
            "Quota exceeded. Retrying in 20 seconds... (attempt 2/3)",
        ]
    );
    assert_eq!(backend.requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_quota_is_a_terminal_error_message() {
    let backend = StubBackend::new(vec![
        Err(RemoteError::quota("quota")),
        Err(RemoteError::quota("quota")),
        Err(RemoteError::quota("quota")),
    ]);
    let response = extractor(backend.clone(), 1)
        .submit(SubmitRequest::new(pdf_upload(), "q"))
        .await;

    assert!(!response.is_success());
    assert_eq!(
        response.failure,
        Some(GenerationError::QuotaExhausted { attempts: 3 })
    );
    let last = response.messages.last().unwrap();
    assert_eq!(last.level, MessageLevel::Error);
    assert!(last.text.contains("quota exhausted"));
}

#[tokio::test(start_paused = true)]
async fn other_remote_error_is_reported_once() {
    let backend = StubBackend::new(vec![Err(RemoteError::from_message(
        "400 INVALID_ARGUMENT: image could not be processed",
    ))]);
    let response = extractor(backend.clone(), 1)
        .submit(SubmitRequest::new(
            UploadedFile::new(b"not an image".to_vec(), "image/png"),
            "q",
        ))
        .await;

    assert!(!response.is_success());
    assert_eq!(backend.requests().len(), 1);
    let errors: Vec<_> = response.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].text,
        "An error occurred: 400 INVALID_ARGUMENT: image could not be processed"
    );
}

#[tokio::test]
async fn custom_system_prompt_is_sent_first() {
    let backend = StubBackend::answering("ok");
    let config = ExtractorConfig::builder()
        .backend(backend.clone())
        .rasterizer(Arc::new(FakePdf { pages: 1 }))
        .system_prompt("Answer in one word.")
        .pacing_delay(std::time::Duration::ZERO)
        .build()
        .unwrap();
    let extractor = assert_ok!(InvoiceExtractor::new(config));

    extractor
        .submit(SubmitRequest::new(UploadedFile::new(vec![1], "image/png"), "Currency?"))
        .await;

    assert_eq!(backend.requests()[0].system_prompt, "Answer in one word.");
}

#[tokio::test]
async fn preview_renders_first_pdf_page_only() {
    let extractor = extractor(StubBackend::answering("unused"), 5);

    let preview = assert_ok!(extractor.preview(&pdf_upload()).await);
    assert_eq!(preview.caption, PDF_PREVIEW_CAPTION);
    assert_eq!(preview.mime_type, "image/jpeg");

    let err = assert_err!(extractor.preview(&UploadedFile::new(Vec::new(), "image/png")).await);
    assert!(matches!(err, InvoiceError::EmptyInput));
}
