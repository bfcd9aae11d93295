//! Error types for the edgequake-invoice library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`InvoiceError`]: **Fatal** for the current submission before any model
//!   call is made: empty upload, undecodable PDF, provider not configured,
//!   invalid configuration.
//!
//! * [`RemoteError`]: a single failed call to the generation endpoint,
//!   tagged with a [`RemoteErrorKind`]. The retry loop in
//!   [`crate::pipeline::generate`] branches on the kind, never on the text.
//!
//! * [`GenerationError`]: the terminal outcome of a generation that did not
//!   produce text. Only two exist: a non-retryable remote error, or every
//!   attempt exhausted by quota errors.

use edgequake_llm::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-invoice library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded content has zero bytes.
    #[error("Uploaded file is empty.")]
    EmptyInput,

    /// Input file was not found at the given path.
    #[error("Invoice file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not one of the accepted upload types.
    #[error("Unsupported file type '{extension}' for '{path}'\nAccepted: jpg, jpeg, png, pdf.")]
    UnsupportedFileType { path: PathBuf, extension: String },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// PDF or image content could not be decoded or re-encoded.
    ///
    /// `page` is 1-based and present when the failure is tied to one page.
    #[error("{}", decode_message(*page, detail))]
    Decode { page: Option<usize>, detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn decode_message(page: Option<usize>, detail: &str) -> String {
    match page {
        Some(p) => format!("Could not decode page {p} of the uploaded document: {detail}"),
        None => format!("Could not decode the uploaded document: {detail}"),
    }
}

/// Classification of a failed remote generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteErrorKind {
    /// The caller's request rate or usage allowance was exceeded. Transient.
    QuotaExhausted,
    /// Anything else: auth, bad request, network, timeout, safety block …
    Other,
}

/// Status markers providers use to signal quota or rate limiting.
///
/// A bare `429` only counts in a status position (`(429)`, `HTTP 429`,
/// `status: 429`, or leading the message) so numbers inside unrelated
/// messages are not misread. The word "quota" alone is not a marker: Google
/// also uses it in non-retryable 403s ("requires a quota project").
static QUOTA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?im)(?:^\s*|\(|\b(?:status|code|http(?:/[\d.]+)?)\s*[:=]?\s*)429\b",
        r"|resource[_ ](?:has been )?exhausted",
        r"|too many requests",
        r"|rate[ _-]?limit",
    ))
    .expect("valid regex")
});

impl RemoteErrorKind {
    /// Classify a provider error message.
    pub fn classify(message: &str) -> Self {
        if QUOTA_PATTERN.is_match(message) {
            RemoteErrorKind::QuotaExhausted
        } else {
            RemoteErrorKind::Other
        }
    }
}

/// A single failed call to the generation endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn quota(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::QuotaExhausted,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Other,
            message: message.into(),
        }
    }

    /// Build a `RemoteError` from a provider error message, classifying its kind.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: RemoteErrorKind::classify(&message),
            message,
        }
    }

    pub fn is_quota(&self) -> bool {
        self.kind == RemoteErrorKind::QuotaExhausted
    }
}

impl From<LlmError> for RemoteError {
    /// Typed rate limiting is trusted as-is; other errors fall back to the
    /// status markers in their text (Gemini reports 429 as an `ApiError`).
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited(_) => RemoteError::quota(err.to_string()),
            other => RemoteError::from_message(other.to_string()),
        }
    }
}

/// Terminal failure of a generation.
///
/// The display strings are the user-visible messages.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationError {
    /// A non-quota error was returned; no retry was attempted.
    #[error("An error occurred: {message}")]
    Remote { message: String },

    /// Every attempt was rejected for quota exhaustion.
    #[error("Daily/Free-tier quota exhausted. Please try again later or upgrade your plan.")]
    QuotaExhausted { attempts: u32 },
}

impl GenerationError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            GenerationError::Remote { .. } => RemoteErrorKind::Other,
            GenerationError::QuotaExhausted { .. } => RemoteErrorKind::QuotaExhausted,
        }
    }
}
