//! # edgequake-invoice
//!
//! Ask free-text questions about invoice images and PDFs using Vision
//! Language Models (VLMs).
//!
//! An upload (JPEG, PNG or PDF) is normalised into a sequence of images,
//! sent to a hosted multimodal model together with an invoice-expert
//! instruction prompt and the user's question, and the model's answer is
//! returned as plain text. No structured parsing happens locally: the model
//! reads the invoice as a human would, in whatever language it is written.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Upload + query
//!  │
//!  ├─ 1. Normalise  image passthrough, or PDF → pdfium → one JPEG per page
//!  ├─ 2. Generate   paced model call, exponential backoff on quota errors
//!  └─ 3. Respond    preview + status messages + answer text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_invoice::{ExtractorConfig, InvoiceExtractor, SubmitRequest, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / GOOGLE_API_KEY / …
//!     let extractor = InvoiceExtractor::new(ExtractorConfig::default())?;
//!     let upload = UploadedFile::from_path("invoice.pdf").await?;
//!     let response = extractor
//!         .submit(SubmitRequest::new(upload, "What is the total?"))
//!         .await;
//!     for message in &response.messages {
//!         eprintln!("{:?}: {}", message.level, message.text);
//!     }
//!     if let Some(answer) = response.output {
//!         println!("{answer}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `invoice-ask` binary (clap + anyhow + tracing-subscriber) |
//! | `bundled` | off     | Embed libpdfium in the binary at compile time |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod payload;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{resolve_backend, GenerationBackend, LlmBackend};
pub use config::{ExtractorConfig, ExtractorConfigBuilder, RetryPolicy};
pub use error::{GenerationError, InvoiceError, RemoteError, RemoteErrorKind};
pub use extract::{InvoiceExtractor, SubmitRequest};
pub use output::{MessageLevel, Preview, StatusMessage, SubmitResponse};
pub use payload::{GenerationRequest, ImagePayload, UploadedFile};
pub use pipeline::generate::GenerationClient;
pub use pipeline::normalize::Normalizer;
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use progress::{GenerationObserver, NoopObserver, Observer};
