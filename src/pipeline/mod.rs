//! Pipeline stages for invoice question answering.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ normalize ──▶ generate
//!              │   ▲
//!              ▼   │
//!           render ─▶ encode
//!          (pdfium)   (JPEG)
//! ```
//!
//! 1. [`normalize`]: bytes + MIME type → ordered image payloads
//! 2. [`render`]:    rasterise PDF pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]:    re-encode each rendered page as baseline JPEG
//! 4. [`generate`]:  drive the model call with pacing and quota backoff;
//!    the only stage with network I/O

pub mod encode;
pub mod generate;
pub mod normalize;
pub mod render;
