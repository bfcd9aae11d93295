//! End-to-end tests for edgequake-invoice.
//!
//! These render real PDFs through pdfium and, where an API key is present,
//! make live model calls. They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! The live tests additionally need `GEMINI_API_KEY` (or `GOOGLE_API_KEY`).

use edgequake_invoice::payload::MIME_PDF;
use edgequake_invoice::{
    ExtractorConfig, InvoiceError, InvoiceExtractor, MessageLevel, Normalizer, PdfiumRasterizer,
    SubmitRequest, UploadedFile,
};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set and pdfium can be located.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let ready = tokio::task::spawn_blocking(|| pdfium_auto::ensure_pdfium_library(None))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false);
        if !ready {
            println!("SKIP — pdfium library unavailable");
            return;
        }
    }};
}

fn has_gemini_key() -> bool {
    std::env::var("GEMINI_API_KEY").is_ok() || std::env::var("GOOGLE_API_KEY").is_ok()
}

/// Build a small, well-formed PDF with one line of text per page.
fn invoice_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let mut objects: Vec<String> = Vec::new();

    // 1: catalog, 2: page tree, 3: font, then (page, content) pairs.
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".into());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), n));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".into());
    for (i, text) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));
        let stream = format!("BT /F1 24 Tf 72 760 Td ({text}) Tj ET");
        objects.push(format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = pdf.len();
    let header = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    pdf.extend_from_slice(header.as_bytes());
    for off in offsets {
        pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    pdf
}

fn pdfium_normalizer() -> Normalizer {
    Normalizer::with_rasterizer(Arc::new(PdfiumRasterizer::new(1000)), 75)
}

// ── Rendering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_page_pdf_renders_two_jpegs() {
    e2e_skip_unless_ready!();

    let pdf = invoice_pdf(&["INVOICE 2024-017", "TOTAL 1234.56 EUR"]);
    let payloads = pdfium_normalizer()
        .normalize(&pdf, MIME_PDF)
        .await
        .expect("render");

    assert_eq!(payloads.len(), 2);
    for (i, p) in payloads.iter().enumerate() {
        assert_eq!(p.mime_type, "image/jpeg");
        let img = image::load_from_memory(&p.data).expect("decodable JPEG");
        assert!(img.width() > 0 && img.height() > img.width(), "page {} is portrait", i + 1);
        assert!(img.height() <= 1000);
    }
}

#[tokio::test]
async fn test_first_page_preview_only_renders_one_page() {
    e2e_skip_unless_ready!();

    let pdf = invoice_pdf(&["PAGE ONE", "PAGE TWO", "PAGE THREE"]);
    let first = pdfium_normalizer().first_page(&pdf).await.expect("render");
    let all = pdfium_normalizer().normalize(&pdf, MIME_PDF).await.expect("render");

    assert_eq!(all.len(), 3);
    assert_eq!(first.data, all[0].data);
}

#[tokio::test]
async fn test_corrupt_pdf_is_a_decode_error() {
    e2e_skip_unless_ready!();

    let err = pdfium_normalizer()
        .normalize(b"%PDF-1.4\nthis is not a real document", MIME_PDF)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::Decode { .. }), "got {err:?}");
}

// ── Live model ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_total_question() {
    e2e_skip_unless_ready!();
    if !has_gemini_key() {
        println!("SKIP — set GEMINI_API_KEY or GOOGLE_API_KEY to run");
        return;
    }

    let config = ExtractorConfig::builder()
        .rasterizer(Arc::new(PdfiumRasterizer::new(1500)))
        .build()
        .expect("config");
    let extractor = InvoiceExtractor::new(config).expect("provider");

    let pdf = invoice_pdf(&["INVOICE 2024-017  ACME GmbH", "TOTAL DUE 1234.56 EUR"]);
    let response = extractor
        .submit(SubmitRequest::new(
            UploadedFile::new(pdf, MIME_PDF),
            "What is the total?",
        ))
        .await;

    for m in &response.messages {
        println!("[{:?}] {}", m.level, m.text);
    }
    if response
        .messages
        .iter()
        .any(|m| m.level == MessageLevel::Warning)
        && !response.is_success()
    {
        println!("SKIP — quota exhausted for this key");
        return;
    }

    let answer = response.output.expect("answer");
    println!("{answer}");
    assert!(answer.contains("1234.56") || answer.contains("1,234.56"));
}
