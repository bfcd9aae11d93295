//! Upload normalisation: raw bytes + declared MIME type → image payloads.
//!
//! PDFs are rasterised page by page and re-encoded as JPEG, one payload per
//! page in document order. Anything else is assumed to already be an image
//! and passes through untouched; a malformed image is left for the model
//! call to reject.

use crate::config::ExtractorConfig;
use crate::error::InvoiceError;
use crate::payload::{ImagePayload, MIME_JPEG, MIME_PDF};
use crate::pipeline::encode::encode_jpeg;
use crate::pipeline::render::{render_pages, PageRasterizer, PdfiumRasterizer};
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info};

/// Converts uploads into the image sequence sent to the model.
#[derive(Clone)]
pub struct Normalizer {
    rasterizer: Arc<dyn PageRasterizer>,
    jpeg_quality: u8,
}

impl Normalizer {
    /// Use the configured rasteriser, falling back to pdfium.
    pub fn new(config: &ExtractorConfig) -> Self {
        let rasterizer = config
            .rasterizer
            .clone()
            .unwrap_or_else(|| Arc::new(PdfiumRasterizer::new(config.max_rendered_pixels)));
        Self::with_rasterizer(rasterizer, config.jpeg_quality)
    }

    pub fn with_rasterizer(rasterizer: Arc<dyn PageRasterizer>, jpeg_quality: u8) -> Self {
        Self {
            rasterizer,
            jpeg_quality,
        }
    }

    /// Normalise an upload.
    ///
    /// # Errors
    /// - [`InvoiceError::EmptyInput`] when `bytes` is empty, whatever the MIME type
    /// - [`InvoiceError::Decode`] when a PDF cannot be rendered or re-encoded
    pub async fn normalize(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<Vec<ImagePayload>, InvoiceError> {
        if bytes.is_empty() {
            return Err(InvoiceError::EmptyInput);
        }

        if mime_type != MIME_PDF {
            debug!("Passing through {} upload ({} bytes)", mime_type, bytes.len());
            return Ok(vec![ImagePayload::new(mime_type, bytes.to_vec())]);
        }

        let pages = render_pages(Arc::clone(&self.rasterizer), bytes, None).await?;
        if pages.is_empty() {
            return Err(InvoiceError::Decode {
                page: None,
                detail: "PDF contains no pages".into(),
            });
        }

        let payloads = self.encode_pages(&pages)?;
        info!("Normalised PDF into {} JPEG pages", payloads.len());
        Ok(payloads)
    }

    /// Render and encode only the first page of a PDF.
    pub async fn first_page(&self, pdf: &[u8]) -> Result<ImagePayload, InvoiceError> {
        if pdf.is_empty() {
            return Err(InvoiceError::EmptyInput);
        }

        let pages = render_pages(Arc::clone(&self.rasterizer), pdf, Some(1)).await?;
        self.encode_pages(&pages)?
            .into_iter()
            .next()
            .ok_or_else(|| InvoiceError::Decode {
                page: None,
                detail: "PDF contains no pages".into(),
            })
    }

    fn encode_pages(&self, pages: &[DynamicImage]) -> Result<Vec<ImagePayload>, InvoiceError> {
        pages
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                encode_jpeg(img, self.jpeg_quality)
                    .map(|data| ImagePayload::new(MIME_JPEG, data))
                    .map_err(|e| InvoiceError::Decode {
                        page: Some(idx + 1),
                        detail: format!("Image encoding failed: {}", e),
                    })
            })
            .collect()
    }
}
