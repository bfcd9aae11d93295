//! PDF rasterisation: render pages of an in-memory PDF to `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`render_pages`] moves the work onto tokio's blocking pool.
//!
//! ## Why cap pixels, not DPI?
//!
//! Invoices arrive as anything from receipt strips to A3 statements.
//! `max_rendered_pixels` caps the longest edge regardless of physical size,
//! keeping memory bounded and matching the image sizes vision models read best.

use crate::error::InvoiceError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns PDF bytes into page images, in page order.
///
/// `limit` caps how many leading pages are rendered (`None` = all pages).
pub trait PageRasterizer: Send + Sync {
    fn rasterize(
        &self,
        pdf: &[u8],
        limit: Option<usize>,
    ) -> Result<Vec<DynamicImage>, InvoiceError>;
}

/// [`PageRasterizer`] backed by pdfium, located through `pdfium-auto`.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self { max_rendered_pixels }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf: &[u8],
        limit: Option<usize>,
    ) -> Result<Vec<DynamicImage>, InvoiceError> {
        let pdfium = pdfium_auto::bind_pdfium_silent()
            .map_err(|e| InvoiceError::PdfiumBindingFailed(e.to_string()))?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| InvoiceError::Decode {
                page: None,
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        let count = limit.map_or(total_pages, |l| l.min(total_pages));
        info!("PDF loaded: {} pages, rendering {}", total_pages, count);

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let mut images = Vec::with_capacity(count);
        for idx in 0..count {
            let page = pages.get(idx as u16).map_err(|e| InvoiceError::Decode {
                page: Some(idx + 1),
                detail: format!("{:?}", e),
            })?;

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| InvoiceError::Decode {
                    page: Some(idx + 1),
                    detail: format!("{:?}", e),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

/// Rasterise on the blocking pool.
pub async fn render_pages(
    rasterizer: Arc<dyn PageRasterizer>,
    pdf: &[u8],
    limit: Option<usize>,
) -> Result<Vec<DynamicImage>, InvoiceError> {
    let bytes = pdf.to_vec();

    tokio::task::spawn_blocking(move || rasterizer.rasterize(&bytes, limit))
        .await
        .map_err(|e| InvoiceError::Internal(format!("Render task panicked: {}", e)))?
}
