//! Request-scoped data: the uploaded file, the image payloads derived from
//! it, and the generation request sent to the model.

use crate::error::InvoiceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_PDF: &str = "application/pdf";

/// File extensions accepted as uploads.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "pdf"];

/// Map an accepted file extension to its MIME type.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some(MIME_JPEG),
        "png" => Some(MIME_PNG),
        "pdf" => Some(MIME_PDF),
        _ => None,
    }
}

/// Raw upload content plus the declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl UploadedFile {
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == MIME_PDF
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read an upload from disk, deriving the MIME type from the extension.
    ///
    /// Empty files are returned as-is; rejecting them is the normaliser's job.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, InvoiceError> {
        let path = path.as_ref();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let mime_type =
            mime_for_extension(&extension).ok_or_else(|| InvoiceError::UnsupportedFileType {
                path: path.to_path_buf(),
                extension: extension.clone(),
            })?;

        let data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InvoiceError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                InvoiceError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        debug!("Read upload {} ({} bytes, {})", path.display(), data.len(), mime_type);
        Ok(Self::new(data, mime_type))
    }
}

/// One image handed to the multimodal model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64-wrap the bytes for the provider request body.
    ///
    /// `detail: "high"` keeps fine print (line items, totals, tax ids) legible
    /// to models that tile images.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(STANDARD.encode(&self.data), self.mime_type.as_str()).with_detail("high")
    }
}

/// Everything sent to the model for one submission, in send order.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub query: String,
    pub images: Vec<ImagePayload>,
}

impl GenerationRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        query: impl Into<String>,
        images: Vec<ImagePayload>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            query: query.into(),
            images,
        }
    }
}
