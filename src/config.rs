//! Configuration types for invoice question answering.
//!
//! All behaviour is controlled through [`ExtractorConfig`], built via its
//! [`ExtractorConfigBuilder`]. Callers set only what they care about and rely
//! on documented defaults for the rest.

use crate::backend::GenerationBackend;
use crate::error::InvoiceError;
use crate::pipeline::render::PageRasterizer;
use crate::progress::Observer;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Provider used when only a Gemini/Google API key is present.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Configuration for an [`crate::InvoiceExtractor`].
///
/// # Example
/// ```rust
/// use edgequake_invoice::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .model("gemini-2.5-flash")
///     .max_retries(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractorConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `backend`, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed generation backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn GenerationBackend>>,

    /// Pre-constructed PDF rasteriser. If None, pdfium is used.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Custom system prompt. If None, uses the built-in invoice prompt.
    pub system_prompt: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Retry policy for the generation call.
    pub retry: RetryPolicy,

    /// Per-call timeout in seconds. A timeout is a non-retryable error. Default: 120.
    pub api_timeout_secs: u64,

    /// Longest edge, in pixels, of a rasterised PDF page. Default: 2000.
    pub max_rendered_pixels: u32,

    /// JPEG quality (1–100) for rasterised PDF pages. Default: 75.
    pub jpeg_quality: u8,

    /// Receives retry and failure notifications.
    pub observer: Option<Observer>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            backend: None,
            rasterizer: None,
            system_prompt: None,
            temperature: 0.1,
            max_tokens: 4096,
            retry: RetryPolicy::default(),
            api_timeout_secs: 120,
            max_rendered_pixels: 2000,
            jpeg_quality: 75,
            observer: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn GenerationBackend>"))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl ExtractorConfig {
    /// Create a new builder for `ExtractorConfig`.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Bounded retry with a fixed pacing delay and exponential quota backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_retries: u32,

    /// Wait before every attempt, including the first. Default: 2 s.
    pub pacing_delay: Duration,

    /// Backoff after a quota error on 0-based attempt `n` is
    /// `quota_backoff_base * 2^n`. Default: 10 s (10 s, 20 s, 40 s …).
    pub quota_backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            pacing_delay: Duration::from_secs(2),
            quota_backoff_base: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff after a quota error on 0-based `attempt`.
    pub fn quota_backoff(&self, attempt: u32) -> Duration {
        self.quota_backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Builder for [`ExtractorConfig`].
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl fmt::Debug for ExtractorConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractorConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn pacing_delay(mut self, delay: Duration) -> Self {
        self.config.retry.pacing_delay = delay;
        self
    }

    pub fn quota_backoff_base(mut self, base: Duration) -> Self {
        self.config.retry.quota_backoff_base = base;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn observer(mut self, observer: Observer) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractorConfig, InvoiceError> {
        let c = &self.config;
        if c.retry.max_retries == 0 {
            return Err(InvoiceError::InvalidConfig(
                "max_retries must be ≥ 1 (it counts the first attempt)".into(),
            ));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(InvoiceError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractorConfig::default();
        assert_eq!(c.retry.max_retries, 3);
        assert_eq!(c.retry.pacing_delay, Duration::from_secs(2));
        assert_eq!(c.model_or_default(), "gemini-2.5-pro");
        assert_eq!(c.jpeg_quality, 75);
    }

    #[test]
    fn quota_backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.quota_backoff(0), Duration::from_secs(10));
        assert_eq!(p.quota_backoff(1), Duration::from_secs(20));
        assert_eq!(p.quota_backoff(2), Duration::from_secs(40));
    }

    #[test]
    fn quota_backoff_saturates() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.quota_backoff(200),
            Duration::from_secs(10 * u64::from(u32::MAX))
        );
    }

    #[test]
    fn zero_retries_rejected() {
        let err = ExtractorConfig::builder().max_retries(0).build().unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidConfig(_)));
    }

    #[test]
    fn jpeg_quality_validated() {
        assert!(ExtractorConfig::builder().jpeg_quality(0).build().is_err());
        assert!(ExtractorConfig::builder().jpeg_quality(101).build().is_err());
        assert!(ExtractorConfig::builder().jpeg_quality(90).build().is_ok());
    }

    #[test]
    fn temperature_clamped() {
        let c = ExtractorConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
