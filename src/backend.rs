//! The remote generation endpoint, behind a trait.
//!
//! [`GenerationBackend`] is the seam between the retry loop and the network:
//! one call, one [`GenerationRequest`], one `Result<String, RemoteError>`.
//! [`LlmBackend`] implements it on top of an `edgequake-llm` provider;
//! tests substitute a scripted stub.

use crate::config::{ExtractorConfig, DEFAULT_PROVIDER};
use crate::error::{InvoiceError, RemoteError};
use crate::payload::GenerationRequest;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{debug, info};

/// A single-shot multimodal generation call. No retries at this layer.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, RemoteError>;
}

/// [`GenerationBackend`] backed by an `edgequake-llm` provider.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractorConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl GenerationBackend for LlmBackend {
    /// ## Message Layout
    ///
    /// 1. **System message**: the invoice instruction prompt
    /// 2. **User message**: the query text with every image attached in order
    async fn generate(&self, request: &GenerationRequest) -> Result<String, RemoteError> {
        let images = request.images.iter().map(|p| p.to_image_data()).collect();
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user_with_images(request.query.as_str(), images),
        ];

        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "{} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Err(e) => Err(RemoteError::from(e)),
        }
    }
}

/// Build `CompletionOptions` from the extractor config.
fn build_options(config: &ExtractorConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the generation backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini key** `GEMINI_API_KEY` (or its alias `GOOGLE_API_KEY`):
///    Gemini with `config.model` or `gemini-2.5-pro`.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_backend(
    config: &ExtractorConfig,
) -> Result<Arc<dyn GenerationBackend>, InvoiceError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmBackend::new(provider, config)))
}

fn resolve_provider(config: &ExtractorConfig) -> Result<Arc<dyn LLMProvider>, InvoiceError> {
    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if gemini_key_present() {
        return create_vision_provider(DEFAULT_PROVIDER, config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| InvoiceError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or GOOGLE_API_KEY), or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn gemini_key_present() -> bool {
    ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .any(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, InvoiceError> {
    info!("Using provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        InvoiceError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
