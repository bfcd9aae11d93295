//! Model interaction: drive one generation request through the retry policy.
//!
//! ## Retry Strategy
//!
//! Every attempt, the first included, is preceded by a fixed pacing delay
//! (`pacing_delay`, 2 s) so bursts of submissions do not trip per-minute
//! quotas. Quota exhaustion is the only retryable signal: the client waits
//! `quota_backoff_base * 2^attempt` (10 s → 20 s → 40 s) and tries again, up
//! to `max_retries` attempts in total. Any other error ends the generation
//! immediately.
//!
//! ```text
//! Attempting(n) ──ok──────────────▶ Success
//!      │ ──other error────────────▶ NonRetryableFailure
//!      └─quota─▶ Backoff(n) ──▶ Attempting(n+1)   (n+1 < max_retries)
//!                          └──▶ RetriesExhausted   (n+1 = max_retries)
//! ```

use crate::backend::GenerationBackend;
use crate::config::{ExtractorConfig, RetryPolicy};
use crate::error::{GenerationError, RemoteError};
use crate::payload::GenerationRequest;
use crate::progress::{GenerationObserver, NoopObserver, Observer};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};

/// Submits generation requests to a backend under a [`RetryPolicy`].
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
    api_timeout: Duration,
    observer: Observer,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &ExtractorConfig) -> Self {
        Self {
            backend,
            retry: config.retry,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
            observer: config
                .observer
                .clone()
                .unwrap_or_else(|| Arc::new(NoopObserver)),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Generate text, reporting events to the configured observer.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.generate_observed(request, self.observer.as_ref()).await
    }

    /// Generate text, reporting events to `observer` instead of the configured one.
    ///
    /// Returns the text of the first successful attempt. Retries are not
    /// visible in the result, only through `observer`.
    pub async fn generate_observed(
        &self,
        request: &GenerationRequest,
        observer: &dyn GenerationObserver,
    ) -> Result<String, GenerationError> {
        let max = self.retry.max_retries;

        for attempt in 0..max {
            observer.on_attempt_start(attempt + 1, max);
            sleep(self.retry.pacing_delay).await;

            debug!(
                "Attempt {}/{}: {} image(s), query of {} chars",
                attempt + 1,
                max,
                request.images.len(),
                request.query.len()
            );

            match self.call_once(request).await {
                Ok(text) => {
                    info!("Generation succeeded on attempt {}/{}", attempt + 1, max);
                    observer.on_success(attempt + 1, text.len());
                    return Ok(text);
                }
                Err(e) if e.is_quota() => {
                    let wait = self.retry.quota_backoff(attempt);
                    warn!(
                        "Quota exceeded on attempt {}/{}; retrying in {}s: {}",
                        attempt + 1,
                        max,
                        wait.as_secs(),
                        e
                    );
                    observer.on_quota_retry(wait, attempt + 1, max);
                    sleep(wait).await;
                }
                Err(e) => {
                    error!("Attempt {}/{} failed: {}", attempt + 1, max, e);
                    let err = GenerationError::Remote { message: e.message };
                    observer.on_failure(&err);
                    return Err(err);
                }
            }
        }

        error!("Quota still exhausted after {} attempts", max);
        let err = GenerationError::QuotaExhausted { attempts: max };
        observer.on_failure(&err);
        Err(err)
    }

    /// One backend call bounded by the API timeout. A timeout is not retried.
    async fn call_once(&self, request: &GenerationRequest) -> Result<String, RemoteError> {
        match timeout(self.api_timeout, self.backend.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::other(format!(
                "generation call timed out after {}s",
                self.api_timeout.as_secs()
            ))),
        }
    }
}
