//! Observer trait for generation events.
//!
//! Inject an [`Arc<dyn GenerationObserver>`] via
//! [`crate::config::ExtractorConfigBuilder::observer`] to receive the
//! retry-in-progress and failure notifications the generation client emits.
//! The CLI renders them next to its spinner; the submit handler turns them
//! into [`crate::output::StatusMessage`]s.
//!
//! # Example
//!
//! ```rust
//! use edgequake_invoice::{ExtractorConfig, GenerationObserver};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct PrintRetries;
//!
//! impl GenerationObserver for PrintRetries {
//!     fn on_quota_retry(&self, wait: Duration, attempt: u32, max_retries: u32) {
//!         eprintln!("retrying in {}s ({attempt}/{max_retries})", wait.as_secs());
//!     }
//! }
//!
//! let config = ExtractorConfig::builder()
//!     .observer(Arc::new(PrintRetries) as Arc<dyn GenerationObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::GenerationError;
use std::sync::Arc;
use std::time::Duration;

/// Called by the generation client as it moves through its attempts.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `attempt` is always 1-based.
pub trait GenerationObserver: Send + Sync {
    /// Called before the pacing delay of each attempt.
    fn on_attempt_start(&self, attempt: u32, max_retries: u32) {
        let _ = (attempt, max_retries);
    }

    /// Called when an attempt hit quota exhaustion, before sleeping `wait`.
    fn on_quota_retry(&self, wait: Duration, attempt: u32, max_retries: u32) {
        let _ = (wait, attempt, max_retries);
    }

    /// Called once when generation produced text.
    fn on_success(&self, attempt: u32, text_len: usize) {
        let _ = (attempt, text_len);
    }

    /// Called once when generation ended in a terminal failure.
    fn on_failure(&self, error: &GenerationError) {
        let _ = error;
    }
}

/// A no-op observer. The default when none is configured.
pub struct NoopObserver;

impl GenerationObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ExtractorConfig`].
pub type Observer = Arc<dyn GenerationObserver>;

/// Forwards every event to two observers in order.
pub(crate) struct Tee<'a> {
    pub first: &'a dyn GenerationObserver,
    pub second: &'a dyn GenerationObserver,
}

impl GenerationObserver for Tee<'_> {
    fn on_attempt_start(&self, attempt: u32, max_retries: u32) {
        self.first.on_attempt_start(attempt, max_retries);
        self.second.on_attempt_start(attempt, max_retries);
    }

    fn on_quota_retry(&self, wait: Duration, attempt: u32, max_retries: u32) {
        self.first.on_quota_retry(wait, attempt, max_retries);
        self.second.on_quota_retry(wait, attempt, max_retries);
    }

    fn on_success(&self, attempt: u32, text_len: usize) {
        self.first.on_success(attempt, text_len);
        self.second.on_success(attempt, text_len);
    }

    fn on_failure(&self, error: &GenerationError) {
        self.first.on_failure(error);
        self.second.on_failure(error);
    }
}
