//! Dispatcher trait definitions for dependency injection

use std::collections::HashMap;
use std::time::Duration;
use async_trait::async_trait;

use shared::{BatchId, Credential, EndpointConfig};
use crate::error::{DispatchResult, TransportError};
use crate::types::{CredentialStats, ExhaustedPrompt, RequestOptions};

/// Issues a single completion request; owns no concurrency itself
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Perform exactly one call and return the first completion's text
    async fn complete(
        &self,
        credential: &Credential,
        endpoint: &EndpointConfig,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<String, TransportError>;
}

/// Observability sink for request outcomes, retries and dropped prompts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutcomeReporter: Send + Sync {
    /// Record successful request
    async fn record_success(&self, credential: &Credential, response_time: Duration) -> DispatchResult<()>;

    /// Record failed request
    async fn record_failure(&self, credential: &Credential, failure: &TransportError) -> DispatchResult<()>;

    /// Record that a failed prompt was queued for another round
    async fn record_retry(&self, batch_id: BatchId, position: usize, attempts: u32) -> DispatchResult<()>;

    /// Record a prompt dropped after its last allowed attempt
    async fn record_exhausted(&self, exhausted: ExhaustedPrompt) -> DispatchResult<()>;

    /// Get per-credential statistics
    async fn get_stats(&self) -> DispatchResult<HashMap<Credential, CredentialStats>>;

    /// Prompts dropped so far
    async fn get_exhausted(&self) -> DispatchResult<Vec<ExhaustedPrompt>>;
}
