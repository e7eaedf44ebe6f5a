//! In-memory outcome reporting

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use async_trait::async_trait;
use tokio::sync::RwLock;

use shared::{batch_error, BatchId, Credential};
use crate::error::{DispatchResult, TransportError};
use crate::traits::OutcomeReporter;
use crate::types::{CredentialStats, ExhaustedPrompt};

/// Real outcome reporter with in-memory statistics and tracing output
#[derive(Clone, Default)]
pub struct RealOutcomeReporter {
    stats: Arc<RwLock<HashMap<Credential, CredentialStats>>>,
    exhausted: Arc<RwLock<Vec<ExhaustedPrompt>>>,
}

impl RealOutcomeReporter {
    /// Create new outcome reporter
    pub fn new() -> Self {
        Self::default()
    }

    fn now_secs() -> Option<u64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|elapsed| elapsed.as_secs())
    }
}

#[async_trait]
impl OutcomeReporter for RealOutcomeReporter {
    async fn record_success(&self, credential: &Credential, response_time: Duration) -> DispatchResult<()> {
        let mut stats = self.stats.write().await;
        let credential_stats = stats.entry(credential.clone()).or_default();

        credential_stats.total_requests += 1;
        credential_stats.successful_requests += 1;
        credential_stats.total_response_time_ms += response_time.as_millis() as u64;
        credential_stats.last_used = Self::now_secs();

        tracing::debug!(
            credential = %credential,
            elapsed_ms = response_time.as_millis() as u64,
            "Recorded success"
        );
        Ok(())
    }

    async fn record_failure(&self, credential: &Credential, failure: &TransportError) -> DispatchResult<()> {
        let mut stats = self.stats.write().await;
        let credential_stats = stats.entry(credential.clone()).or_default();

        credential_stats.total_requests += 1;
        credential_stats.failed_requests += 1;
        credential_stats.last_used = Self::now_secs();

        tracing::debug!(credential = %credential, error = %failure, "Recorded failure");
        Ok(())
    }

    async fn record_retry(&self, batch_id: BatchId, position: usize, attempts: u32) -> DispatchResult<()> {
        tracing::debug!(batch = %batch_id, position, attempts, "Recorded retry");
        Ok(())
    }

    async fn record_exhausted(&self, exhausted: ExhaustedPrompt) -> DispatchResult<()> {
        batch_error!(
            exhausted.batch_id,
            position = exhausted.position,
            attempts = exhausted.attempts,
            error = %exhausted.last_failure,
            "Prompt dropped after exhausting retries: {:?}",
            exhausted.prompt
        );
        self.exhausted.write().await.push(exhausted);
        Ok(())
    }

    async fn get_stats(&self) -> DispatchResult<HashMap<Credential, CredentialStats>> {
        let stats = self.stats.read().await;
        Ok(stats.clone())
    }

    async fn get_exhausted(&self) -> DispatchResult<Vec<ExhaustedPrompt>> {
        let exhausted = self.exhausted.read().await;
        Ok(exhausted.clone())
    }
}
