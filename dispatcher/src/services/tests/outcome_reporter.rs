//! Tests for the in-memory outcome reporter

use std::time::Duration;

use shared::{BatchId, Credential};
use crate::error::TransportError;
use crate::services::outcome_reporter::RealOutcomeReporter;
use crate::traits::OutcomeReporter;
use crate::types::ExhaustedPrompt;

#[tokio::test]
async fn test_empty_reporter() {
    let reporter = RealOutcomeReporter::new();

    assert!(reporter.get_stats().await.unwrap().is_empty());
    assert!(reporter.get_exhausted().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stats_per_credential() {
    let reporter = RealOutcomeReporter::new();
    let alpha = Credential::new("sk-proj-alpha-0001");
    let beta = Credential::new("sk-proj-beta-0002");

    reporter.record_success(&alpha, Duration::from_millis(100)).await.unwrap();
    reporter.record_success(&alpha, Duration::from_millis(300)).await.unwrap();
    reporter
        .record_failure(&alpha, &TransportError::Network("connection reset".to_string()))
        .await
        .unwrap();
    reporter
        .record_failure(
            &beta,
            &TransportError::Status {
                status: 429,
                body: "slow down".to_string(),
            },
        )
        .await
        .unwrap();

    let stats = reporter.get_stats().await.unwrap();
    // Same hint prefix, still tracked separately
    assert_eq!(stats.len(), 2);

    let alpha_stats = &stats[&alpha];
    assert_eq!(alpha_stats.total_requests, 3);
    assert_eq!(alpha_stats.successful_requests, 2);
    assert_eq!(alpha_stats.failed_requests, 1);
    assert_eq!(alpha_stats.average_response_time_ms(), Some(200));
    assert!(alpha_stats.last_used.is_some());

    let beta_stats = &stats[&beta];
    assert_eq!(beta_stats.total_requests, 1);
    assert_eq!(beta_stats.failed_requests, 1);
    assert_eq!(beta_stats.average_response_time_ms(), None);
}

#[tokio::test]
async fn test_retry_is_not_a_request() {
    let reporter = RealOutcomeReporter::new();

    reporter.record_retry(BatchId::new(), 4, 1).await.unwrap();

    assert!(reporter.get_stats().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exhausted_prompts_kept_in_order() {
    let reporter = RealOutcomeReporter::new();
    let batch_id = BatchId::new();

    for position in [2, 0] {
        reporter
            .record_exhausted(ExhaustedPrompt {
                batch_id,
                position,
                prompt: format!("prompt {position}"),
                attempts: 3,
                last_failure: TransportError::MalformedBody("no choices".to_string()),
            })
            .await
            .unwrap();
    }

    let exhausted = reporter.get_exhausted().await.unwrap();
    assert_eq!(exhausted.len(), 2);
    assert_eq!(exhausted[0].position, 2);
    assert_eq!(exhausted[1].prompt, "prompt 0");
    assert!(exhausted.iter().all(|e| e.batch_id == batch_id && e.attempts == 3));
}

#[tokio::test]
async fn test_clones_share_state() {
    let reporter = RealOutcomeReporter::new();
    let handle = reporter.clone();
    let credential = Credential::new("sk-shared-credential");

    handle.record_success(&credential, Duration::from_millis(5)).await.unwrap();

    let stats = reporter.get_stats().await.unwrap();
    assert_eq!(stats[&credential].successful_requests, 1);
}
