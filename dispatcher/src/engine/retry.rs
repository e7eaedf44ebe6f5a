//! Retry coordinator: drives the dispatch engine in bounded rounds

use std::collections::HashMap;
use tokio::sync::mpsc;

use shared::{batch_debug, batch_info, batch_warn, logging};
use crate::engine::dispatch::{run_round, RoundContext};
use crate::engine::stream::ResultStream;
use crate::traits::{CompletionClient, OutcomeReporter};
use crate::types::{Completion, ExhaustedPrompt, Outcome};

/// Start a retrying dispatch and return a stream of successful results.
///
/// Each round runs the engine over the prompts still pending. Successes are
/// forwarded as soon as they resolve; a failed prompt goes into the next
/// round until it has failed `max_retries` times, after which it is reported
/// and dropped. `max_retries` of 0 allows a single attempt.
pub(crate) fn spawn_dispatch_with_retries<P, C, R>(
    ctx: RoundContext<C, R>,
    prompts: Vec<P>,
    max_retries: u32,
) -> ResultStream<P>
where
    P: AsRef<str> + Clone + Send + Sync + 'static,
    C: CompletionClient + 'static,
    R: OutcomeReporter + 'static,
{
    let batch_id = ctx.batch_id;
    let (sender, receiver) = mpsc::channel(prompts.len().max(1));

    tokio::spawn(coordinate(ctx, prompts, max_retries, sender));

    ResultStream::new(batch_id, receiver)
}

async fn coordinate<P, C, R>(
    ctx: RoundContext<C, R>,
    prompts: Vec<P>,
    max_retries: u32,
    output: mpsc::Sender<Completion<P>>,
) where
    P: AsRef<str> + Clone + Send + Sync + 'static,
    C: CompletionClient + 'static,
    R: OutcomeReporter + 'static,
{
    let batch_id = ctx.batch_id;
    logging::log_startup(
        &batch_id,
        &format!(
            "dispatch of {} prompts across {} credentials, max retries {}",
            prompts.len(),
            ctx.config.credential_count(),
            max_retries
        ),
    );

    // Keyed by input position so equal-valued prompts keep separate budgets
    let mut failures: HashMap<usize, u32> = HashMap::new();
    let mut pending: Vec<(usize, P)> = prompts.into_iter().enumerate().collect();
    let mut rounds = 0u32;
    let mut succeeded = 0usize;
    let mut dropped = 0usize;
    let mut consumer_open = true;

    while !pending.is_empty() {
        if !consumer_open || output.is_closed() {
            batch_warn!(batch_id, abandoned = pending.len(), "Result stream dropped, no further rounds will start");
            break;
        }

        rounds += 1;
        let working_set = std::mem::take(&mut pending);
        batch_info!(batch_id, round = rounds, units = working_set.len(), "Starting round");

        let rotator = match ctx.rotator() {
            Ok(rotator) => rotator,
            Err(e) => {
                logging::log_error(&batch_id, "round setup", &e);
                break;
            }
        };

        let (round_sender, mut round_receiver) = mpsc::channel(working_set.len());
        let round_ctx = ctx.clone();
        let round = tokio::spawn(async move {
            run_round(&round_ctx, rotator, working_set, round_sender).await;
        });

        while let Some(completion) = round_receiver.recv().await {
            let Completion {
                position,
                prompt,
                outcome,
            } = completion;

            match outcome {
                Outcome::Success(response) => {
                    succeeded += 1;
                    if consumer_open {
                        let forwarded = Completion {
                            position,
                            prompt,
                            outcome: Outcome::Success(response),
                        };
                        if output.send(forwarded).await.is_err() {
                            consumer_open = false;
                        }
                    }
                }
                Outcome::Failure(failure) => {
                    let attempts = failures.entry(position).or_insert(0);
                    *attempts += 1;
                    let attempts = *attempts;

                    if attempts < max_retries {
                        batch_debug!(batch_id, position, attempts, "Prompt {:?} queued for retry", prompt.as_ref());
                        if let Err(e) = ctx.reporter.record_retry(batch_id, position, attempts).await {
                            batch_warn!(batch_id, error = %e, "Outcome reporter rejected a retry");
                        }
                        pending.push((position, prompt));
                    } else {
                        dropped += 1;
                        let exhausted = ExhaustedPrompt {
                            batch_id,
                            position,
                            prompt: prompt.as_ref().to_string(),
                            attempts,
                            last_failure: failure,
                        };
                        if let Err(e) = ctx.reporter.record_exhausted(exhausted).await {
                            batch_warn!(batch_id, error = %e, "Outcome reporter rejected an exhausted prompt");
                        }
                    }
                }
            }
        }

        // The round has resolved every unit once its sender is gone
        if let Err(e) = round.await {
            logging::log_error(&batch_id, "round", &e);
        }
    }

    logging::log_shutdown(
        &batch_id,
        &format!(
            "{} succeeded, {} dropped, {} abandoned after {} rounds",
            succeeded,
            dropped,
            pending.len(),
            rounds
        ),
    );
}
