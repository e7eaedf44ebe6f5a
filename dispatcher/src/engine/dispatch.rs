//! Dispatch engine: one concurrent round over a working set of prompts

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use futures_util::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{self, JoinSet};

use shared::{batch_debug, batch_warn, logging, BatchId, Credential, EndpointConfig};
use crate::engine::stream::ResultStream;
use crate::error::{DispatchResult, TransportError};
use crate::services::CredentialRotator;
use crate::traits::{CompletionClient, OutcomeReporter};
use crate::types::{Completion, Outcome, RequestOptions};

/// Everything a round needs, shared by every unit of work in it
pub(crate) struct RoundContext<C, R> {
    pub batch_id: BatchId,
    pub client: Arc<C>,
    pub reporter: Arc<R>,
    pub config: Arc<EndpointConfig>,
    pub options: Arc<RequestOptions>,
}

impl<C, R> Clone for RoundContext<C, R> {
    fn clone(&self) -> Self {
        Self {
            batch_id: self.batch_id,
            client: Arc::clone(&self.client),
            reporter: Arc::clone(&self.reporter),
            config: Arc::clone(&self.config),
            options: Arc::clone(&self.options),
        }
    }
}

impl<C, R> RoundContext<C, R>
where
    C: CompletionClient + 'static,
    R: OutcomeReporter + 'static,
{
    /// Validate inputs up front so configuration problems never reach a round
    pub fn prepare(
        client: Arc<C>,
        reporter: Arc<R>,
        config: &EndpointConfig,
        options: RequestOptions,
    ) -> DispatchResult<Self> {
        options.validate()?;
        CredentialRotator::new(config.credentials())?;

        Ok(Self {
            batch_id: BatchId::new(),
            client,
            reporter,
            config: Arc::new(config.clone()),
            options: Arc::new(options),
        })
    }

    /// Fresh rotator for a round; rounds share no pooled state
    pub fn rotator(&self) -> DispatchResult<CredentialRotator> {
        Ok(CredentialRotator::new(self.config.credentials())?)
    }
}

/// Start a single round over `prompts` and return its result stream
pub(crate) fn spawn_dispatch<P, C, R>(ctx: RoundContext<C, R>, prompts: Vec<P>) -> ResultStream<P>
where
    P: AsRef<str> + Clone + Send + Sync + 'static,
    C: CompletionClient + 'static,
    R: OutcomeReporter + 'static,
{
    let batch_id = ctx.batch_id;
    let (sender, receiver) = mpsc::channel(prompts.len().max(1));
    let units: Vec<(usize, P)> = prompts.into_iter().enumerate().collect();

    tokio::spawn(async move {
        logging::log_startup(
            &ctx.batch_id,
            &format!(
                "dispatch of {} prompts across {} credentials",
                units.len(),
                ctx.config.credential_count()
            ),
        );

        match ctx.rotator() {
            Ok(rotator) => run_round(&ctx, rotator, units, sender).await,
            Err(e) => logging::log_error(&ctx.batch_id, "round setup", &e),
        }

        logging::log_shutdown(&ctx.batch_id, "all units resolved");
    });

    ResultStream::new(batch_id, receiver)
}

/// Run every unit to completion on a pool as wide as the credential set,
/// forwarding each completion the moment it resolves.
///
/// Units take a pool slot strictly in submission order, so the first k units
/// start on k distinct credentials. A failing or panicking request only
/// affects its own unit.
pub(crate) async fn run_round<P, C, R>(
    ctx: &RoundContext<C, R>,
    rotator: CredentialRotator,
    units: Vec<(usize, P)>,
    completions: mpsc::Sender<Completion<P>>,
) where
    P: AsRef<str> + Clone + Send + Sync + 'static,
    C: CompletionClient + 'static,
    R: OutcomeReporter + 'static,
{
    let pool = Arc::new(Semaphore::new(rotator.len()));
    let mut workers = JoinSet::new();
    let mut running: HashMap<task::Id, (usize, P, Credential)> = HashMap::new();
    let mut queued = units.into_iter().peekable();
    let mut receiver_open = true;

    batch_debug!(ctx.batch_id, units = queued.len(), width = rotator.len(), "Submitting round");

    loop {
        tokio::select! {
            // Draining first keeps slots turning over while units are still queued
            biased;

            Some(joined) = workers.join_next_with_id(), if !workers.is_empty() => {
                let (id, outcome, elapsed) = match joined {
                    Ok((id, (outcome, elapsed))) => (id, outcome, elapsed),
                    Err(e) => (
                        e.id(),
                        Outcome::Failure(TransportError::Panicked(e.to_string())),
                        Duration::ZERO,
                    ),
                };
                let Some((position, prompt, credential)) = running.remove(&id) else {
                    batch_warn!(ctx.batch_id, "Finished request task has no matching unit");
                    continue;
                };

                report(ctx, &credential, &prompt, &outcome, elapsed).await;

                if receiver_open {
                    let completion = Completion {
                        position,
                        prompt,
                        outcome,
                    };
                    if completions.send(completion).await.is_err() {
                        // Consumer went away; remaining units still run to completion
                        receiver_open = false;
                        batch_debug!(ctx.batch_id, "Result stream dropped, draining round");
                    }
                }
            }

            permit = Arc::clone(&pool).acquire_owned(), if queued.peek().is_some() => {
                let permit = match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        logging::log_error(&ctx.batch_id, "worker pool", &e);
                        break;
                    }
                };
                let Some((position, prompt)) = queued.next() else {
                    continue;
                };
                let credential = rotator.next().clone();
                let client = Arc::clone(&ctx.client);
                let config = Arc::clone(&ctx.config);
                let options = Arc::clone(&ctx.options);
                let unit_credential = credential.clone();
                let unit_prompt = prompt.clone();

                let handle = workers.spawn(async move {
                    let _permit = permit;
                    let started = Instant::now();

                    let request = client.complete(&unit_credential, &config, unit_prompt.as_ref(), &options);
                    let outcome = match AssertUnwindSafe(request).catch_unwind().await {
                        Ok(result) => Outcome::from(result),
                        Err(panic) => Outcome::Failure(TransportError::Panicked(panic_message(panic.as_ref()))),
                    };

                    (outcome, started.elapsed())
                });
                running.insert(handle.id(), (position, prompt, credential));
            }

            else => break,
        }
    }
}

async fn report<P, C, R>(
    ctx: &RoundContext<C, R>,
    credential: &Credential,
    prompt: &P,
    outcome: &Outcome,
    elapsed: Duration,
) where
    P: AsRef<str>,
    R: OutcomeReporter,
{
    let recorded = match outcome {
        Outcome::Success(_) => ctx.reporter.record_success(credential, elapsed).await,
        Outcome::Failure(failure) => {
            batch_warn!(
                ctx.batch_id,
                credential = %credential,
                error = %failure,
                "Prompt {:?} generated an error",
                prompt.as_ref()
            );
            ctx.reporter.record_failure(credential, failure).await
        }
    };

    if let Err(e) = recorded {
        batch_warn!(ctx.batch_id, error = %e, "Outcome reporter rejected a record");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
