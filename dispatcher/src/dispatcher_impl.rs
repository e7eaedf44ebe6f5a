//! Dispatcher implementation with dependency injection

use std::sync::Arc;

use shared::EndpointConfig;
use crate::engine::dispatch::{spawn_dispatch, RoundContext};
use crate::engine::retry::spawn_dispatch_with_retries;
use crate::engine::ResultStream;
use crate::error::DispatchResult;
use crate::services::{RealCompletionClient, RealOutcomeReporter};
use crate::traits::{CompletionClient, OutcomeReporter};
use crate::types::RequestOptions;

/// Batch dispatcher with dependency injection
pub struct Dispatcher<C, R>
where
    C: CompletionClient,
    R: OutcomeReporter,
{
    client: Arc<C>,
    reporter: Arc<R>,
}

impl<C, R> Clone for Dispatcher<C, R>
where
    C: CompletionClient,
    R: OutcomeReporter,
{
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

impl<C, R> Dispatcher<C, R>
where
    C: CompletionClient + 'static,
    R: OutcomeReporter + 'static,
{
    /// Create new dispatcher instance
    pub fn new(client: C, reporter: R) -> Self {
        Self::from_shared(Arc::new(client), Arc::new(reporter))
    }

    /// Create a dispatcher around services the caller keeps handles to
    pub fn from_shared(client: Arc<C>, reporter: Arc<R>) -> Self {
        Self { client, reporter }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn reporter(&self) -> &Arc<R> {
        &self.reporter
    }

    /// Issue every prompt once, concurrently, one in-flight request per
    /// credential, and stream `(prompt, outcome)` pairs in completion order.
    ///
    /// Option and configuration problems are returned before any request is
    /// made. Must be called from within a Tokio runtime.
    pub fn dispatch<P>(
        &self,
        config: &EndpointConfig,
        prompts: impl IntoIterator<Item = P>,
        options: RequestOptions,
    ) -> DispatchResult<ResultStream<P>>
    where
        P: AsRef<str> + Clone + Send + Sync + 'static,
    {
        let ctx = RoundContext::prepare(Arc::clone(&self.client), Arc::clone(&self.reporter), config, options)?;
        Ok(spawn_dispatch(ctx, prompts.into_iter().collect()))
    }

    /// Dispatch in rounds, re-submitting failed prompts until they succeed
    /// or have failed `max_retries` times.
    ///
    /// Only successes appear on the stream. Dropped prompts go to the
    /// outcome reporter; callers that need to detect loss compare positions
    /// from [`ResultStream::next_completion`] against their input.
    pub fn dispatch_with_retries<P>(
        &self,
        config: &EndpointConfig,
        prompts: impl IntoIterator<Item = P>,
        max_retries: u32,
        options: RequestOptions,
    ) -> DispatchResult<ResultStream<P>>
    where
        P: AsRef<str> + Clone + Send + Sync + 'static,
    {
        let ctx = RoundContext::prepare(Arc::clone(&self.client), Arc::clone(&self.reporter), config, options)?;
        Ok(spawn_dispatch_with_retries(ctx, prompts.into_iter().collect(), max_retries))
    }
}

impl Dispatcher<RealCompletionClient, RealOutcomeReporter> {
    /// Dispatcher talking HTTP, with in-memory reporting
    pub fn real() -> Self {
        Self::new(RealCompletionClient::new(), RealOutcomeReporter::new())
    }
}

impl Default for Dispatcher<RealCompletionClient, RealOutcomeReporter> {
    fn default() -> Self {
        Self::real()
    }
}
