//! Pull-based result stream

use std::pin::Pin;
use std::task::{Context, Poll};
use futures_util::Stream;
use tokio::sync::mpsc;

use shared::BatchId;
use crate::types::{Completion, Outcome};

/// Completion-ordered results of one dispatch invocation.
///
/// `next` suspends until another unit of work resolves and returns `None`
/// once every unit has resolved. Dropping the stream early does not cancel
/// requests already in flight.
#[derive(Debug)]
pub struct ResultStream<P> {
    batch_id: BatchId,
    receiver: mpsc::Receiver<Completion<P>>,
}

impl<P> ResultStream<P> {
    pub(crate) fn new(batch_id: BatchId, receiver: mpsc::Receiver<Completion<P>>) -> Self {
        Self { batch_id, receiver }
    }

    /// Correlation id used in this invocation's log lines
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Next `(prompt, outcome)` pair in completion order
    pub async fn next(&mut self) -> Option<(P, Outcome)> {
        self.receiver
            .recv()
            .await
            .map(|completion| (completion.prompt, completion.outcome))
    }

    /// Next completion, including the prompt's position in the input batch
    pub async fn next_completion(&mut self) -> Option<Completion<P>> {
        self.receiver.recv().await
    }

    /// Drain the stream into a vector
    pub async fn collect_all(mut self) -> Vec<(P, Outcome)> {
        let mut results = Vec::new();
        while let Some(pair) = self.next().await {
            results.push(pair);
        }
        results
    }
}

impl<P> Stream for ResultStream<P> {
    type Item = (P, Outcome);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .receiver
            .poll_recv(cx)
            .map(|completion| completion.map(|c| (c.prompt, c.outcome)))
    }
}
