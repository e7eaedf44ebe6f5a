//! Batch prompt dispatcher
//!
//! Sends a batch of prompts to a chat-completion endpoint, spreading the
//! load round-robin over several credentials with one in-flight request per
//! credential, and retries failed prompts in bounded rounds.

pub mod error;
pub mod types;
pub mod traits;
pub mod engine;
pub mod dispatcher_impl;
pub mod services;

// Re-export main types
pub use error::{DispatchError, DispatchResult, TransportError};
pub use types::*;
pub use traits::*;
pub use engine::ResultStream;
pub use dispatcher_impl::Dispatcher;
pub use services::*;
pub use shared::{Credential, EndpointConfig};

/// Dispatch every prompt once using the HTTP client; see [`Dispatcher::dispatch`]
pub fn dispatch<P>(
    config: &EndpointConfig,
    prompts: impl IntoIterator<Item = P>,
    options: RequestOptions,
) -> DispatchResult<ResultStream<P>>
where
    P: AsRef<str> + Clone + Send + Sync + 'static,
{
    Dispatcher::real().dispatch(config, prompts, options)
}

/// Dispatch with bounded retry rounds using the HTTP client; see
/// [`Dispatcher::dispatch_with_retries`]
pub fn dispatch_with_retries<P>(
    config: &EndpointConfig,
    prompts: impl IntoIterator<Item = P>,
    max_retries: u32,
    options: RequestOptions,
) -> DispatchResult<ResultStream<P>>
where
    P: AsRef<str> + Clone + Send + Sync + 'static,
{
    Dispatcher::real().dispatch_with_retries(config, prompts, max_retries, options)
}
