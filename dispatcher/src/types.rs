//! Dispatcher data types

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use shared::BatchId;

use crate::error::{DispatchError, DispatchResult, TransportError};

/// Pure function applied to the prompt text before it is sent
pub type PromptTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_SAMPLES: u32 = 1;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Per-request generation options
#[derive(Clone)]
pub struct RequestOptions {
    /// Sent as the system message ahead of every prompt
    pub system_prompt: String,
    pub max_tokens: u32,
    /// Number of completions requested (`n`); only the first is returned
    pub samples: u32,
    pub temperature: f32,
    pub prompt_transform: Option<PromptTransform>,
    /// Minimum delay after each successful call, per worker
    pub min_interval: Duration,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_prompt_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.prompt_transform = Some(Arc::new(transform));
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Apply the prompt transform, if any
    pub fn render_prompt(&self, prompt: &str) -> String {
        match &self.prompt_transform {
            Some(transform) => transform(prompt),
            None => prompt.to_string(),
        }
    }

    /// Reject option bundles the endpoint could never accept
    pub fn validate(&self) -> DispatchResult<()> {
        if self.max_tokens == 0 {
            return Err(DispatchError::ConfigError {
                message: "max_tokens must be a positive integer".to_string(),
            });
        }
        if self.samples == 0 {
            return Err(DispatchError::ConfigError {
                message: "sample count must be a positive integer".to_string(),
            });
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(DispatchError::ConfigError {
                message: format!("temperature must be a non-negative number, got {}", self.temperature),
            });
        }
        Ok(())
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            samples: DEFAULT_SAMPLES,
            temperature: DEFAULT_TEMPERATURE,
            prompt_transform: None,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("system_prompt", &self.system_prompt)
            .field("max_tokens", &self.max_tokens)
            .field("samples", &self.samples)
            .field("temperature", &self.temperature)
            .field("prompt_transform", &self.prompt_transform.is_some())
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

/// Result of one request attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(TransportError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            Outcome::Success(response) => Some(response),
            Outcome::Failure(_) => None,
        }
    }

    pub fn into_response(self) -> Option<String> {
        match self {
            Outcome::Success(response) => Some(response),
            Outcome::Failure(_) => None,
        }
    }
}

impl From<Result<String, TransportError>> for Outcome {
    fn from(result: Result<String, TransportError>) -> Self {
        match result {
            Ok(response) => Outcome::Success(response),
            Err(failure) => Outcome::Failure(failure),
        }
    }
}

/// A resolved unit of work
#[derive(Debug, Clone)]
pub struct Completion<P> {
    /// Index of the prompt in the caller's input batch
    pub position: usize,
    pub prompt: P,
    pub outcome: Outcome,
}

/// Per-credential request statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_response_time_ms: u64,
    pub last_used: Option<u64>, // timestamp
}

impl CredentialStats {
    pub fn average_response_time_ms(&self) -> Option<u64> {
        if self.successful_requests == 0 {
            None
        } else {
            Some(self.total_response_time_ms / self.successful_requests)
        }
    }
}

/// A prompt dropped after using up its retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhaustedPrompt {
    pub batch_id: BatchId,
    pub position: usize,
    pub prompt: String,
    pub attempts: u32,
    pub last_failure: TransportError,
}
