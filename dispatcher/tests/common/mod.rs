//! Scripted in-process completion client shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;

use dispatcher::{CompletionClient, Credential, EndpointConfig, RequestOptions, TransportError};

/// Call log entry, in the order the events happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Started(String),
    Finished(String),
}

#[derive(Default)]
struct Script {
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    fail_first: HashMap<String, u32>,
    always_fail: HashSet<String>,
    panics: HashSet<String>,
}

#[derive(Default)]
struct CallLog {
    attempts: HashMap<String, u32>,
    /// (prompt, exposed credential) in issue order
    requests: Vec<(String, String)>,
    events: Vec<CallEvent>,
    credential_in_flight: HashMap<String, usize>,
    credential_max_in_flight: HashMap<String, usize>,
}

/// Answers every prompt with `response to {prompt}` unless scripted otherwise
#[derive(Default)]
pub struct ScriptedClient {
    script: Script,
    log: Mutex<CallLog>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.script.default_delay = delay;
        self
    }

    pub fn with_delay(mut self, prompt: &str, delay: Duration) -> Self {
        self.script.delays.insert(prompt.to_string(), delay);
        self
    }

    /// Fail the first `failures` attempts of `prompt`, then succeed
    pub fn failing_first(mut self, prompt: &str, failures: u32) -> Self {
        self.script.fail_first.insert(prompt.to_string(), failures);
        self
    }

    pub fn always_failing(mut self, prompt: &str) -> Self {
        self.script.always_fail.insert(prompt.to_string());
        self
    }

    pub fn panicking(mut self, prompt: &str) -> Self {
        self.script.panics.insert(prompt.to_string());
        self
    }

    pub fn attempts(&self, prompt: &str) -> u32 {
        self.log.lock().unwrap().attempts.get(prompt).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().requests.len()
    }

    /// Credentials each attempt of `prompt` was sent with
    pub fn credentials_for(&self, prompt: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(sent, _)| sent == prompt)
            .map(|(_, credential)| credential.clone())
            .collect()
    }

    pub fn credential_usage(&self) -> HashMap<String, usize> {
        let mut usage = HashMap::new();
        for (_, credential) in self.log.lock().unwrap().requests.iter() {
            *usage.entry(credential.clone()).or_insert(0) += 1;
        }
        usage
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.log.lock().unwrap().events.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous requests seen on any one credential
    pub fn max_in_flight_per_credential(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .credential_max_in_flight
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Prompts in the order their requests started
    pub fn start_order(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                CallEvent::Started(prompt) => Some(prompt),
                CallEvent::Finished(_) => None,
            })
            .collect()
    }

    pub fn response_for(prompt: &str) -> String {
        format!("response to {prompt}")
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        credential: &Credential,
        _endpoint: &EndpointConfig,
        prompt: &str,
        _options: &RequestOptions,
    ) -> Result<String, TransportError> {
        let attempt = {
            let mut log = self.log.lock().unwrap();
            let attempt = {
                let count = log.attempts.entry(prompt.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            log.requests.push((prompt.to_string(), credential.expose().to_string()));
            log.events.push(CallEvent::Started(prompt.to_string()));
            let key = credential.expose().to_string();
            let current = {
                let count = log.credential_in_flight.entry(key.clone()).or_insert(0);
                *count += 1;
                *count
            };
            let peak = log.credential_max_in_flight.entry(key).or_insert(0);
            *peak = (*peak).max(current);
            attempt
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .script
            .delays
            .get(prompt)
            .copied()
            .unwrap_or(self.script.default_delay);
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        {
            let mut log = self.log.lock().unwrap();
            if let Some(count) = log.credential_in_flight.get_mut(credential.expose()) {
                *count -= 1;
            }
            log.events.push(CallEvent::Finished(prompt.to_string()));
        }

        if self.script.panics.contains(prompt) {
            panic!("scripted panic for {prompt}");
        }

        let fails = self.script.always_fail.contains(prompt)
            || self
                .script
                .fail_first
                .get(prompt)
                .is_some_and(|failures| attempt <= *failures);
        if fails {
            Err(TransportError::Status {
                status: 500,
                body: format!("scripted failure {attempt} for {prompt}"),
            })
        } else {
            Ok(Self::response_for(prompt))
        }
    }
}

pub fn endpoint(credentials: &[&str]) -> EndpointConfig {
    EndpointConfig::new(
        "scripted-model",
        "http://localhost:9/v1/chat/completions",
        credentials.iter().copied(),
    )
    .unwrap()
}

pub fn no_delay() -> RequestOptions {
    RequestOptions::new().with_min_interval(Duration::ZERO)
}
