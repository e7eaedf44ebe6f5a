//! Endpoint configuration
//!
//! Immutable description of the completion endpoint: model identifier, URL
//! and the ordered credential set used for round-robin dispatch. Every way of
//! obtaining a configuration (constructor, JSON file, environment) goes
//! through the same validation, so an invalid value never reaches the
//! dispatcher.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{SharedError, SharedResult};
use crate::types::Credential;

/// Environment variable holding the model identifier
pub const ENV_MODEL: &str = "DISPATCH_MODEL";
/// Environment variable holding the endpoint URL
pub const ENV_API_URL: &str = "DISPATCH_API_URL";
/// Environment variable holding comma-separated credentials
pub const ENV_API_KEYS: &str = "DISPATCH_API_KEYS";

/// Validated endpoint configuration.
///
/// The JSON form uses the keys `model_type`, `api_url` and `api_keys`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEndpointConfig")]
pub struct EndpointConfig {
    #[serde(rename = "model_type")]
    model: String,
    api_url: String,
    #[serde(rename = "api_keys")]
    credentials: Vec<Credential>,
}

/// Unvalidated wire form, only used as the deserialization entry point
#[derive(Deserialize)]
struct RawEndpointConfig {
    model_type: String,
    api_url: String,
    api_keys: Vec<Credential>,
}

impl TryFrom<RawEndpointConfig> for EndpointConfig {
    type Error = SharedError;

    fn try_from(raw: RawEndpointConfig) -> Result<Self, Self::Error> {
        EndpointConfig::new(raw.model_type, raw.api_url, raw.api_keys)
    }
}

impl EndpointConfig {
    /// Build a configuration, rejecting empty credential sets, blank values
    /// and URLs that are not absolute http(s) URLs
    pub fn new(
        model: impl Into<String>,
        api_url: impl Into<String>,
        credentials: impl IntoIterator<Item = impl Into<Credential>>,
    ) -> SharedResult<Self> {
        let model = model.into();
        let api_url = api_url.into();
        let credentials: Vec<Credential> = credentials.into_iter().map(Into::into).collect();

        if model.trim().is_empty() {
            return Err(SharedError::InvalidConfig {
                field: "model_type".to_string(),
                value: model,
            });
        }

        let parsed = Url::parse(&api_url).map_err(|e| SharedError::InvalidConfig {
            field: "api_url".to_string(),
            value: format!("{api_url} ({e})"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SharedError::InvalidConfig {
                field: "api_url".to_string(),
                value: api_url,
            });
        }

        if credentials.is_empty() {
            return Err(SharedError::EmptyCredentials);
        }
        if let Some(position) = credentials.iter().position(Credential::is_blank) {
            return Err(SharedError::InvalidConfig {
                field: "api_keys".to_string(),
                value: format!("blank credential at index {position}"),
            });
        }

        Ok(Self {
            model,
            api_url,
            credentials,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    /// Number of credentials, which is also the dispatch pool width
    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// Load a configuration from a JSON file.
    ///
    /// A missing file and malformed content are reported as distinct errors;
    /// nothing is defaulted.
    pub fn from_json_file(path: impl AsRef<Path>) -> SharedResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SharedError::ConfigNotFound {
                path: path.display().to_string(),
            },
            _ => SharedError::Io(e),
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| SharedError::MalformedConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), config = %config, "Loaded endpoint configuration");
        Ok(config)
    }

    /// Persist the configuration as pretty JSON.
    ///
    /// The target is created exclusively: if anything already exists at
    /// `path` the call fails with [`SharedError::AlreadyExists`] and the
    /// existing file is not touched.
    pub fn save_to_json_file(&self, path: impl AsRef<Path>) -> SharedResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| SharedError::SerializationError {
            message: e.to_string(),
        })?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SharedError::AlreadyExists {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(SharedError::Io(e)),
        };

        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        tracing::info!(path = %path.display(), "Configuration dumped");
        Ok(())
    }

    /// Load from `DISPATCH_MODEL`, `DISPATCH_API_URL` and `DISPATCH_API_KEYS`,
    /// reading a `.env` file first if one is present
    pub fn from_env() -> SharedResult<Self> {
        // A missing .env file is fine; real environment variables still apply
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> SharedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name).ok_or_else(|| SharedError::MissingEnv {
                name: name.to_string(),
            })
        };

        let model = require(ENV_MODEL)?;
        let api_url = require(ENV_API_URL)?;
        let keys = require(ENV_API_KEYS)?;

        let credentials: Vec<Credential> = keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(Credential::from)
            .collect();

        Self::new(model, api_url, credentials)
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} ({} credentials)",
            self.model,
            self.api_url,
            self.credentials.len()
        )
    }
}
