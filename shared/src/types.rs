//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one dispatch invocation, attached to its log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.0.simple().to_string();
        write!(f, "batch_{}", &simple[..8])
    }
}

/// Opaque authentication token for the completion endpoint.
///
/// `Debug` and `Display` only ever show a redacted hint, so credentials can
/// be logged and traced without leaking the secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Redacted form: the first four characters, or nothing for short secrets
    pub fn hint(&self) -> String {
        if self.0.chars().count() <= 8 {
            "****".to_string()
        } else {
            let prefix: String = self.0.chars().take(4).collect();
            format!("{prefix}…")
        }
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.hint()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hint())
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_never_prints_secret() {
        let credential = Credential::new("sk-live-0123456789abcdef");

        assert_eq!(credential.hint(), "sk-l…");
        assert_eq!(credential.to_string(), "sk-l…");
        assert!(!format!("{credential:?}").contains("0123456789"));
        assert_eq!(credential.expose(), "sk-live-0123456789abcdef");
    }

    #[test]
    fn test_short_credential_fully_masked() {
        let credential = Credential::new("abc");
        assert_eq!(credential.hint(), "****");
    }

    #[test]
    fn test_credential_serializes_as_plain_string() {
        let credential = Credential::new("key-one");
        let json = serde_json::to_string(&credential).unwrap();
        assert_eq!(json, "\"key-one\"");
    }

    #[test]
    fn test_batch_id_display() {
        let id = BatchId::new();
        let shown = id.to_string();

        assert!(shown.starts_with("batch_"));
        assert_eq!(shown.len(), "batch_".len() + 8);
        assert_ne!(BatchId::new(), id);
    }
}
