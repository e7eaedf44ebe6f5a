//! Round-robin credential rotation

use std::sync::atomic::{AtomicUsize, Ordering};

use shared::{Credential, SharedError, SharedResult};

/// Yields credentials in a repeating round-robin sequence.
///
/// The cursor is advanced with a single compare-and-swap, so concurrent
/// callers each get a whole credential and the i-th call overall returns
/// `credentials[i % len]`.
#[derive(Debug)]
pub struct CredentialRotator {
    credentials: Vec<Credential>,
    cursor: AtomicUsize,
}

impl CredentialRotator {
    /// Create a rotator; an empty credential set is a configuration error
    pub fn new(credentials: impl Into<Vec<Credential>>) -> SharedResult<Self> {
        let credentials = credentials.into();
        if credentials.is_empty() {
            return Err(SharedError::EmptyCredentials);
        }

        Ok(Self {
            credentials,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Next credential in rotation order
    pub fn next(&self) -> &Credential {
        let len = self.credentials.len();
        // fetch_update only fails when the closure returns None
        let index = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        };
        &self.credentials[index]
    }

    /// Number of credentials, i.e. the pool width
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
