//! Tests for dispatcher services
//!
//! Cover the rotator, the HTTP client against a mock server, the in-memory
//! reporter and the dispatcher facade with mocked collaborators.

pub mod outcome_reporter;

// Re-export test utilities
pub use crate::traits::*;
