//! Dispatcher services implementations

pub mod credential_rotator;
pub mod completion_client;
pub mod outcome_reporter;

#[cfg(test)]
pub mod tests;

pub use credential_rotator::*;
pub use completion_client::*;
pub use outcome_reporter::*;
