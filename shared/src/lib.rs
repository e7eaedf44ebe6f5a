//! Shared types for the prompt dispatch system
//!
//! Holds what every component needs: credentials, the endpoint
//! configuration, error types and logging setup.

pub mod types;
pub mod errors;
pub mod config;
pub mod logging;

pub use types::*;
pub use errors::*;
pub use config::EndpointConfig;
