//! Shared error types for the prompt dispatch system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Credential set must contain at least one credential")]
    EmptyCredentials,

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Configuration source not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Malformed configuration in {path}: {message}")]
    MalformedConfig { path: String, message: String },

    #[error("Refusing to overwrite existing file: {path}")]
    AlreadyExists { path: String },

    #[error("Missing environment variable: {name}")]
    MissingEnv { name: String },

    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SharedResult<T> = Result<T, SharedError>;
