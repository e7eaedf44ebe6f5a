//! Shared logging utilities for consistent tracing across the workspace

use crate::types::BatchId;
use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Build the env filter directive for the given base level
pub fn filter_directive(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("dispatcher={base_level},shared={base_level},reqwest=warn")
}

/// Initialize the stdout tracing subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let directive = filter_directive(log_level);

    let _ = fmt()
        .with_env_filter(EnvFilter::new(&directive))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for batch-aware info logging
#[macro_export]
macro_rules! batch_info {
    ($batch_id:expr, $($arg:tt)*) => {
        tracing::info!(
            batch = %$batch_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for batch-aware warning logging
#[macro_export]
macro_rules! batch_warn {
    ($batch_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            batch = %$batch_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for batch-aware error logging
#[macro_export]
macro_rules! batch_error {
    ($batch_id:expr, $($arg:tt)*) => {
        tracing::error!(
            batch = %$batch_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for batch-aware debug logging
#[macro_export]
macro_rules! batch_debug {
    ($batch_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            batch = %$batch_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for the start of a dispatch
pub fn log_startup(batch_id: &BatchId, details: &str) {
    info!(
        batch = %batch_id,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for the end of a dispatch
pub fn log_shutdown(batch_id: &BatchId, reason: &str) {
    info!(
        batch = %batch_id,
        timestamp = format_timestamp(),
        "🛑 Finished: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(batch_id: &BatchId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        batch = %batch_id,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}
