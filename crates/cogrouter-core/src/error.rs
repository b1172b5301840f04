//! Core error types for cogrouter-core.
//!
//! The router is designed to be total: a well-formed task intent always
//! produces a work item. Recoverable failures (providers, sinks) are
//! absorbed and logged near where they occur; the variants here cover the
//! failures that do surface to callers.

use thiserror::Error;

/// Top-level error type for the routing engine.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Inputs violate documented constraints. Never retried.
    #[error("invalid argument for '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    /// A context provider or one of its backing adapters failed.
    /// Absorbed by the router (zero context); surfaced only when a
    /// provider is called directly.
    #[error("context provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// A registered sink failed to consume a work item. Absorbed by the
    /// router; surfaced only when a sink is invoked directly.
    #[error("sink '{sink}' failed for task '{task_id}': {message}")]
    Sink {
        sink: String,
        task_id: String,
        message: String,
    },

    /// Broker transport I/O failed. Surfaced to whoever pumps the bus.
    #[error("broker transport error: {0}")]
    Transport(String),

    /// Policy or model configuration violates its constraints.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors from record/grid file loading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors from record/grid file loading.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors. Rejected at construction; there is no
/// partially applied policy or model config.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A weight, threshold, or cap is out of its documented range.
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Thresholds must satisfy immediate_threshold > batch_threshold.
    #[error("immediate threshold ({immediate}) must exceed batch threshold ({batch})")]
    ThresholdOrder { immediate: f64, batch: f64 },

    /// Failed to parse a policy or grid configuration document.
    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),

    /// A policy grid enumerated no valid candidate.
    #[error("policy grid produced no valid candidates")]
    EmptyGrid,
}

/// Result type alias for RouterError.
pub type Result<T, E = RouterError> = std::result::Result<T, E>;
