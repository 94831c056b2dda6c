//! Error types for mailroute.

/// Top-level error type.
///
/// Only startup failures reach `main`. Once the router is running, rule and
/// delivery errors are absorbed and show up in the route report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule source error: {0}")]
    RuleSource(#[from] RuleSourceError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// The rule source could not be read at all.
#[derive(Debug, thiserror::Error)]
pub enum RuleSourceError {
    #[error("Failed to open rule store: {0}")]
    Open(String),

    #[error("Rule store query failed: {0}")]
    Query(String),
}

/// Rule content was present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum RuleParseError {
    #[error("Rules are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rule {index} has an empty target")]
    EmptyTarget { index: usize },

    #[error("Rule {index} pattern could not be compiled: {source}")]
    Pattern { index: usize, source: regex::Error },
}

/// One forward to one target failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Webhook server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Server stopped: {0}")]
    Serve(#[from] std::io::Error),
}

/// Result type alias for mailroute.
pub type Result<T> = std::result::Result<T, Error>;
