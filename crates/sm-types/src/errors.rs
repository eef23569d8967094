use thiserror::Error;

/// Main error type for the Summit system
#[derive(Error, Debug)]
pub enum SummitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SummitError {
    /// Shorthand for a usage error (an operation invoked before its
    /// preconditions were established).
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

/// Errors raised while building or validating an optimization configuration.
/// These fail fast at construction and never reach the remote service.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{field} out of range: {value} (allowed {low} to {high})")]
    OutOfRange {
        field: String,
        value: f64,
        low: f64,
        high: f64,
    },

    #[error("unknown {field} value '{value}' (allowed: {allowed})")]
    UnknownVariant {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: String, name: String },

    #[error("parameter '{parameter}' has no non-zero bound to derive a unit scale from")]
    ZeroBound { parameter: String },

    #[error("failed to parse configuration: {message}")]
    Parse { message: String },
}

/// Errors surfaced by remote service calls. None of these are retried at
/// the call site; transient gaps are handled by the exchange loop only.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("{resource} not found: {name}")]
    NotFound { resource: String, name: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP transport error: {message}")]
    Http { message: String },

    #[error("response decode error: {message}")]
    Decode { message: String },
}

/// Errors specific to the suggestion/measurement exchange loop.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("no suggestions for campaign '{campaign_id}' after {attempts} attempts")]
    NoSuggestions { campaign_id: String, attempts: u32 },

    #[error("malformed artifact '{file_name}': {message}")]
    MalformedArtifact { file_name: String, message: String },

    #[error("exchange project not found: {name}")]
    ProjectNotFound { name: String },
}

/// Result type alias for Summit operations
pub type SmResult<T> = Result<T, SummitError>;
