use thiserror::Error;

/// Errors produced by the persistence layer.
///
/// Every store-facing component (gateway, repositories, registrars, stats)
/// reports failures through this enum so callers can log them uniformly and
/// decide between fatal (startup) and per-event recoverable handling.
#[derive(Error, Debug)]
pub enum StoreError {
    /// MongoDB driver errors
    #[error("mongo error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// BSON encoding errors
    #[error("encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    /// BSON decoding errors
    #[error("decode document: {0}")]
    Decode(#[from] mongodb::bson::de::Error),

    /// An operation exceeded its time budget
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u128 },

    /// Lookup by key found nothing
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Caller passed an unusable argument (zero id, empty name)
    #[error("{0} is required")]
    InvalidArgument(&'static str),

    /// The gateway was closed before the operation ran
    #[error("store connection is closed")]
    Closed,

    /// Failures raised by non-Mongo backends
    #[error("{0}")]
    Backend(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Configuration loading and validation failures.
///
/// Each variant names the offending environment key so operators can fix the
/// deployment without reading code.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("read .env file: {0}")]
    DotEnv(String),
}

/// Outbound message delivery failures.
#[derive(Error, Debug)]
pub enum SendError {
    /// Telegram API errors
    #[error("telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// No outbound client was wired for this reply
    #[error("telegram client is not available")]
    NoClient,

    /// Failures raised by non-Telegram senders
    #[error("{0}")]
    Other(String),
}
