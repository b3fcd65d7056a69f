//! Error types for TRC.

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Input(#[from] InputError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Relay transport errors. Always retryable inside the subscription loop,
/// surfaced as-is for user-initiated sends.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection to relay failed: {0}")]
    Connection(String),

    #[error("relay request timed out")]
    Timeout,

    #[error("relay returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("invalid response from relay: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                detail: err.to_string(),
            }
        } else if err.is_decode() {
            TransportError::InvalidResponse(err.to_string())
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

/// Local history store errors.
///
/// A duplicate delivery token is NOT an error: `HistoryStore::append`
/// reports it as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open history database: {0}")]
    Open(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("store task was cancelled before completing")]
    TaskCancelled,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// LLM provider errors. The monitor path treats all of these as "no
/// alert"; interactive commands surface them as text.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API key configured")]
    NotConfigured,

    #[error("provider request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("provider returned no candidates")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::RequestFailed(err.to_string())
    }
}

/// User-input errors, rejected synchronously with no state change.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Username cannot be empty.")]
    EmptyUsername,

    #[error("'{0}' is a reserved system name. Please choose another.")]
    ReservedUsername(String),

    #[error("Username contains invalid characters.")]
    InvalidUsername,

    #[error("Invalid channel name: '{0}'")]
    InvalidChannelName(String),

    #[error("Not in #{0}. Join it first with /join #{0}")]
    NotJoined(String),

    #[error("Already in #{0}")]
    AlreadyJoined(String),

    #[error("Can't leave your only channel! Join another first.")]
    LastChannel,

    #[error("Message too long! ({length}/{max} characters). Please shorten it.")]
    MessageTooLong { length: usize, max: usize },

    #[error("Unknown command: /{0}. Type /help for commands.")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(&'static str),
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
