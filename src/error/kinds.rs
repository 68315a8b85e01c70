use std::{fmt, io};

use crate::error::mongo::{ErrorInfo, format_mongodb_error};

/// Crate-wide `Result` type using [`DbError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is used by
/// every fallible operation of the handle.
pub type Result<T> = std::result::Result<T, DbError>;

/// Top-level error type for database handle operations.
///
/// Server-side command failures (`ok != 1`) are *not* represented here; they
/// come back as [`crate::response::CommandOutcome::Failed`]. Only local
/// validation failures and failures raised below the handle end up in this
/// type.
#[derive(Debug)]
pub enum DbError {
    /// The database name was rejected at construction.
    InvalidName(InvalidNameError),

    /// The connection collaborator could not deliver a command.
    Transport(TransportError),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// A collection read issued on behalf of the handle was rejected by the
    /// server. Database commands report this through their outcome instead.
    QueryFailed(ErrorInfo),

    /// A response document did not have the expected shape.
    MalformedResponse(String),

    /// BSON (de)serialization errors.
    Bson(String),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),
}

/// A database name that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNameError {
    /// The offending name.
    pub name: String,

    /// Which rule it broke.
    pub reason: InvalidNameReason,
}

/// Rule broken by an invalid database name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidNameReason {
    Empty,
    ContainsSpace,
    ContainsDot,
}

/// Failures raised by a connection before a response document exists.
#[derive(Debug)]
pub enum TransportError {
    /// Not currently connected.
    NotConnected,

    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// The connection was lost mid-command.
    Disconnected(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::InvalidName(e) => write!(f, "{e}"),
            DbError::Transport(e) => write!(f, "Transport error: {e}"),
            DbError::MongoDb(e) => format_mongodb_error(f, e),
            DbError::QueryFailed(info) => write!(
                f,
                "Query failed: {}",
                info.message().unwrap_or("unknown server error")
            ),
            DbError::MalformedResponse(msg) => write!(f, "Malformed response: {msg}"),
            DbError::Bson(msg) => write!(f, "BSON error: {msg}"),
            DbError::Config(e) => write!(f, "Configuration error: {e}"),
            DbError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self.reason {
            InvalidNameReason::Empty => "name must not be empty",
            InvalidNameReason::ContainsSpace => "name must not contain a space",
            InvalidNameReason::ContainsDot => "name must not contain '.'",
        };
        write!(f, "Invalid database name '{}': {why}", self.name)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "Not connected to MongoDB"),
            TransportError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            TransportError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            TransportError::Disconnected(msg) => write!(f, "Connection lost: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::MongoDb(e) => Some(e),
            DbError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for InvalidNameError {}
impl std::error::Error for TransportError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to DbError ========================= */

impl From<io::Error> for DbError {
    fn from(err: io::Error) -> Self {
        DbError::Io(err)
    }
}

impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        DbError::MongoDb(err)
    }
}

impl From<InvalidNameError> for DbError {
    fn from(err: InvalidNameError) -> Self {
        DbError::InvalidName(err)
    }
}

impl From<TransportError> for DbError {
    fn from(err: TransportError) -> Self {
        DbError::Transport(err)
    }
}

impl From<ConfigError> for DbError {
    fn from(err: ConfigError) -> Self {
        DbError::Config(err)
    }
}

impl From<bson::ser::Error> for DbError {
    fn from(err: bson::ser::Error) -> Self {
        DbError::Bson(err.to_string())
    }
}

impl From<bson::de::Error> for DbError {
    fn from(err: bson::de::Error) -> Self {
        DbError::Bson(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Bson(format!("JSON conversion failed: {err}"))
    }
}

impl DbError {
    /// Whether this error was raised by name validation.
    pub fn is_invalid_name(&self) -> bool {
        matches!(self, DbError::InvalidName(_))
    }
}
