use thiserror::Error;

/// Error taxonomy surfaced to clients as `[error] <text>` by the executor.
///
/// Every variant's display text is the exact wording the protocol promises
/// (see spec §7); lower layers wrap unrelated failures (IO, serialization)
/// into the ambient variants at the bottom and the executor formats the
/// final response.
#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("missing required parameter: {0}")]
    MissingRequiredParameter(String),

    #[error("key not found")]
    KeyNotFound,

    #[error("namespace not found")]
    NamespaceNotFound,

    #[error("role not found")]
    RoleNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("role already exists")]
    RoleAlreadyExists,

    #[error("namespace already exists")]
    NamespaceAlreadyExists,

    #[error("permission denied")]
    PermissionDenied,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("mutable operation on slave")]
    MutableOperationOnSlave,

    #[error("empty result")]
    EmptyResult,

    #[error("session already exists")]
    SessionAlreadyExists,

    #[error("expired session")]
    ExpiredSession,

    #[error("small buffer size")]
    SmallBufferSize,

    #[error("connection timed out")]
    ConnectionTimedOut,

    #[error("this namespace is still used by the role {0}")]
    NamespaceInUseByRole(String),

    #[error("this role is still assigned to a user")]
    RoleInUseByUser,

    // --- Ambient / internal variants, never shown verbatim to clients ---
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("replication error: {0}")]
    Replication(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        DbError::Io(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for DbError {
    fn from(e: bincode::error::EncodeError) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for DbError {
    fn from(e: bincode::error::DecodeError) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}
