//! Error types shared across the tracker.

use std::fmt;

/// Errors that can occur anywhere in the tracker library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Storage**: [`StorageUnavailable`](Self::StorageUnavailable), [`Storage`](Self::Storage).
/// - **Protocol**: [`Parse`](Self::Parse) — malformed request lines on either socket surface.
/// - **Session**: [`NotReady`](Self::NotReady), [`SessionFull`](Self::SessionFull),
///   [`DuplicateSession`](Self::DuplicateSession), [`BadCredentials`](Self::BadCredentials),
///   [`BadPassword`](Self::BadPassword).
/// - **File index**: [`QuotaExceeded`](Self::QuotaExceeded), [`DuplicateFile`](Self::DuplicateFile),
///   [`NotFound`](Self::NotFound).
/// - **Peer transfer**: [`Peer404`](Self::Peer404), [`Io`](Self::Io).
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The relational store could not be reached.
    #[error("storage unavailable")]
    StorageUnavailable,

    /// A storage operation failed for a reason other than unreachability.
    #[error("storage error: {0}")]
    Storage(String),

    /// An RPC was issued before `MAX_USERS` was configured.
    #[error("tracker not ready: max_users not configured")]
    NotReady,

    /// The active peer table has no free slot.
    #[error("active peer table is full")]
    SessionFull,

    /// A live session already exists under this user name.
    #[error("a session is already active for this user")]
    DuplicateSession,

    /// The supplied (name, token) pair does not match a live session.
    #[error("credential mismatch")]
    BadCredentials,

    /// Login was attempted against an existing user with the wrong password.
    #[error("password mismatch")]
    BadPassword,

    /// The owner has already registered `MAX_FILES_PER_USER` files.
    #[error("file quota exceeded")]
    QuotaExceeded,

    /// A file with the same (owner, name, type, path) is already registered.
    #[error("duplicate file registration")]
    DuplicateFile,

    /// The query produced no surviving results.
    #[error("not found")]
    NotFound,

    /// Failed to parse a request line on the RPC or peer-transfer socket.
    #[error("parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// The remote peer responded with the 404 sentinel.
    #[error("peer reports file not found")]
    Peer404,

    /// The peer listener has not been started.
    #[error("listener not started")]
    NotStarted,

    /// Password hashing or verification failed.
    #[error("password hashing error: {0}")]
    Hash(String),
}

/// Specific kind of request-line parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty.
    EmptyRequest,
    /// The request line did not have the expected field count.
    InvalidRequestLine,
    /// A numeric field (port, size, file id) failed to parse.
    InvalidField,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidField => write!(f, "invalid field"),
        }
    }
}

/// Convenience alias for `Result<T, TrackerError>`.
pub type Result<T> = std::result::Result<T, TrackerError>;
