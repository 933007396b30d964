use std::fmt;

/// Normalized failure category produced by [`crate::classify`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The request was intercepted on the client side (`ERR_BLOCKED_BY_CLIENT`).
    Blocked,
    /// The backend could not be reached (DNS, refused connection, CORS).
    Network,
    /// No response arrived within the per-attempt budget.
    Timeout,
    /// The backend answered with a 5xx status.
    ServerError,
    /// Credentials were rejected.
    Unauthorized,
    /// The identifier or resource is unknown to the backend.
    NotFound,
    /// Anything the mapping table does not recognize.
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Blocked,
        ErrorKind::Network,
        ErrorKind::Timeout,
        ErrorKind::ServerError,
        ErrorKind::Unauthorized,
        ErrorKind::NotFound,
        ErrorKind::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Blocked => "blocked",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure mapped to one [`ErrorKind`] with a message fit for end users.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// Localized, user-presentable text.
    pub message: String,
    /// HTTP status of the failing response, if one was received.
    pub status: Option<u16>,
    /// Raw server or transport text, for logs.
    pub detail: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            detail: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request failed terminally; see the classified kind.
    #[error(transparent)]
    Classified(#[from] ClassifiedError),
    /// A successful payload did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// A request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// Invalid option or environment value.
    #[error("configuration error: {0}")]
    Config(String),
    /// The request queue worker is gone.
    #[error("request queue is closed")]
    QueueClosed,
    /// The queued job ended without producing a result.
    #[error("queued request was dropped before completing")]
    Dropped,
}

impl ApiError {
    /// Returns the classified failure, if this error is one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ApiError::Classified(err) => Some(err),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.classified().map(|err| err.kind)
    }
}
