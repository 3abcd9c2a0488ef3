use thiserror::Error;

/// Top-level error type for the `d42-api` crate.
///
/// Keeps transport failures (the request never produced a usable HTTP
/// response) apart from application failures (the server answered, but the
/// `{code, msg}` envelope reports a non-zero code). `d42-core` attaches the
/// operation and resource identity on top of these.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP ────────────────────────────────────────────────────────
    /// Credentials rejected (HTTP 401 / 403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The addressed object does not exist (HTTP 404 or an empty lookup).
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Envelope ────────────────────────────────────────────────────
    /// The server answered with a non-zero envelope code.
    #[error("API returned code {code}: {message}")]
    Api { code: i64, message: String },

    /// A create envelope succeeded but carried no numeric id at message index 1.
    #[error("Create response carried no assigned id: {message}")]
    MissingAssignedId { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the remote object is known to be missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` if the request failed below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Tls(_))
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Extract the envelope error code, if available.
    pub fn api_error_code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}
