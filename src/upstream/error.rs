use thiserror::Error;

/// Failure of a single upstream call once retries are exhausted
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Transport(String),
}

impl EndpointError {
    /// Failure category used as the `error_type` label
    pub fn kind(&self) -> &'static str {
        match self {
            EndpointError::Timeout => "timeout",
            EndpointError::Connect(_) => "connect",
            EndpointError::Status { .. } => "http_status",
            EndpointError::Decode(_) => "decode",
            EndpointError::Transport(_) => "transport",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            EndpointError::Status { status } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for EndpointError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EndpointError::Timeout
        } else if e.is_connect() {
            EndpointError::Connect(e.to_string())
        } else if e.is_decode() {
            EndpointError::Decode(e.to_string())
        } else {
            EndpointError::Transport(e.to_string())
        }
    }
}

/// Token acquisition failure; fatal at startup
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token acquisition rejected with HTTP {status}")]
    Rejected { status: u16 },

    #[error("token acquisition failed: {0}")]
    Request(EndpointError),

    #[error("token acquisition response did not contain a token")]
    MissingToken,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Rejected { .. } => "http_status",
            AuthError::Request(e) => e.kind(),
            AuthError::MissingToken => "missing_token",
            AuthError::Client(_) => "client",
        }
    }
}

impl From<EndpointError> for AuthError {
    fn from(e: EndpointError) -> Self {
        match e {
            EndpointError::Status { status } => AuthError::Rejected { status },
            other => AuthError::Request(other),
        }
    }
}
