use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("http status {status} for {url}")]
    Http { status: u16, url: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl EngineError {
    /// Collapses a reqwest failure into the transport-aware taxonomy the
    /// disposition classifier operates on.
    pub(crate) fn from_request(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            EngineError::Timeout(format!("{url}: {err}"))
        } else if err.is_connect() {
            EngineError::Connect(format!("{url}: {err}"))
        } else {
            EngineError::Unexpected(format!("{url}: {err}"))
        }
    }
}
