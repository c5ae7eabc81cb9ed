use thiserror::Error;

/// Internal backend error kinds (§7). These never reach the kernel directly
/// — the FUSE layer downgrades them to an errno at the callback boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The requested artifact/URL/visit does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was well-formed but semantically invalid for this
    /// backend (e.g. asking a content backend for a directory SWHID).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network/transport failure talking to the remote service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote response could not be decoded into our metadata model.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(404) {
            BackendError::NotFound(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}
