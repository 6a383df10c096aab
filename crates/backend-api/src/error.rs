use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid backend url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend rejected the request: {message}")]
    Rejected { message: String },

    #[error("malformed backend response: {0}")]
    Malformed(String),
}
