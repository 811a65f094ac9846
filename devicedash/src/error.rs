//! Error taxonomy for the data-access layer.

use thiserror::Error;

/// Every failure a request can end in. Errors are passed to the view as-is;
/// nothing here is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Network or connection failure before a GraphQL response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status without a decodable GraphQL body.
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    /// Error reported by the API in the `errors` array.
    #[error("{message}")]
    Upstream {
        message: String,
        code: Option<String>,
    },

    /// The API rejected or did not receive a session token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Local input check failed; no request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("subscription error: {0}")]
    Subscription(String),
}

impl ApiError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ApiError::Unauthenticated(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ApiError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ApiError::Subscription(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
