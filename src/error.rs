// src/error.rs
use reqwest::StatusCode;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-ok response carrying a server-supplied `{error}` body.
    #[error("server rejected request ({status}): {message}")]
    Api { status: StatusCode, message: String },

    /// Non-ok response without a usable error body.
    #[error("unexpected status {0}")]
    Status(StatusCode),

    /// The server answered with a redirect, which for an API call means it
    /// bounced an anonymous request to its login page.
    #[error("redirected ({status}) to {}", location.as_deref().unwrap_or("?"))]
    Redirected { status: StatusCode, location: Option<String> },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("push channel error: {0}")]
    Push(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("no active conversation")]
    NoActiveSession,
}

impl ClientError {
    /// The text to show the user verbatim, if the server supplied one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. }
            | ClientError::Status(status)
            | ClientError::Redirected { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// A 401, or a redirect away from the API (the login page).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Redirected { .. }) || self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },
}
