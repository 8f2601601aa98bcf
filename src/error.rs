use thiserror::Error;

/// Everything that can go wrong between sending a chat message and
/// getting a usable reply back.
///
/// None of these are ever shown to the user. The controller logs them and
/// renders the fixed fallback text instead.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Connection refused, DNS failure, timeout, body read failure.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The body was not valid JSON or did not match the reply shape.
    #[error("malformed reply body: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("reply is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("{0}")]
    Other(String),
}

impl ChatError {
    /// Whether the failure happened after a body was received.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ChatError::Protocol(_) | ChatError::MissingField(_))
    }
}
