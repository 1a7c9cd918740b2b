//! Error types shared by every ApiAxle accessor.

#[derive(Debug, thiserror::Error)]
pub enum AxleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}) from {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    #[error("unable to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unable to decode response: {0}")]
    Decode(String),

    #[error("response did not contain expected key: {0}")]
    MissingKey(String),

    #[error("key {0} did not contain an object")]
    NotAnObject(String),

    #[error("unexpected type for {key}: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("delete of {0} was rejected by the server")]
    DeleteRejected(String),

    #[error("updating an existing {0} is not supported")]
    UpdateUnsupported(&'static str),

    #[error("{0} has been deleted")]
    Deleted(String),

    #[error("config error: {0}")]
    Config(String),
}

impl AxleError {
    pub fn decode(e: impl std::fmt::Display) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type Result<T, E = AxleError> = std::result::Result<T, E>;
