//! Error types for Nota

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Password hashing error: {0}")]
    Password(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Prompt error: {0}")]
    Prompt(#[from] serde_yaml::Error),

    /// Username already taken
    #[error("{0}")]
    Conflict(String),

    /// Bad enrollment passphrase or no logged-in tenant
    #[error("{0}")]
    Authorization(String),

    /// Receipt page could not be retrieved
    #[error("{0}")]
    Fetch(String),

    /// Model endpoint answered with a non-success status
    #[error("Model API error: {0}")]
    ModelApi(String),

    /// An external call exceeded its configured deadline
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// Model output failed the shape or JSON checks
    #[error("{0}")]
    MalformedResponse(String),

    /// Model call succeeded but returned nothing usable
    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("{0}")]
    Advisory(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Short category label used when rendering failures for users
    pub fn label(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "ConflictError",
            Self::Authorization(_) => "AuthorizationError",
            Self::Fetch(_) => "FetchError",
            Self::Timeout { .. } => "TimeoutError",
            Self::MalformedResponse(_) | Self::EmptyResponse => "MalformedResponseError",
            Self::Advisory(_) => "AdvisoryError",
            Self::NotFound(_) => "NotFoundError",
            _ => "InternalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Error::Conflict("x".into()).label(), "ConflictError");
        assert_eq!(Error::EmptyResponse.label(), "MalformedResponseError");
        assert_eq!(
            Error::Timeout {
                operation: "fetch".into(),
                seconds: 5
            }
            .label(),
            "TimeoutError"
        );
        assert_eq!(Error::InvalidData("x".into()).label(), "InternalError");
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            operation: "model call".into(),
            seconds: 60,
        };
        assert_eq!(err.to_string(), "Timed out after 60s: model call");
    }
}
