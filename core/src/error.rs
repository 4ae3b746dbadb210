//! Error types for the safebox client.
//!
//! # Design
//! Callers need to tell "the server rejected the call" (`Coded`) apart from
//! "the client could not understand the reply" (`PayloadType`,
//! `Deserialization`), and both apart from input the client refused to send
//! (`InvalidRequest`). Nothing here is retried internally.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SafeboxError>;

#[derive(Debug, Error)]
pub enum SafeboxError {
    /// Required input was missing or empty. No request was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    // Configuration errors
    #[error("client configuration is missing")]
    MissingConfig,
    #[error("invalid service address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("could not read config file: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error(transparent)]
    ConfigToml(#[from] toml::de::Error),

    // Protocol errors
    /// The response envelope carried a non-success error code.
    #[error("error code {code}: {message}")]
    Coded { code: i64, message: String },
    /// The server returned a non-2xx status without a coded envelope.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// An endpoint without a response envelope returned a non-200 status.
    #[error("{0}")]
    OperationFailed(&'static str),
    /// The envelope payload was not a JSON string.
    #[error("response payload type invalid: {0}")]
    PayloadType(&'static str),
    #[error("deserialization failed: {0}")]
    Deserialization(String),
    #[error("serialization failed: {0}")]
    Serialization(String),

    // Transport errors
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Ureq(#[from] ureq::Error),
}

impl SafeboxError {
    /// The server's application error code, if this is a coded error.
    pub fn code(&self) -> Option<i64> {
        match self {
            SafeboxError::Coded { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_coded(&self) -> bool {
        matches!(self, SafeboxError::Coded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_error_exposes_code_and_message() {
        let err = SafeboxError::Coded {
            code: 8005,
            message: "user does not exist".to_string(),
        };
        assert_eq!(err.code(), Some(8005));
        assert!(err.is_coded());
        assert_eq!(err.to_string(), "error code 8005: user does not exist");
    }

    #[test]
    fn non_coded_errors_have_no_code() {
        let err = SafeboxError::PayloadType("number");
        assert_eq!(err.code(), None);
        assert!(!err.is_coded());
        assert_eq!(err.to_string(), "response payload type invalid: number");
    }
}
