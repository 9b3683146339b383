use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::crypto::codec::CodecError;
use crate::storage::StoreError;

/// The session backend's error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The embedded store failed.
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] StoreError),

    /// A cookie or record could not be authenticated, decrypted or decoded.
    #[error("Decoding failed: {0}")]
    DecodingFailed(CodecError),

    /// A value could not be encoded.
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// The encoded session exceeds the configured maximum length.
    #[error("Session payload too large: {len} bytes exceeds limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// The max-age does not fit the supported timestamp range.
    #[error("Max-age out of range: {0}s")]
    InvalidMaxAge(i64),

    /// A key pair was rejected at construction.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// A `Result` type that uses `SessionError` as the error type.
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::TooLarge { len, max } => SessionError::PayloadTooLarge { len, max },
            CodecError::InvalidKey(msg) => SessionError::InvalidKey(msg),
            CodecError::Serialization(msg) => SessionError::EncodingFailed(msg),
            CodecError::EncryptionFailed => SessionError::EncodingFailed("encryption failed".to_string()),
            CodecError::NoCodecs => SessionError::InvalidKey("no key pairs configured".to_string()),
            other => SessionError::DecodingFailed(other),
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SessionError::StorageFailure(ref e) => {
                tracing::error!("Storage failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }

            SessionError::DecodingFailed(ref e) => {
                tracing::debug!("Decoding failed: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid session".to_string())
            }

            SessionError::EncodingFailed(ref msg) => {
                tracing::error!("Encoding failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encoding error".to_string())
            }

            SessionError::PayloadTooLarge { len, max } => {
                tracing::warn!("Session payload too large: {} > {}", len, max);
                (StatusCode::PAYLOAD_TOO_LARGE, "Session too large".to_string())
            }

            SessionError::InvalidMaxAge(age) => {
                tracing::error!("Max-age out of range: {}s", age);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            SessionError::InvalidKey(ref msg) => {
                tracing::error!("Invalid key: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, body).into_response()
    }
}
