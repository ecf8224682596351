//! Strongly typed error system for the gqlwire SDK.
//!
//! Errors here belong to the HTTP side of delivery. Upstream producer errors
//! never show up as `SdkError`: they are delivered to the client as GraphQL
//! `errors` entries instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Request errors
    BadRequest,
    ParseError,
    MethodNotAllowed,
    PayloadTooLarge,

    // Transport errors
    TransportClosed,
    BindError,

    // Serialization errors
    SerializeError,
    DeserializeError,

    // Internal errors
    InternalError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::ParseError => "PARSE_ERROR",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::TransportClosed => "TRANSPORT_CLOSED",
            Self::BindError => "BIND_ERROR",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::DeserializeError => "DESERIALIZE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this is a client error (4xx equivalent).
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::ParseError
                | Self::MethodNotAllowed
                | Self::PayloadTooLarge
                | Self::DeserializeError
        )
    }

    /// HTTP status used when this error is answered directly.
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::MethodNotAllowed => 405,
            Self::PayloadTooLarge => 413,
            Self::BadRequest | Self::ParseError | Self::DeserializeError => 400,
            Self::TransportClosed
            | Self::BindError
            | Self::SerializeError
            | Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strongly typed SDK error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct SdkError {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl SdkError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Creates a transport closed error.
    pub fn transport_closed() -> Self {
        Self::new(ErrorCode::TransportClosed, "transport closed")
    }

    /// Creates a serialization error.
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializeError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Returns true if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }
}

impl Serialize for SdkError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SdkError", 2)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

/// Type alias for SDK results.
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Result extension for mapping errors with context.
pub trait ResultExt<T> {
    /// Maps the error to an SdkError with the given code.
    fn map_sdk_err(self, code: ErrorCode) -> SdkResult<T>;

    /// Maps the error to an SdkError with the given code and message prefix.
    fn map_sdk_err_with(self, code: ErrorCode, message: impl Into<String>) -> SdkResult<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn map_sdk_err(self, code: ErrorCode) -> SdkResult<T> {
        self.map_err(|e| SdkError::new(code, e.to_string()))
    }

    fn map_sdk_err_with(self, code: ErrorCode, message: impl Into<String>) -> SdkResult<T> {
        self.map_err(|e| SdkError::new(code, format!("{}: {}", message.into(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::BadRequest.is_client_error());
        assert!(!ErrorCode::TransportClosed.is_client_error());

        assert_eq!(ErrorCode::ParseError.http_status(), 400);
        assert_eq!(ErrorCode::MethodNotAllowed.http_status(), 405);
        assert_eq!(ErrorCode::PayloadTooLarge.http_status(), 413);
        assert!(ErrorCode::PayloadTooLarge.is_client_error());
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn test_error_display() {
        let err = SdkError::bad_request("missing query");
        assert_eq!(err.to_string(), "[BAD_REQUEST] missing query");
    }

    #[test]
    fn test_error_serialization() {
        let err = SdkError::transport_closed();
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("TRANSPORT_CLOSED"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<serde_json::Value, serde_json::Error> = serde_json::from_str("{");
        let err = result
            .map_sdk_err_with(ErrorCode::DeserializeError, "Invalid JSON")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
        assert!(err.message.starts_with("Invalid JSON: "));
    }
}
