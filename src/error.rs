//! Crate-wide error taxonomy.
//!
//! One variant per error kind named in the interface contract, each mapped
//! to both an HTTP status code and a DICOM/DIMSE status word so the HTTP
//! engine and the DICOM dispatcher can share a single error type up to
//! their respective top-level catches.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("parameter out of range: {0}")]
    ParameterOutOfRange(String),

    #[error("bad parameter type: {0}")]
    BadParameterType(String),

    #[error("bad sequence of calls: {0}")]
    BadSequenceOfCalls(String),

    #[error("inexistent item: {0}")]
    InexistentItem(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("network protocol error: {0}")]
    NetworkProtocol(String),

    #[error("bad file format: {0}")]
    BadFileFormat(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    #[error("null pointer: {0}")]
    NullPointer(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("storage full: {0}")]
    StorageFull(String),

    #[error("read only: {0}")]
    ReadOnly(String),

    #[error("incompatible version: {0}")]
    IncompatibleVersion(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("plugin error: {0}")]
    Plugin(String),
}

impl CoreError {
    /// HTTP status code for the canonical JSON error body.
    pub fn http_status(&self) -> http::StatusCode {
        use http::StatusCode as S;
        match self {
            CoreError::ParameterOutOfRange(_) => S::BAD_REQUEST,
            CoreError::BadParameterType(_) => S::BAD_REQUEST,
            CoreError::BadSequenceOfCalls(_) => S::INTERNAL_SERVER_ERROR,
            CoreError::InexistentItem(_) => S::NOT_FOUND,
            CoreError::BadRequest(_) => S::BAD_REQUEST,
            CoreError::NetworkProtocol(_) => S::BAD_GATEWAY,
            CoreError::BadFileFormat(_) => S::BAD_REQUEST,
            CoreError::UnknownResource(_) => S::NOT_FOUND,
            CoreError::Unauthorized(_) => S::UNAUTHORIZED,
            CoreError::NotAcceptable(_) => S::NOT_ACCEPTABLE,
            CoreError::NullPointer(_) => S::INTERNAL_SERVER_ERROR,
            CoreError::Timeout(_) => S::REQUEST_TIMEOUT,
            CoreError::StorageFull(_) => S::INSUFFICIENT_STORAGE,
            CoreError::ReadOnly(_) => S::FORBIDDEN,
            CoreError::IncompatibleVersion(_) => S::BAD_REQUEST,
            CoreError::NotImplemented(_) => S::NOT_IMPLEMENTED,
            CoreError::InternalError(_) => S::INTERNAL_SERVER_ERROR,
            CoreError::Plugin(_) => S::INTERNAL_SERVER_ERROR,
        }
    }

    /// DIMSE status word for the DICOM dispatcher's top-level catch.
    /// Values follow the DICOM PS3.7 general status code ranges: success
    /// 0x0000, refused 0xA7xx, failure 0xCxxx/0x01xx.
    pub fn dicom_status(&self) -> u16 {
        match self {
            CoreError::ParameterOutOfRange(_) => 0xA900,
            CoreError::BadParameterType(_) => 0xA900,
            CoreError::BadSequenceOfCalls(_) => 0x0211,
            CoreError::InexistentItem(_) => 0xA700,
            CoreError::BadRequest(_) => 0xA900,
            CoreError::NetworkProtocol(_) => 0x0122,
            CoreError::BadFileFormat(_) => 0xA900,
            CoreError::UnknownResource(_) => 0xA700,
            CoreError::Unauthorized(_) => 0x0124,
            CoreError::NotAcceptable(_) => 0x0122,
            CoreError::NullPointer(_) => 0x0110,
            CoreError::Timeout(_) => 0x0120,
            CoreError::StorageFull(_) => 0xA700,
            CoreError::ReadOnly(_) => 0x0122,
            CoreError::IncompatibleVersion(_) => 0x0110,
            CoreError::NotImplemented(_) => 0x0211,
            CoreError::InternalError(_) => 0x0110,
            CoreError::Plugin(_) => 0x0110,
        }
    }

    /// Numeric error-kind code for the binary entry point's exit-code
    /// taxonomy: one code per variant, in declaration order.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::ParameterOutOfRange(_) => 1,
            CoreError::BadParameterType(_) => 2,
            CoreError::BadSequenceOfCalls(_) => 3,
            CoreError::InexistentItem(_) => 4,
            CoreError::BadRequest(_) => 5,
            CoreError::NetworkProtocol(_) => 6,
            CoreError::BadFileFormat(_) => 7,
            CoreError::UnknownResource(_) => 8,
            CoreError::Unauthorized(_) => 9,
            CoreError::NotAcceptable(_) => 10,
            CoreError::NullPointer(_) => 11,
            CoreError::Timeout(_) => 12,
            CoreError::StorageFull(_) => 13,
            CoreError::ReadOnly(_) => 14,
            CoreError::IncompatibleVersion(_) => 15,
            CoreError::NotImplemented(_) => 16,
            CoreError::InternalError(_) => 17,
            CoreError::Plugin(_) => 18,
        }
    }

    /// Canonical JSON error body for the HTTP engine's top-level catch.
    pub fn to_json_body(&self) -> serde_json::Value {
        serde_json::json!({
            "Message": self.to_string(),
            "Method": self.kind_name(),
            "HttpStatus": self.http_status().as_u16(),
        })
    }

    fn kind_name(&self) -> &'static str {
        match self {
            CoreError::ParameterOutOfRange(_) => "ParameterOutOfRange",
            CoreError::BadParameterType(_) => "BadParameterType",
            CoreError::BadSequenceOfCalls(_) => "BadSequenceOfCalls",
            CoreError::InexistentItem(_) => "InexistentItem",
            CoreError::BadRequest(_) => "BadRequest",
            CoreError::NetworkProtocol(_) => "NetworkProtocol",
            CoreError::BadFileFormat(_) => "BadFileFormat",
            CoreError::UnknownResource(_) => "UnknownResource",
            CoreError::Unauthorized(_) => "Unauthorized",
            CoreError::NotAcceptable(_) => "NotAcceptable",
            CoreError::NullPointer(_) => "NullPointer",
            CoreError::Timeout(_) => "Timeout",
            CoreError::StorageFull(_) => "StorageFull",
            CoreError::ReadOnly(_) => "ReadOnly",
            CoreError::IncompatibleVersion(_) => "IncompatibleVersion",
            CoreError::NotImplemented(_) => "NotImplemented",
            CoreError::InternalError(_) => "InternalError",
            CoreError::Plugin(_) => "Plugin",
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => CoreError::InexistentItem(err.to_string()),
            std::io::ErrorKind::PermissionDenied => CoreError::ReadOnly(err.to_string()),
            _ => CoreError::InternalError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::BadFileFormat(err.to_string())
    }
}

impl From<dimse::DimseError> for CoreError {
    fn from(err: dimse::DimseError) -> Self {
        CoreError::NetworkProtocol(err.to_string())
    }
}

impl From<crate::storage::StorageError> for CoreError {
    fn from(err: crate::storage::StorageError) -> Self {
        match err {
            crate::storage::StorageError::Io(e) => CoreError::from(e),
            crate::storage::StorageError::Path(msg) => CoreError::InexistentItem(msg),
            crate::storage::StorageError::Config(msg) => CoreError::InternalError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_is_sensible() {
        assert_eq!(
            CoreError::Unauthorized("no token".into()).http_status(),
            http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CoreError::InexistentItem("x".into()).http_status(),
            http::StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn dicom_status_distinguishes_refused_from_failure() {
        assert_eq!(CoreError::InexistentItem("x".into()).dicom_status(), 0xA700);
        assert_eq!(CoreError::InternalError("x".into()).dicom_status(), 0x0110);
    }

    #[test]
    fn json_body_carries_message_and_status() {
        let body = CoreError::BadRequest("missing field".into()).to_json_body();
        assert_eq!(body["HttpStatus"], 400);
        assert_eq!(body["Method"], "BadRequest");
    }
}
