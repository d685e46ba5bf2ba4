//! Error types for the BIRSE clients and the response decoder.
//!
//! # Design
//! Callers see three failure kinds: the request never completed
//! (`Connection`), the server answered but refused or soft-failed (`Api`),
//! or the answer did not match the expected schema (`Decode`). Local image
//! problems are reported separately and always before any request is sent.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = BirseError> = std::result::Result<T, E>;

/// Errors returned by every client operation.
#[derive(Debug, Error)]
pub enum BirseError {
    /// DNS, connect, reset or timeout. The request may not have reached the server.
    #[error("connection error: {0}")]
    Connection(String),

    /// Non-2xx status, or a 2xx body that encodes a logical failure.
    #[error("API error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    /// The response body does not match the expected schema.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("image file not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("failed to read image: {0}")]
    ImageRead(#[source] io::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The configured base URL cannot carry a request path.
    #[error("invalid base URL `{0}`")]
    InvalidUrl(String),
}

impl BirseError {
    pub(crate) fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        BirseError::Api {
            status,
            message: message.into(),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, BirseError::Connection(_))
    }

    pub fn is_api(&self) -> bool {
        matches!(self, BirseError::Api { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, BirseError::Decode(_))
    }

    /// Status code of an `Api` error that came from an HTTP error status.
    pub fn status(&self) -> Option<u16> {
        match self {
            BirseError::Api { status, .. } => *status,
            _ => None,
        }
    }
}

/// A response body that could not be mapped onto the typed records.
///
/// `path` locates the failure inside the payload, e.g.
/// `products[2].variants.nodes[0].price.amount`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing field `{path}` in {record}")]
    MissingField { record: &'static str, path: String },

    #[error("invalid type at `{path}`: expected {expected}, found {found}")]
    InvalidType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("malformed JSON: {0}")]
    Syntax(String),
}

impl DecodeError {
    pub fn path(&self) -> Option<&str> {
        match self {
            DecodeError::MissingField { path, .. } | DecodeError::InvalidType { path, .. } => {
                Some(path)
            }
            DecodeError::Syntax(_) => None,
        }
    }
}
