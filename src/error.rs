//! Error taxonomy for the ingestion workflow.
//!
//! Each variant maps to one stable, machine-readable code. The HTTP layer
//! turns the code into a status; the CLI prints the message.
//!
//! | Variant | Code | HTTP |
//! |---------|------|------|
//! | `Validation` | `bad_request` | 400 |
//! | `NotFound`, `Storage(NotFound)` | `not_found` | 404 |
//! | `AlreadyParsed` | `conflict` | 409 |
//! | `Extraction` | `extraction_failed` | 500 |
//! | `Storage`, `Internal` | `internal` | 500 |

use thiserror::Error;

use crate::extract::ExtractError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("dataset {0} has already been parsed")]
    AlreadyParsed(String),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IngestError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        IngestError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Validation { .. } => "bad_request",
            IngestError::NotFound(_) => "not_found",
            IngestError::Storage(StorageError::NotFound { .. }) => "not_found",
            IngestError::AlreadyParsed(_) => "conflict",
            IngestError::Extraction(_) => "extraction_failed",
            IngestError::Storage(_) | IngestError::Internal(_) => "internal",
        }
    }

    /// Whether the message is safe to return to a client verbatim.
    pub fn is_client_visible(&self) -> bool {
        !matches!(self.code(), "internal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_cover_every_variant() {
        assert_eq!(IngestError::validation("name", "required").code(), "bad_request");
        assert_eq!(IngestError::NotFound("dataset x".into()).code(), "not_found");
        assert_eq!(IngestError::AlreadyParsed("x".into()).code(), "conflict");
        assert_eq!(
            IngestError::from(ExtractError::NoPages).code(),
            "extraction_failed"
        );
        assert_eq!(
            IngestError::from(StorageError::NotFound { key: "k".into() }).code(),
            "not_found"
        );
        assert_eq!(
            IngestError::from(StorageError::Status {
                status: 403,
                body: "denied".into()
            })
            .code(),
            "internal"
        );
        assert_eq!(IngestError::from(anyhow::anyhow!("db down")).code(), "internal");
    }

    #[test]
    fn messages_read_naturally() {
        assert_eq!(
            IngestError::validation("name", "must not be empty").to_string(),
            "name: must not be empty"
        );
        assert_eq!(
            IngestError::NotFound("dataset abc".into()).to_string(),
            "dataset abc not found"
        );
        assert!(!IngestError::from(anyhow::anyhow!("secret detail")).is_client_visible());
        assert!(IngestError::AlreadyParsed("x".into()).is_client_visible());
    }
}
