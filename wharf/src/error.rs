//! Error types for the registry

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors produced by registry operations.
///
/// Each variant maps to one HTTP status and one OCI error code. Variants
/// that share a code (e.g. the two `MANIFEST_INVALID` forms) exist because
/// the protocol assigns them different statuses depending on where the
/// failure occurs.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Repository name failed the name grammar, or the request URL could
    /// not be split into a name and a sub-resource.
    #[error("invalid repository name: {0}")]
    NameInvalid(String),

    /// Repository has never had a manifest or blob written to it.
    #[error("repository name not known to registry: {0}")]
    NameUnknown(String),

    /// No blob under the requested digest.
    #[error("blob unknown to registry: {0}")]
    BlobUnknown(String),

    /// Digest on a blob address failed to parse.
    #[error("blob unknown to registry: malformed digest {0}")]
    BlobDigestMalformed(String),

    /// Digest on an upload finalization failed to parse or was missing.
    #[error("invalid digest: {0}")]
    DigestInvalid(String),

    /// Uploaded content did not hash to the digest it claimed.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Digest the client claimed.
        expected: String,
        /// Digest of the bytes actually received.
        actual: String,
    },

    /// Manifest reference rejected on a write.
    #[error("manifest invalid: bad reference {0}")]
    ManifestInvalid(String),

    /// Manifest reference failed both grammars on a read.
    #[error("manifest invalid: bad reference {0}")]
    ManifestRefMalformed(String),

    /// Declared manifest media type is not one the registry accepts.
    #[error("unsupported manifest type: {0}")]
    UnsupportedManifestType(String),

    /// No manifest under the requested tag or digest.
    #[error("manifest unknown to registry: {0}")]
    ManifestUnknown(String),

    /// Method/endpoint combination outside the dispatch table.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Storage backend failure. The detail is logged server-side and never
    /// echoed to the client.
    #[error("storage failure")]
    Storage(#[from] storage::StorageError),
}

impl RegistryError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::NameUnknown(_)
            | RegistryError::BlobUnknown(_)
            | RegistryError::ManifestRefMalformed(_)
            | RegistryError::ManifestUnknown(_) => StatusCode::NOT_FOUND,
            RegistryError::NameInvalid(_)
            | RegistryError::BlobDigestMalformed(_)
            | RegistryError::DigestInvalid(_)
            | RegistryError::DigestMismatch { .. }
            | RegistryError::ManifestInvalid(_) => StatusCode::BAD_REQUEST,
            RegistryError::UnsupportedManifestType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RegistryError::Unsupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for OCI error responses
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::NameInvalid(_) => "NAME_INVALID",
            RegistryError::NameUnknown(_) => "NAME_UNKNOWN",
            RegistryError::BlobUnknown(_) | RegistryError::BlobDigestMalformed(_) => "BLOB_UNKNOWN",
            RegistryError::DigestInvalid(_) | RegistryError::DigestMismatch { .. } => {
                "DIGEST_INVALID"
            }
            RegistryError::ManifestInvalid(_)
            | RegistryError::ManifestRefMalformed(_)
            | RegistryError::UnsupportedManifestType(_) => "MANIFEST_INVALID",
            RegistryError::ManifestUnknown(_) => "MANIFEST_UNKNOWN",
            RegistryError::Unsupported(_) => "UNSUPPORTED",
            RegistryError::Storage(_) => "UNKNOWN",
        }
    }
}

/// OCI error response format
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, serde::Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    detail: &'static str,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        let message = match &self {
            // Internal failures get a generic message; the real error, with
            // paths and traces, stays in the server log.
            RegistryError::Storage(err) => {
                tracing::error!(error = %err, "storage failure while serving request");
                "unexpected error encountered".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            errors: vec![ErrorDetail {
                code,
                message,
                detail: "{}",
            }],
        };

        (status, axum::Json(body)).into_response()
    }
}
