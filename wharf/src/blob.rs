//! Blob operations for the registry

use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::digest::Digest;
use crate::error::{RegistryError, RegistryResult};
use crate::storage::RegistryStorage;

/// Begin an upload session: issue a fresh id and the location to PUT to.
///
/// No session state is kept; the id only serves to make the upload URL
/// unique.
pub(crate) fn start_upload(name: &str) -> RegistryResult<Response> {
    let id = uuid::Uuid::new_v4();
    let location = format!("/v2/{name}/blobs/uploads/{id}");

    Ok((
        StatusCode::ACCEPTED,
        [
            (header::LOCATION, location),
            (header::RANGE, "0-0".to_string()),
        ],
    )
        .into_response())
}

/// Upload finalization query string: `?digest=sha256:...`.
#[derive(Debug, serde::Deserialize)]
struct FinalizeQuery {
    digest: String,
}

/// Complete a monolithic upload: the full body plus its claimed digest.
///
/// The body is digest-verified before the blob store publishes anything,
/// so an interrupted or corrupted upload never becomes retrievable.
pub(crate) async fn finalize_upload(
    registry: &RegistryStorage,
    name: &str,
    query: Option<&str>,
    body: Bytes,
) -> RegistryResult<Response> {
    let query: FinalizeQuery = serde_urlencoded::from_str(query.unwrap_or(""))
        .map_err(|_| RegistryError::DigestInvalid("missing digest parameter".to_string()))?;
    let digest: Digest = query
        .digest
        .parse()
        .map_err(|_| RegistryError::DigestInvalid(query.digest.clone()))?;

    registry.put_blob(name, &digest, &body).await?;
    tracing::debug!(repository = name, %digest, size = body.len(), "blob stored");

    let location = format!("/v2/{name}/blobs/{digest}");
    Ok((
        StatusCode::CREATED,
        [
            (header::LOCATION, location),
            (
                HeaderName::from_static("docker-content-digest"),
                digest.to_string(),
            ),
        ],
    )
        .into_response())
}

/// Existence probe for a blob.
pub(crate) async fn head(
    registry: &RegistryStorage,
    name: &str,
    raw: &str,
) -> RegistryResult<Response> {
    let digest = parse_blob_digest(raw)?;

    match registry.blob_metadata(name, &digest).await? {
        Some(metadata) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::CONTENT_LENGTH, metadata.size.to_string()),
                (
                    HeaderName::from_static("docker-content-digest"),
                    digest.to_string(),
                ),
            ],
        )
            .into_response()),
        None => Err(RegistryError::BlobUnknown(digest.to_string())),
    }
}

/// Fetch a blob's content.
pub(crate) async fn get(
    registry: &RegistryStorage,
    name: &str,
    raw: &str,
) -> RegistryResult<Response> {
    let digest = parse_blob_digest(raw)?;

    let data = registry.get_blob(name, &digest).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                HeaderName::from_static("docker-content-digest"),
                digest.to_string(),
            ),
        ],
        data,
    )
        .into_response())
}

/// A malformed digest on a blob address is a client error, reported under
/// the `BLOB_UNKNOWN` code before the store is ever consulted.
fn parse_blob_digest(raw: &str) -> RegistryResult<Digest> {
    raw.parse()
        .map_err(|_| RegistryError::BlobDigestMalformed(raw.to_string()))
}
