//! Manifest operations for the registry

use axum::Json;
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::digest::Digest;
use crate::error::{RegistryError, RegistryResult};
use crate::reference::Reference;
use crate::storage::RegistryStorage;

/// Put a manifest.
///
/// Writes go through tags; a digest or malformed reference is rejected.
pub(crate) async fn put(
    registry: &RegistryStorage,
    name: &str,
    raw: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> RegistryResult<Response> {
    let Some(Reference::Tag(tag)) = Reference::parse(raw) else {
        return Err(RegistryError::ManifestInvalid(raw.to_string()));
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/vnd.docker.distribution.manifest.v2+json");
    validate_manifest_type(content_type)?;

    let digest = registry.put_manifest(name, &tag, &body).await?;
    tracing::debug!(repository = name, tag, %digest, "manifest stored");

    let location = format!("/v2/{name}/manifests/{digest}");
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

/// Get a manifest, by tag or by digest.
pub(crate) async fn get(
    registry: &RegistryStorage,
    name: &str,
    raw: &str,
) -> RegistryResult<Response> {
    let data = match Reference::parse(raw) {
        Some(Reference::Tag(tag)) => registry.get_manifest(name, &tag).await?,
        Some(Reference::Digest(digest)) => {
            registry.resolve_manifest_digest(name, &digest).await?
        }
        None => return Err(RegistryError::ManifestRefMalformed(raw.to_string())),
    };

    let content_type = detect_manifest_type(&data);
    let digest = Digest::compute(&data);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                HeaderName::from_static("docker-content-digest"),
                digest.to_string(),
            ),
        ],
        data,
    )
        .into_response())
}

/// Check whether a manifest exists, by tag or by digest. No body transfer:
/// the tag form is a metadata probe, the digest form resolves through the
/// same scan a GET would use.
pub(crate) async fn head(
    registry: &RegistryStorage,
    name: &str,
    raw: &str,
) -> RegistryResult<Response> {
    match Reference::parse(raw) {
        Some(Reference::Tag(tag)) => match registry.manifest_metadata(name, &tag).await? {
            Some(metadata) => Ok((
                StatusCode::OK,
                [(header::CONTENT_LENGTH, metadata.size.to_string())],
            )
                .into_response()),
            None => Err(RegistryError::ManifestUnknown(format!("{name}:{tag}"))),
        },
        Some(Reference::Digest(digest)) => {
            let data = registry.resolve_manifest_digest(name, &digest).await?;
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, detect_manifest_type(&data)),
                    (header::CONTENT_LENGTH, data.len().to_string()),
                    (
                        HeaderName::from_static("docker-content-digest"),
                        digest.to_string(),
                    ),
                ],
            )
                .into_response())
        }
        None => Err(RegistryError::ManifestRefMalformed(raw.to_string())),
    }
}

/// List tags for a repository
pub(crate) async fn list_tags(registry: &RegistryStorage, name: &str) -> RegistryResult<Response> {
    let tags = registry.list_tags(name).await?;

    Ok(Json(TagList {
        name: name.to_string(),
        tags,
    })
    .into_response())
}

/// Tag list response
#[derive(Debug, serde::Serialize)]
struct TagList {
    name: String,
    tags: Vec<String>,
}

/// Detect manifest type from content
fn detect_manifest_type(data: &[u8]) -> String {
    // Try to parse as JSON and detect the mediaType or schemaVersion
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Some(media_type) = json.get("mediaType").and_then(|v| v.as_str()) {
            return media_type.to_string();
        }

        if let Some(schema_version) = json.get("schemaVersion").and_then(|v| v.as_u64()) {
            return match schema_version {
                1 => "application/vnd.docker.distribution.manifest.v1+json".to_string(),
                2 => {
                    // Check if it's a manifest list
                    if json.get("manifests").is_some() {
                        "application/vnd.docker.distribution.manifest.list.v2+json".to_string()
                    } else {
                        "application/vnd.docker.distribution.manifest.v2+json".to_string()
                    }
                }
                _ => "application/vnd.oci.image.manifest.v1+json".to_string(),
            };
        }
    }

    // Default to OCI manifest
    "application/vnd.oci.image.manifest.v1+json".to_string()
}

/// Validate the declared manifest media type
fn validate_manifest_type(content_type: &str) -> RegistryResult<()> {
    match content_type {
        "application/vnd.docker.distribution.manifest.v1+json"
        | "application/vnd.docker.distribution.manifest.v1+prettyjws"
        | "application/vnd.docker.distribution.manifest.v2+json"
        | "application/vnd.docker.distribution.manifest.list.v2+json"
        | "application/vnd.oci.image.manifest.v1+json"
        | "application/vnd.oci.image.index.v1+json" => Ok(()),
        _ => Err(RegistryError::UnsupportedManifestType(
            content_type.to_string(),
        )),
    }
}
