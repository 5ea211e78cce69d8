//! API server builder, router, and protocol dispatch

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{Json, Response};
use axum::routing::{any, get};
use bytes::Bytes;
use serde_json::json;

use crate::error::{RegistryError, RegistryResult};
use crate::reference;
use crate::storage::RegistryStorage;
use crate::{blob, manifest};

/// Registry builder for configuring and creating the OCI registry service
#[derive(Debug)]
pub struct RegistryBuilder {
    storage: Option<storage::Storage>,
    bucket: Option<String>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// Create a new registry builder
    pub fn new() -> Self {
        Self {
            storage: None,
            bucket: None,
        }
    }

    /// Set the storage backend
    pub fn storage(mut self, storage: storage::Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the bucket name for storage
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Build the registry service
    ///
    /// Returns a Router that can be served with any tower-compatible server
    pub fn build(self) -> Router {
        let storage = self.storage.expect("storage backend must be configured");
        let bucket = self.bucket.unwrap_or_else(|| "registry".to_string());

        let registry = RegistryStorage::new(storage, bucket);

        // Repository names span an unknown number of path segments, so
        // everything below /v2/ goes through one wildcard and the dispatch
        // table rather than fixed captures.
        Router::new()
            .route("/v2/", get(api_version_check))
            .route("/v2/{*path}", any(dispatch))
            .with_state(registry)
    }
}

/// API version check endpoint
///
/// Returns 200 OK to indicate the registry is available
async fn api_version_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({})))
}

/// Sub-resource keywords that terminate a repository name in the URL.
const RESERVED: [&str; 4] = ["blobs", "manifests", "tags", "referrers"];

/// Split a path below `/v2/` into the repository name and the endpoint
/// segments starting at the first reserved keyword.
///
/// `a/b/blobs/uploads/` becomes `("a/b", ["blobs", "uploads", ""])`. A
/// missing keyword or an empty name cannot be dispatched at all.
fn split_repository(path: &str) -> RegistryResult<(String, Vec<&str>)> {
    let segments: Vec<&str> = path.split('/').collect();

    let keyword = segments
        .iter()
        .position(|segment| RESERVED.contains(segment))
        .ok_or_else(|| RegistryError::NameInvalid(path.to_string()))?;
    if keyword == 0 {
        return Err(RegistryError::NameInvalid(path.to_string()));
    }

    let name = segments[..keyword].join("/");
    Ok((name, segments[keyword..].to_vec()))
}

/// Protocol dispatch: one decision over `(method, endpoint shape)`.
///
/// The name is validated before any arm runs, so an invalid repository
/// name short-circuits with no store access.
async fn dispatch(
    State(registry): State<RegistryStorage>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> RegistryResult<Response> {
    let path = uri.path().trim_start_matches("/v2/");
    let (name, endpoint) = split_repository(path)?;
    if !reference::is_valid_name(&name) {
        return Err(RegistryError::NameInvalid(name));
    }

    match (method.as_str(), endpoint.as_slice()) {
        ("POST", ["blobs", "uploads", ""] | ["blobs", "uploads"]) => blob::start_upload(&name),
        ("PUT", ["blobs", "uploads", id]) if !id.is_empty() => {
            blob::finalize_upload(&registry, &name, uri.query(), body).await
        }
        ("HEAD", ["blobs", raw]) => blob::head(&registry, &name, raw).await,
        ("GET", ["blobs", raw]) => blob::get(&registry, &name, raw).await,
        ("PUT", ["manifests", raw]) => manifest::put(&registry, &name, raw, &headers, body).await,
        ("HEAD", ["manifests", raw]) => manifest::head(&registry, &name, raw).await,
        ("GET", ["manifests", raw]) => manifest::get(&registry, &name, raw).await,
        ("GET", ["tags", "list"]) => manifest::list_tags(&registry, &name).await,
        _ => Err(RegistryError::Unsupported(format!("{method} /v2/{path}"))),
    }
}
