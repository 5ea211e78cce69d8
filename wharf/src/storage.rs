//! Storage layer for the registry

use std::io::Cursor;

use camino::{Utf8Path, Utf8PathBuf};
use storage::{Metadata, StorageBucket, StorageError, StorageErrorKind};
use tokio::io::BufReader;

use crate::digest::Digest;
use crate::error::{RegistryError, RegistryResult};

/// Registry storage: blob and manifest persistence inside one bucket.
///
/// Blobs live under `blobs/<repository>/<algorithm>/<hex>`, manifests under
/// `manifests/<repository>/<tag>`. There is no digest index for manifests;
/// digest-addressed lookups scan the repository's current tag entries.
#[derive(Clone, Debug)]
pub struct RegistryStorage {
    bucket: StorageBucket,
}

impl RegistryStorage {
    /// Create a new registry storage inside the named bucket.
    pub fn new(storage: storage::Storage, bucket: impl Into<String>) -> Self {
        Self {
            bucket: storage.bucket(bucket),
        }
    }

    fn blob_path(repository: &str, digest: &Digest) -> Utf8PathBuf {
        Utf8PathBuf::from(format!(
            "blobs/{}/{}/{}",
            repository,
            digest.algorithm(),
            digest.hex()
        ))
    }

    fn blob_area(repository: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("blobs/{repository}"))
    }

    fn manifest_path(repository: &str, tag: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("manifests/{repository}/{tag}"))
    }

    fn manifest_area(repository: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("manifests/{repository}"))
    }

    async fn read(&self, path: &Utf8Path) -> Result<Vec<u8>, StorageError> {
        let mut data = Vec::new();
        let mut cursor = Cursor::new(&mut data);
        self.bucket.download(path, &mut cursor).await?;
        Ok(data)
    }

    /// Probe a blob without reading its content.
    ///
    /// `Some(metadata)` when present, so HEAD responses can report the size.
    pub async fn blob_metadata(
        &self,
        repository: &str,
        digest: &Digest,
    ) -> RegistryResult<Option<Metadata>> {
        match self
            .bucket
            .metadata(&Self::blob_path(repository, digest))
            .await
        {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if err.kind() == StorageErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Get a blob's content.
    pub async fn get_blob(&self, repository: &str, digest: &Digest) -> RegistryResult<Vec<u8>> {
        match self.read(&Self::blob_path(repository, digest)).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == StorageErrorKind::NotFound => {
                Err(RegistryError::BlobUnknown(digest.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Store a blob, verifying the content against the claimed digest
    /// before anything is published.
    ///
    /// On mismatch nothing is written, so a failed upload never leaves a
    /// retrievable blob behind. Concurrent puts of the same key are safe:
    /// verified content under a digest is always identical.
    pub async fn put_blob(
        &self,
        repository: &str,
        digest: &Digest,
        data: &[u8],
    ) -> RegistryResult<()> {
        let actual = Digest::compute(data);
        if actual != *digest {
            return Err(RegistryError::DigestMismatch {
                expected: digest.to_string(),
                actual: actual.to_string(),
            });
        }

        let path = Self::blob_path(repository, digest);
        let mut reader = BufReader::new(data);
        self.bucket.upload(&path, &mut reader).await?;

        Ok(())
    }

    /// Probe a manifest tag without reading its content.
    pub async fn manifest_metadata(
        &self,
        repository: &str,
        tag: &str,
    ) -> RegistryResult<Option<Metadata>> {
        match self
            .bucket
            .metadata(&Self::manifest_path(repository, tag))
            .await
        {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if err.kind() == StorageErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Get the manifest a tag currently points to.
    pub async fn get_manifest(&self, repository: &str, tag: &str) -> RegistryResult<Vec<u8>> {
        match self.read(&Self::manifest_path(repository, tag)).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == StorageErrorKind::NotFound => Err(
                RegistryError::ManifestUnknown(format!("{repository}:{tag}")),
            ),
            Err(err) => Err(err.into()),
        }
    }

    /// Write a manifest under a tag, replacing whatever the tag pointed to.
    /// No history is kept. Returns the digest of the stored bytes.
    pub async fn put_manifest(
        &self,
        repository: &str,
        tag: &str,
        data: &[u8],
    ) -> RegistryResult<Digest> {
        let digest = Digest::compute(data);

        let path = Self::manifest_path(repository, tag);
        let mut reader = BufReader::new(data);
        self.bucket.upload(&path, &mut reader).await?;

        Ok(digest)
    }

    /// Resolve a digest-addressed manifest by scanning the repository's
    /// current tag entries and recomputing each digest.
    ///
    /// O(tag count) per lookup; acceptable at this registry's scale.
    pub async fn resolve_manifest_digest(
        &self,
        repository: &str,
        digest: &Digest,
    ) -> RegistryResult<Vec<u8>> {
        let area = Self::manifest_area(repository);
        for entry in self.bucket.list(Some(&area)).await? {
            let data = match self.read(Utf8Path::new(&entry)).await {
                Ok(data) => data,
                // A tag replaced mid-scan is a stale listing entry, not a
                // failure of this lookup.
                Err(err) if err.kind() == StorageErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            if digest.verify(&data) {
                return Ok(data);
            }
        }

        Err(RegistryError::ManifestUnknown(digest.to_string()))
    }

    /// List the tags currently present in a repository, sorted.
    ///
    /// A repository that has never had a manifest or blob written to it is
    /// unknown; one that only holds blobs has an empty tag list.
    pub async fn list_tags(&self, repository: &str) -> RegistryResult<Vec<String>> {
        let area = Self::manifest_area(repository);
        let mut tags: Vec<String> = self
            .bucket
            .list(Some(&area))
            .await?
            .into_iter()
            .filter_map(|entry| Utf8Path::new(&entry).file_name().map(str::to_string))
            .collect();

        if tags.is_empty() {
            let blobs = self.bucket.list(Some(&Self::blob_area(repository))).await?;
            if blobs.is_empty() {
                return Err(RegistryError::NameUnknown(repository.to_string()));
            }
        }

        tags.sort();
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryStorage;

    fn test_storage() -> RegistryStorage {
        let storage = MemoryStorage::with_buckets(&["test"]);
        RegistryStorage::new(storage.into(), "test")
    }

    #[tokio::test]
    async fn blob_roundtrip() {
        let storage = test_storage();
        let data = b"test data";
        let digest = Digest::compute(data);

        storage.put_blob("repo/a", &digest, data).await.unwrap();

        let metadata = storage.blob_metadata("repo/a", &digest).await.unwrap();
        assert_eq!(metadata.unwrap().size, data.len() as u64);

        let retrieved = storage.get_blob("repo/a", &digest).await.unwrap();
        assert_eq!(&retrieved[..], data);
    }

    #[tokio::test]
    async fn blobs_are_repository_scoped() {
        let storage = test_storage();
        let data = b"scoped";
        let digest = Digest::compute(data);

        storage.put_blob("repo/a", &digest, data).await.unwrap();

        assert!(
            storage
                .blob_metadata("repo/b", &digest)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn mismatched_put_leaves_nothing() {
        let storage = test_storage();
        let claimed = Digest::compute(b"other content");

        let err = storage
            .put_blob("repo", &claimed, b"actual content")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DigestMismatch { .. }));

        assert!(
            storage
                .blob_metadata("repo", &claimed)
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            storage.get_blob("repo", &claimed).await,
            Err(RegistryError::BlobUnknown(_))
        ));
    }

    #[tokio::test]
    async fn tag_overwrite_returns_newer_body() {
        let storage = test_storage();

        storage
            .put_manifest("repo", "latest", b"{\"v\":1}")
            .await
            .unwrap();
        storage
            .put_manifest("repo", "latest", b"{\"v\":2}")
            .await
            .unwrap();

        let data = storage.get_manifest("repo", "latest").await.unwrap();
        assert_eq!(&data[..], b"{\"v\":2}");
    }

    #[tokio::test]
    async fn resolve_by_digest_scans_tags() {
        let storage = test_storage();

        let first = storage.put_manifest("repo", "v1", b"manifest one").await.unwrap();
        let second = storage.put_manifest("repo", "v2", b"manifest two").await.unwrap();

        let data = storage
            .resolve_manifest_digest("repo", &first)
            .await
            .unwrap();
        assert_eq!(&data[..], b"manifest one");

        let data = storage
            .resolve_manifest_digest("repo", &second)
            .await
            .unwrap();
        assert_eq!(&data[..], b"manifest two");

        let absent = Digest::compute(b"never pushed");
        assert!(matches!(
            storage.resolve_manifest_digest("repo", &absent).await,
            Err(RegistryError::ManifestUnknown(_))
        ));
    }

    #[tokio::test]
    async fn list_tags_sorted() {
        let storage = test_storage();

        for tag in ["v1", "latest", "edge"] {
            storage.put_manifest("repo", tag, b"m").await.unwrap();
        }

        let tags = storage.list_tags("repo").await.unwrap();
        assert_eq!(tags, vec!["edge", "latest", "v1"]);
    }

    #[tokio::test]
    async fn unknown_repository_has_no_tag_list() {
        let storage = test_storage();
        assert!(matches!(
            storage.list_tags("ghost").await,
            Err(RegistryError::NameUnknown(_))
        ));
    }

    #[tokio::test]
    async fn blob_only_repository_lists_empty_tags() {
        let storage = test_storage();
        let data = b"layer";
        storage
            .put_blob("repo", &Digest::compute(data), data)
            .await
            .unwrap();

        let tags = storage.list_tags("repo").await.unwrap();
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn missing_tag_is_unknown() {
        let storage = test_storage();
        storage.put_manifest("repo", "latest", b"m").await.unwrap();

        assert!(matches!(
            storage.get_manifest("repo", "absent").await,
            Err(RegistryError::ManifestUnknown(_))
        ));
        assert!(
            storage
                .manifest_metadata("repo", "absent")
                .await
                .unwrap()
                .is_none()
        );
    }
}
