use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use tokio::{io::AsyncWriteExt, sync::RwLock};

use storage_driver::{Driver, Metadata, Reader, StorageError, StorageErrorKind, Writer};

#[derive(Debug)]
struct MemoryFileItem {
    created: DateTime<Utc>,
    data: Vec<u8>,
}

impl AsRef<[u8]> for MemoryFileItem {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for MemoryFileItem {
    fn from(data: Vec<u8>) -> Self {
        Self {
            created: Utc::now(),
            data,
        }
    }
}

impl From<&MemoryFileItem> for Metadata {
    fn from(value: &MemoryFileItem) -> Self {
        Self {
            created: value.created,
            size: value.data.len() as u64,
        }
    }
}

fn bucket_not_found(engine: &'static str, bucket: &str) -> StorageError {
    StorageError::builder(
        engine,
        StorageErrorKind::NotFound,
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Bucket not found: {bucket}"),
        ),
    )
    .bucket(bucket)
    .build()
}

fn path_not_found(engine: &'static str, bucket: &str, remote: &Utf8Path) -> StorageError {
    StorageError::builder(
        engine,
        StorageErrorKind::NotFound,
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Path not found: {remote}"),
        ),
    )
    .bucket(bucket)
    .path(remote.as_str())
    .build()
}

/// Storage driver that stores files in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, HashMap<Utf8PathBuf, MemoryFileItem>>>,
}

impl MemoryStorage {
    /// Create a new `MemoryStorage` instance, with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new `MemoryStorage` instance, with the given buckets.
    pub fn with_buckets(buckets: &[&str]) -> Self {
        let mut map = HashMap::new();
        for bucket in buckets {
            map.insert(bucket.to_string(), HashMap::new());
        }

        Self {
            buckets: RwLock::new(map),
        }
    }
}

#[async_trait::async_trait]
impl Driver for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn metadata(&self, bucket: &str, remote: &Utf8Path) -> Result<Metadata, StorageError> {
        let buckets = self.buckets.read().await;
        let bucket_map = buckets
            .get(bucket)
            .ok_or_else(|| bucket_not_found(self.name(), bucket))?;
        Ok(bucket_map
            .get(remote)
            .ok_or_else(|| path_not_found(self.name(), bucket, remote))?
            .into())
    }

    async fn upload(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        local: &mut Reader<'_>,
    ) -> Result<(), StorageError> {
        let mut buf = Vec::new();

        tokio::io::copy(local, &mut buf)
            .await
            .map_err(StorageError::with(self.name(), StorageErrorKind::Io))?;

        buf.shutdown()
            .await
            .map_err(StorageError::with(self.name(), StorageErrorKind::Io))?;

        // The map insert is the publish point, so readers only ever see a
        // fully buffered object.
        let mut buckets = self.buckets.write().await;
        let bucket_map = buckets.entry(bucket.to_string()).or_default();
        bucket_map.insert(remote.to_owned(), buf.into());

        Ok(())
    }

    async fn download(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        local: &mut Writer<'_>,
    ) -> Result<(), StorageError> {
        let buckets = self.buckets.read().await;
        let bucket_map = buckets
            .get(bucket)
            .ok_or_else(|| bucket_not_found(self.name(), bucket))?;
        let mut buf = bucket_map
            .get(remote)
            .ok_or_else(|| path_not_found(self.name(), bucket, remote))?
            .as_ref();

        tokio::io::copy(&mut buf, local)
            .await
            .map_err(StorageError::with(self.name(), StorageErrorKind::Io))?;

        local
            .flush()
            .await
            .map_err(StorageError::with(self.name(), StorageErrorKind::Io))?;

        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&Utf8Path>,
    ) -> Result<Vec<String>, StorageError> {
        tracing::trace!(%bucket, ?prefix, "list memory bucket");

        let buckets = self.buckets.read().await;
        let bucket_map = buckets
            .get(bucket)
            .ok_or_else(|| bucket_not_found(self.name(), bucket))?;

        let mut paths = Vec::new();
        for path in bucket_map.keys() {
            if let Some(prefix) = prefix {
                if path.starts_with(prefix) {
                    paths.push(path.to_string());
                }
            } else {
                paths.push(path.to_string());
            }
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn roundtrip() {
        let driver = MemoryStorage::with_buckets(&["b"]);
        let payload = b"memory payload";

        let mut reader = BufReader::new(&payload[..]);
        driver
            .upload("b", Utf8Path::new("x/y"), &mut reader)
            .await
            .unwrap();

        let mut out = Vec::new();
        driver
            .download("b", Utf8Path::new("x/y"), &mut out)
            .await
            .unwrap();
        assert_eq!(&out[..], payload);
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let driver = MemoryStorage::with_buckets(&["b"]);
        let err = driver
            .metadata("b", Utf8Path::new("absent"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::NotFound);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let driver = MemoryStorage::with_buckets(&["b"]);
        for path in ["m/r/latest", "m/r/v1", "m/s/other"] {
            let mut reader = BufReader::new(&b"m"[..]);
            driver
                .upload("b", Utf8Path::new(path), &mut reader)
                .await
                .unwrap();
        }

        let mut listed = driver.list("b", Some(Utf8Path::new("m/r"))).await.unwrap();
        listed.sort();
        assert_eq!(listed, vec!["m/r/latest", "m/r/v1"]);
    }
}
