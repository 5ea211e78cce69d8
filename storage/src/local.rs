use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use storage_driver::{Driver, Metadata, Reader, StorageError, StorageErrorKind, Writer};

/// Storage driver backed by a local directory, one subdirectory per bucket.
#[derive(Debug)]
pub struct LocalDriver {
    root: Utf8PathBuf,
}

impl LocalDriver {
    /// Create a driver rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn path(&self, bucket: &str, remote: &Utf8Path) -> Utf8PathBuf {
        let mut path = self.root.join(bucket);
        path.push(remote);
        path
    }
}

fn fs_error(remote: &Utf8Path, err: std::io::Error) -> StorageError {
    let kind = StorageErrorKind::from_io(err.kind());
    StorageError::builder("local", kind, err)
        .path(remote.as_str())
        .build()
}

#[async_trait::async_trait]
impl Driver for LocalDriver {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn metadata(&self, bucket: &str, remote: &Utf8Path) -> Result<Metadata, StorageError> {
        let target = self.path(bucket, remote);
        let metadata = tokio::fs::metadata(&target)
            .await
            .map_err(|err| fs_error(remote, err))?;
        Ok(Metadata {
            size: metadata.len(),
            created: metadata
                .created()
                .map_err(|err| fs_error(remote, err))?
                .into(),
        })
    }

    async fn upload(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        local: &mut Reader<'_>,
    ) -> Result<(), StorageError> {
        let target = self.path(bucket, remote);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| fs_error(remote, err))?;
        }

        // Write to a unique sibling and rename into place, so readers never
        // observe a half-written object and concurrent writers of the same
        // key cannot interleave.
        let scratch = target.with_file_name(format!(
            ".{}.{}.tmp",
            target.file_name().unwrap_or("upload"),
            uuid::Uuid::new_v4()
        ));

        let result = write_scratch(&scratch, local).await;
        if let Err(err) = result {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(fs_error(remote, err));
        }

        if let Err(err) = tokio::fs::rename(&scratch, &target).await {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(fs_error(remote, err));
        }
        Ok(())
    }

    async fn download(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        local: &mut Writer<'_>,
    ) -> Result<(), StorageError> {
        let target = self.path(bucket, remote);

        let mut reader = tokio::io::BufReader::new(
            tokio::fs::File::open(&target)
                .await
                .map_err(|err| fs_error(remote, err))?,
        );

        tokio::io::copy(&mut reader, local)
            .await
            .map_err(|err| fs_error(remote, err))?;

        local.flush().await.map_err(|err| fs_error(remote, err))?;

        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&Utf8Path>,
    ) -> Result<Vec<String>, StorageError> {
        let base = self.root.join(bucket);
        let start = match prefix {
            Some(part) => base.join(part),
            None => base.clone(),
        };

        if tokio::fs::metadata(&start).await.is_err() {
            return Ok(Vec::new());
        }

        let items = tokio::task::spawn_blocking(move || collect_list(&base, &start))
            .in_current_span()
            .await
            .map_err(StorageError::with("local", StorageErrorKind::Other))?
            .map_err(StorageError::with("local", StorageErrorKind::Io))?;

        tracing::debug!("Found {} entries", items.len());

        Ok(items.into_iter().map(|p| p.to_string()).collect())
    }
}

async fn write_scratch(scratch: &Utf8Path, local: &mut Reader<'_>) -> std::io::Result<()> {
    let mut writer = tokio::io::BufWriter::new(tokio::fs::File::create(scratch).await?);
    tokio::io::copy(local, &mut writer).await?;
    writer.shutdown().await?;
    Ok(())
}

fn collect_list(base: &Utf8Path, start: &Utf8Path) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();
    visit(start, &mut files)?;

    Ok(files
        .into_iter()
        .filter_map(|p| p.strip_prefix(base).ok().map(|p| p.to_owned()))
        .collect())
}

fn visit(path: &Utf8Path, files: &mut Vec<Utf8PathBuf>) -> std::io::Result<()> {
    for entry in path.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            visit(entry.path(), files)?;
        } else {
            files.push(entry.path().to_owned())
        }
    }

    Ok(())
}
